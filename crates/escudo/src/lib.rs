//! Escudo: React Security Training Suite
//!
//! Escudo (Spanish: "shield") models a browser security extension for
//! React applications as an ordinary library: a scanner that inventories
//! page weaknesses, a guard that hardens the page against injected code,
//! and a training mode that demonstrates the attacks the guard blocks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ESCUDO Architecture                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐  requests  ┌────────────┐  commands  ┌───────┐  │
//! │  │ Popup   │───────────►│ Background │───────────►│ Page  │  │
//! │  │ surface │◄───────────│ router     │◄───────────│ agent │  │
//! │  └─────────┘  state     └─────┬──────┘  reports   └───┬───┘  │
//! │                               │                       │      │
//! │                         ┌─────▼─────┐          ┌──────▼────┐ │
//! │                         │ Persisted │          │ Scanner,  │ │
//! │                         │ state     │          │ guard,    │ │
//! │                         └───────────┘          │ demos     │ │
//! │                                                └───────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Page-side agent tying scanner, guard, and demonstrations together.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown,
    clippy::struct_excessive_bools
)]
pub mod agent;

/// Attack demonstrations and their cleanup lifecycle.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown,
    clippy::too_many_lines
)]
pub mod demo;

/// React presence and capability detection.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod detect;

/// Render and storage interposition with attack reporting.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod guard;

/// Bounded activity log.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod logbook;

/// Cross-context message protocol.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod message;

/// The simulated page world the agent operates on.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod page;

/// Durable state snapshots.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod persist;

/// Popup view model and controller.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod popup;

mod result;

/// Background request router.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod router;

/// Async session wiring between the contexts.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod runtime;

/// Vulnerability scanner.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod scanner;

/// Shared state and the vulnerability model.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod state;

/// Suite version, stamped into persisted state snapshots.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use agent::{OutboxSink, PageAgent};
pub use demo::{
    beacon_catalog, hide_training_banner, show_training_banner, DemoKind, DemoRecord,
    DemoSchedule, DemoSession, AUTO_SEQUENCE, BANNER_TEXT, BEACON_CONTAINER_ID,
    DEMO_CONTAINER_ID, EXFIL_CONTAINER_ID, HOOK_INDICATOR_ID, INJECTION_ID, TRAINING_BANNER_ID,
};
pub use detect::{
    detect, is_present, report, resolve_version, Detection, DetectionReport, HookInfo,
};
pub use guard::{
    is_sensitive_key, is_suspicious_element, CallContext, EventSink, Guard, LegitimacyPolicy,
    RecordingSink, RenderOutcome, RootHandle, DEFAULT_EXTENSION_ID,
};
pub use logbook::{LogBook, LogEntry, LogLevel};
pub use message::{AttackDetails, PageCommand, PageReply, Request, Response, SecurityEventReport};
pub use page::{
    ComponentMarker, Cookie, PageDom, PageElement, PageTimer, PageWorld, ReactDomGlobal,
    ReactGlobal, RenderEntry, TimerAction,
};
pub use persist::{JsonFileStore, MemoryStore, PersistedState, StateStore};
pub use popup::{FindingLine, PopupController, PopupView, ProtectionButton};
pub use result::{EscudoError, EscudoResult};
pub use router::{Router, RouterOutcome};
pub use runtime::{PageHandle, RouterHandle, RuntimeConfig, SessionRuntime};
pub use scanner::scan;
pub use state::{Mode, Severity, SharedState, Vulnerability, VulnKind, BADGE_COLOR};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::agent::*;
    pub use super::demo::*;
    pub use super::detect::*;
    pub use super::guard::*;
    pub use super::logbook::*;
    pub use super::message::*;
    pub use super::page::*;
    pub use super::persist::*;
    pub use super::popup::*;
    pub use super::result::*;
    pub use super::router::*;
    pub use super::runtime::*;
    pub use super::scanner::*;
    pub use super::state::*;
}
