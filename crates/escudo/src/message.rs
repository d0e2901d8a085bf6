//! Wire protocol between the extension contexts.
//!
//! Requests flow from the page and popup contexts to the background router;
//! page commands flow from the router and popup to the page context. Both are
//! tagged by an `action` field, exactly as the runtime messaging layer frames
//! them. Replies are plain `success`-carrying objects.

use crate::state::{Mode, SharedState, Vulnerability};
use serde::{Deserialize, Serialize};

/// A report of monitored page activity (storage, cookies, DOM mutations,
/// blocked render calls).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEventReport {
    /// What happened (`access_attempt`, `blocked_call`, `modification`, ...)
    pub action: String,
    /// What it happened to (`react_internals`, `document_cookie`, ...)
    pub target: String,
    /// Event-specific payload
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    /// When it happened (Unix epoch millis)
    pub timestamp: u64,
    /// Page the event originated from
    pub url: String,
}

impl SecurityEventReport {
    /// Creates a report timestamped now.
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        target: impl Into<String>,
        details: serde_json::Map<String, serde_json::Value>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
            details,
            timestamp: crate::logbook::now_millis(),
            url: url.into(),
        }
    }
}

/// Details of a render call the guard refused to forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackDetails {
    /// Wrapped method that was called (`render` or `createRoot`)
    pub method: String,
    /// First argument, serialized
    #[serde(default)]
    pub args: String,
    /// Call stack at the time of the call
    #[serde(default)]
    pub stack: String,
}

impl AttackDetails {
    /// Creates a blocked-call report.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        args: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            args: args.into(),
            stack: stack.into(),
        }
    }
}

/// Messages handled by the background router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Snapshot request from the popup
    GetState,
    /// Scan finished on the page; results replace the previous set
    #[serde(rename_all = "camelCase")]
    ScanComplete {
        /// Findings from this scan
        #[serde(default)]
        vulnerabilities: Vec<Vulnerability>,
    },
    /// React found on the page
    #[serde(rename_all = "camelCase")]
    ReactDetected {
        /// Resolved version label
        version: String,
    },
    /// Page guard installed or removed
    #[serde(rename_all = "camelCase")]
    ProtectionStatus {
        /// Whether the guard is now active
        active: bool,
    },
    /// Mode switch request from the popup
    #[serde(rename_all = "camelCase")]
    SetTrainingMode {
        /// Desired training flag
        active: bool,
        /// Whether the user confirmed the switch
        #[serde(default)]
        confirmed: bool,
    },
    /// Auto-demo toggle from the popup
    #[serde(rename_all = "camelCase")]
    SetAutoDemo {
        /// Desired auto-demo flag
        auto_demo: bool,
    },
    /// Demonstration request routed through the background gate
    #[serde(rename_all = "camelCase")]
    DemonstrateAttack {
        /// Demonstration kind, validated by the page context
        attack_type: String,
        /// Free-form options forwarded to the handler
        #[serde(default)]
        options: serde_json::Map<String, serde_json::Value>,
    },
    /// Drop all log entries
    ClearLogs,
    /// Monitored page activity (from the guard's monitors)
    #[serde(rename_all = "camelCase")]
    SecurityEvent {
        /// The observed event
        security_event: SecurityEventReport,
    },
    /// A render call the guard blocked
    #[serde(rename_all = "camelCase")]
    AttackAttempt {
        /// What was called and with what
        details: AttackDetails,
    },
}

impl Request {
    /// Scan report carrying this scan's findings.
    #[must_use]
    pub const fn scan_complete(vulnerabilities: Vec<Vulnerability>) -> Self {
        Self::ScanComplete { vulnerabilities }
    }

    /// Detection report with the resolved version label.
    #[must_use]
    pub fn react_detected(version: impl Into<String>) -> Self {
        Self::ReactDetected {
            version: version.into(),
        }
    }

    /// Guard status notification.
    #[must_use]
    pub const fn protection_status(active: bool) -> Self {
        Self::ProtectionStatus { active }
    }

    /// Confirmed or unconfirmed training-mode switch.
    #[must_use]
    pub const fn set_training_mode(active: bool, confirmed: bool) -> Self {
        Self::SetTrainingMode { active, confirmed }
    }

    /// Auto-demo toggle.
    #[must_use]
    pub const fn set_auto_demo(auto_demo: bool) -> Self {
        Self::SetAutoDemo { auto_demo }
    }

    /// Demonstration request with no options.
    #[must_use]
    pub fn demonstrate_attack(attack_type: impl Into<String>) -> Self {
        Self::DemonstrateAttack {
            attack_type: attack_type.into(),
            options: serde_json::Map::new(),
        }
    }
}

/// Replies from the background router.
///
/// Untagged on the wire: each reply is identified by the fields it carries.
/// `Ack` must stay last so richer variants deserialize first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Full state snapshot
    State {
        /// Always true
        success: bool,
        /// Deep copy of the shared state
        state: Box<SharedState>,
    },
    /// Outcome of a training-mode switch
    #[serde(rename_all = "camelCase")]
    TrainingMode {
        /// Always true
        success: bool,
        /// Training flag after the operation
        training_active: bool,
        /// Mode after the operation
        mode: Mode,
    },
    /// Outcome of an auto-demo toggle
    #[serde(rename_all = "camelCase")]
    AutoDemo {
        /// Always true
        success: bool,
        /// Auto-demo flag after the operation
        auto_demo_active: bool,
    },
    /// Refused operation
    Failure {
        /// Always false
        success: bool,
        /// Human-readable reason
        error: String,
    },
    /// Bare acknowledgement
    Ack {
        /// Always true
        success: bool,
    },
}

impl Response {
    /// Snapshot reply.
    #[must_use]
    pub fn state(state: SharedState) -> Self {
        Self::State {
            success: true,
            state: Box::new(state),
        }
    }

    /// Training-mode outcome reply.
    #[must_use]
    pub const fn training_mode(training_active: bool, mode: Mode) -> Self {
        Self::TrainingMode {
            success: true,
            training_active,
            mode,
        }
    }

    /// Auto-demo outcome reply.
    #[must_use]
    pub const fn auto_demo(auto_demo_active: bool) -> Self {
        Self::AutoDemo {
            success: true,
            auto_demo_active,
        }
    }

    /// Refusal with a reason.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            success: false,
            error: error.into(),
        }
    }

    /// Bare acknowledgement.
    #[must_use]
    pub const fn ack() -> Self {
        Self::Ack { success: true }
    }

    /// Whether the operation succeeded.
    #[must_use]
    pub const fn success(&self) -> bool {
        match self {
            Self::State { success, .. }
            | Self::TrainingMode { success, .. }
            | Self::AutoDemo { success, .. }
            | Self::Failure { success, .. }
            | Self::Ack { success } => *success,
        }
    }
}

/// Commands handled by the page context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageCommand {
    /// Run the vulnerability scanner now
    Scan,
    /// Install the protection guard
    ApplyProtection,
    /// Report whether the guard is installed
    CheckProtection,
    /// Start a demonstration
    #[serde(rename_all = "camelCase")]
    RunDemonstration {
        /// Demonstration kind
        attack_type: String,
        /// Handler options
        #[serde(default)]
        options: serde_json::Map<String, serde_json::Value>,
    },
    /// Stop the running demonstration, if any
    StopDemonstration,
    /// Mirror a mode change into the page context
    #[serde(rename_all = "camelCase")]
    SetMode {
        /// New mode
        mode: Mode,
    },
    /// Mirror an auto-demo change into the page context
    #[serde(rename_all = "camelCase")]
    SetAutoDemo {
        /// New auto-demo flag
        auto_demo: bool,
    },
}

impl PageCommand {
    /// Demonstration command with no options.
    #[must_use]
    pub fn run_demonstration(attack_type: impl Into<String>) -> Self {
        Self::RunDemonstration {
            attack_type: attack_type.into(),
            options: serde_json::Map::new(),
        }
    }
}

/// Replies from the page context.
///
/// Untagged like [`Response`]; `Ack` stays last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageReply {
    /// Scan findings
    ScanReport {
        /// Always true
        success: bool,
        /// Findings from this scan
        vulnerabilities: Vec<Vulnerability>,
    },
    /// Guard status
    Protection {
        /// Always true
        success: bool,
        /// Whether the guard is installed
        protected: bool,
    },
    /// Mode mirrored
    ModeSet {
        /// Always true
        success: bool,
        /// Mode now in effect on the page
        mode: Mode,
    },
    /// Auto-demo mirrored
    #[serde(rename_all = "camelCase")]
    AutoDemoSet {
        /// Always true
        success: bool,
        /// Auto-demo flag now in effect on the page
        auto_demo: bool,
    },
    /// Refused or failed command
    Failure {
        /// Always false
        success: bool,
        /// Human-readable reason
        error: String,
    },
    /// Bare acknowledgement
    Ack {
        /// Always true
        success: bool,
    },
}

impl PageReply {
    /// Scan findings reply.
    #[must_use]
    pub const fn scan_report(vulnerabilities: Vec<Vulnerability>) -> Self {
        Self::ScanReport {
            success: true,
            vulnerabilities,
        }
    }

    /// Guard status reply.
    #[must_use]
    pub const fn protection(protected: bool) -> Self {
        Self::Protection {
            success: true,
            protected,
        }
    }

    /// Mode mirrored reply.
    #[must_use]
    pub const fn mode_set(mode: Mode) -> Self {
        Self::ModeSet {
            success: true,
            mode,
        }
    }

    /// Auto-demo mirrored reply.
    #[must_use]
    pub const fn auto_demo_set(auto_demo: bool) -> Self {
        Self::AutoDemoSet {
            success: true,
            auto_demo,
        }
    }

    /// Refusal with a reason.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            success: false,
            error: error.into(),
        }
    }

    /// Bare acknowledgement.
    #[must_use]
    pub const fn ack() -> Self {
        Self::Ack { success: true }
    }

    /// Whether the command succeeded.
    #[must_use]
    pub const fn success(&self) -> bool {
        match self {
            Self::ScanReport { success, .. }
            | Self::Protection { success, .. }
            | Self::ModeSet { success, .. }
            | Self::AutoDemoSet { success, .. }
            | Self::Failure { success, .. }
            | Self::Ack { success } => *success,
        }
    }

    /// The error string, when the command failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { error, .. } => Some(error),
            _ => None,
        }
    }
}
