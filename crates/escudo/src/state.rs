//! Shared extension state owned by the background context.

use crate::logbook::LogBook;
use serde::{Deserialize, Serialize};

/// Badge background color while vulnerabilities are present
pub const BADGE_COLOR: &str = "#FF0000";

/// Operating mode of the suite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Scan and protect; demonstrations refused
    #[default]
    Defense,
    /// Demonstrations permitted behind explicit confirmation
    Training,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defense => write!(f, "defense"),
            Self::Training => write!(f, "training"),
        }
    }
}

/// Severity of a reported vulnerability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Hygiene finding
    Low,
    /// Should be fixed
    Medium,
    /// Exploitable exposure
    High,
    /// Secrets or equivalent at risk
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// The closed set of vulnerability classes the scanner reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VulnKind {
    /// `React.__SECRET_INTERNALS_DO_NOT_USE_OR_YOU_WILL_BE_FIRED` reachable
    ExposedReactInternals,
    /// ReactDOM internals object reachable
    ExposedReactdomInternals,
    /// `ReactDOM.render` callable and unwrapped
    UnprotectedRender,
    /// `ReactDOM.createRoot` callable and unwrapped
    UnprotectedCreateRoot,
    /// A component renders raw HTML
    DangerousInnerhtml,
    /// Secret-looking literals in inline scripts
    ExposedCredentials,
    /// Page served over plain HTTP
    InsecureContext,
    /// Deprecated lifecycle methods present
    UnsafeLifecycleMethods,
}

impl std::fmt::Display for VulnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ExposedReactInternals => "EXPOSED_REACT_INTERNALS",
            Self::ExposedReactdomInternals => "EXPOSED_REACTDOM_INTERNALS",
            Self::UnprotectedRender => "UNPROTECTED_RENDER",
            Self::UnprotectedCreateRoot => "UNPROTECTED_CREATE_ROOT",
            Self::DangerousInnerhtml => "DANGEROUS_INNERHTML",
            Self::ExposedCredentials => "EXPOSED_CREDENTIALS",
            Self::InsecureContext => "INSECURE_CONTEXT",
            Self::UnsafeLifecycleMethods => "UNSAFE_LIFECYCLE_METHODS",
        };
        write!(f, "{name}")
    }
}

/// One scanner finding. No identity: repeated scans report duplicates anew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Vulnerability class
    #[serde(rename = "type")]
    pub kind: VulnKind,
    /// How bad it is
    pub severity: Severity,
    /// One-line summary
    pub description: String,
    /// Where it was found (URL or element snippet)
    pub location: String,
    /// Longer explanation of the risk
    pub details: String,
}

impl Vulnerability {
    /// Creates a finding.
    #[must_use]
    pub fn new(
        kind: VulnKind,
        severity: Severity,
        description: impl Into<String>,
        location: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            location: location.into(),
            details: details.into(),
        }
    }
}

/// State shared across contexts, owned by the background router.
///
/// `training_active` always equals `mode == Training`; the transition
/// methods below are the only mutation path the router uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedState {
    /// Current operating mode
    pub mode: Mode,
    /// Findings from the most recent scan, replaced wholesale
    pub scan_results: Vec<Vulnerability>,
    /// Whether the page guard is installed
    pub protection_active: bool,
    /// Whether training mode is on (mirrors `mode`)
    pub training_active: bool,
    /// Whether the automatic demonstration sequence is enabled
    pub auto_demo_active: bool,
    /// React version reported by the page, if any
    pub detected_react_version: Option<String>,
    /// Bounded activity log
    pub logs: LogBook,
}

impl SharedState {
    /// Switches to training mode, keeping the mirror flag consistent.
    pub fn activate_training(&mut self) {
        self.mode = Mode::Training;
        self.training_active = true;
    }

    /// Switches back to defense mode. Auto-demo cannot survive leaving
    /// training.
    pub fn deactivate_training(&mut self) {
        self.mode = Mode::Defense;
        self.training_active = false;
        self.auto_demo_active = false;
    }

    /// Toolbar badge text: the finding count, or empty when clean.
    #[must_use]
    pub fn badge_text(&self) -> String {
        if self.scan_results.is_empty() {
            String::new()
        } else {
            self.scan_results.len().to_string()
        }
    }
}
