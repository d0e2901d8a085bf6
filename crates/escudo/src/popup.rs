//! Popup surface.
//!
//! The popup holds no state of its own. [`PopupView`] is a pure projection
//! of the shared state into the strings and flags the surface displays;
//! [`PopupController`] talks to both contexts and rebuilds the view after
//! every operation.
//!
//! Entering training mode is a two-step handshake: `request_training`
//! issues a confirmation token, and only `confirm_training` with that
//! token flips the mode in both contexts. A stale token is quietly
//! ignored, so an abandoned dialog can never activate training later.

use crate::message::{PageCommand, Request, Response};
use crate::result::EscudoResult;
use crate::runtime::{PageHandle, RouterHandle};
use crate::state::{Mode, Severity, SharedState, VulnKind};
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Origin string the popup reports to the router.
const POPUP_ORIGIN: &str = "popup";

/// Pause between applying protection and the follow-up scan.
const RESCAN_DELAY_MS: u64 = 500;

/// One finding row in the popup list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingLine {
    /// How bad it is
    pub severity: Severity,
    /// Vulnerability class
    pub kind: VulnKind,
    /// One-line summary
    pub description: String,
}

impl FindingLine {
    /// The row as the popup renders it.
    #[must_use]
    pub fn line(&self) -> String {
        format!("{}: {}", self.severity, self.description)
    }
}

/// State of the apply-protection button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionButton {
    /// Protection available
    Apply,
    /// Request in flight
    Applying,
    /// Guard already installed
    Applied,
}

impl ProtectionButton {
    /// Button caption.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Apply => "Apply Protection",
            Self::Applying => "Applying...",
            Self::Applied => "Protection Applied",
        }
    }

    /// Whether the button accepts clicks.
    #[must_use]
    pub const fn enabled(self) -> bool {
        matches!(self, Self::Apply)
    }
}

/// Everything the popup shows, derived from one state snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupView {
    /// Scan outcome headline
    pub status_text: String,
    /// Finding rows, in scan order
    pub findings: Vec<FindingLine>,
    /// Protection status row
    pub protection_label: &'static str,
    /// Apply button state
    pub protection_button: ProtectionButton,
    /// Toolbar badge text
    pub badge_text: String,
    /// Detected React version, when known
    pub react_version: Option<String>,
    /// Mode row
    pub mode_label: String,
    /// Training toggle position
    pub training_checked: bool,
    /// Whether the auto-demo toggle is shown at all
    pub auto_demo_visible: bool,
    /// Auto-demo toggle position
    pub auto_demo_checked: bool,
    /// Activity log, newest first
    pub log_lines: Vec<String>,
}

impl PopupView {
    /// Projects a state snapshot into the displayed surface.
    #[must_use]
    pub fn build(state: &SharedState) -> Self {
        let status_text = if state.scan_results.is_empty() {
            "No vulnerabilities detected".to_string()
        } else {
            format!("Found {} vulnerability issues", state.scan_results.len())
        };
        let findings = state
            .scan_results
            .iter()
            .map(|vuln| FindingLine {
                severity: vuln.severity,
                kind: vuln.kind,
                description: vuln.description.clone(),
            })
            .collect();
        let (protection_label, protection_button) = if state.protection_active {
            ("Applied \u{2713}", ProtectionButton::Applied)
        } else {
            ("Not Applied", ProtectionButton::Apply)
        };
        Self {
            status_text,
            findings,
            protection_label,
            protection_button,
            badge_text: state.badge_text(),
            react_version: state.detected_react_version.clone(),
            mode_label: state.mode.to_string(),
            training_checked: state.training_active,
            auto_demo_visible: state.training_active,
            auto_demo_checked: state.auto_demo_active,
            log_lines: state
                .logs
                .iter()
                .map(crate::logbook::LogEntry::format_line)
                .collect(),
        }
    }
}

/// Drives the popup against a running session.
#[derive(Debug)]
pub struct PopupController {
    router: RouterHandle,
    page: PageHandle,
    pending: Option<Uuid>,
}

impl PopupController {
    /// Creates a controller over the session's handles.
    #[must_use]
    pub const fn new(router: RouterHandle, page: PageHandle) -> Self {
        Self {
            router,
            page,
            pending: None,
        }
    }

    /// Rebuilds the view from the background state.
    ///
    /// # Errors
    ///
    /// Returns an error if the background context cannot be reached.
    pub async fn refresh(&self) -> EscudoResult<PopupView> {
        let response = self.router.send(Request::GetState, POPUP_ORIGIN).await?;
        match response {
            Response::State { state, .. } => Ok(PopupView::build(&state)),
            other => Err(crate::result::EscudoError::transport(format!(
                "unexpected state response: {other:?}"
            ))),
        }
    }

    /// Asks the page for a fresh scan, then rebuilds the view. A page that
    /// cannot be reached is not fatal: the stored results stand in.
    ///
    /// # Errors
    ///
    /// Returns an error if the background context cannot be reached.
    pub async fn scan(&self) -> EscudoResult<PopupView> {
        if let Err(error) = self.page.send(PageCommand::Scan).await {
            tracing::debug!(error = %error, "page scan unavailable, showing stored results");
        }
        self.refresh().await
    }

    /// Installs the guard, waits out the page settling, and rescans.
    ///
    /// # Errors
    ///
    /// Returns an error if either context cannot be reached.
    pub async fn apply_protection(&self) -> EscudoResult<PopupView> {
        let reply = self.page.send(PageCommand::ApplyProtection).await?;
        if reply.success() {
            sleep(Duration::from_millis(RESCAN_DELAY_MS)).await;
            return self.scan().await;
        }
        self.refresh().await
    }

    /// Opens the training confirmation dialog and returns its token.
    pub fn request_training(&mut self) -> Uuid {
        let token = Uuid::new_v4();
        self.pending = Some(token);
        token
    }

    /// Abandons any open confirmation dialog.
    pub fn cancel_training(&mut self) {
        self.pending = None;
    }

    /// Confirms the dialog identified by `token` and activates training in
    /// both contexts. A token that no longer matches is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the background context cannot be reached.
    pub async fn confirm_training(&mut self, token: Uuid) -> EscudoResult<PopupView> {
        if self.pending != Some(token) {
            tracing::debug!(%token, "stale training confirmation ignored");
            return self.refresh().await;
        }
        self.pending = None;
        self.router
            .send(Request::set_training_mode(true, true), POPUP_ORIGIN)
            .await?;
        if let Err(error) = self
            .page
            .send(PageCommand::SetMode {
                mode: Mode::Training,
            })
            .await
        {
            tracing::debug!(error = %error, "page missed the training switch");
        }
        self.refresh().await
    }

    /// Leaves training mode in both contexts. No confirmation needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the background context cannot be reached.
    pub async fn deactivate_training(&mut self) -> EscudoResult<PopupView> {
        self.pending = None;
        self.router
            .send(Request::set_training_mode(false, false), POPUP_ORIGIN)
            .await?;
        if let Err(error) = self
            .page
            .send(PageCommand::SetMode {
                mode: Mode::Defense,
            })
            .await
        {
            tracing::debug!(error = %error, "page missed the defense switch");
        }
        self.refresh().await
    }

    /// Flips the auto-demo flag in both contexts.
    ///
    /// # Errors
    ///
    /// Returns an error if the background context cannot be reached.
    pub async fn set_auto_demo(&self, enabled: bool) -> EscudoResult<PopupView> {
        self.router
            .send(Request::set_auto_demo(enabled), POPUP_ORIGIN)
            .await?;
        if let Err(error) = self
            .page
            .send(PageCommand::SetAutoDemo { auto_demo: enabled })
            .await
        {
            tracing::debug!(error = %error, "page missed the auto-demo switch");
        }
        self.refresh().await
    }

    /// Requests a demonstration through the router, which gates it on
    /// training mode and logs the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the background context cannot be reached.
    pub async fn demonstrate(&self, attack_type: &str) -> EscudoResult<Response> {
        self.router
            .send(Request::demonstrate_attack(attack_type), POPUP_ORIGIN)
            .await
    }

    /// Stops the running demonstration, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if either context cannot be reached.
    pub async fn stop_demo(&self) -> EscudoResult<PopupView> {
        self.page.send(PageCommand::StopDemonstration).await?;
        self.refresh().await
    }

    /// Clears the activity log.
    ///
    /// # Errors
    ///
    /// Returns an error if the background context cannot be reached.
    pub async fn clear_logs(&self) -> EscudoResult<PopupView> {
        self.router.send(Request::ClearLogs, POPUP_ORIGIN).await?;
        self.refresh().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::demo::{DemoSchedule, TRAINING_BANNER_ID};
    use crate::page::PageWorld;
    use crate::persist::MemoryStore;
    use crate::runtime::{RuntimeConfig, SessionRuntime};
    use crate::state::Vulnerability;

    fn finding(kind: VulnKind, severity: Severity) -> Vulnerability {
        Vulnerability::new(
            kind,
            severity,
            "ReactDOM.render is accessible to potential attackers",
            "https://app.example/",
            "The ReactDOM.render method can be used to inject content",
        )
    }

    // ===== View tests =====

    #[test]
    fn test_view_of_clean_state() {
        let view = PopupView::build(&SharedState::default());
        assert_eq!(view.status_text, "No vulnerabilities detected");
        assert!(view.findings.is_empty());
        assert_eq!(view.protection_label, "Not Applied");
        assert_eq!(view.protection_button, ProtectionButton::Apply);
        assert!(view.protection_button.enabled());
        assert_eq!(view.badge_text, "");
        assert_eq!(view.mode_label, "defense");
        assert!(!view.training_checked);
        assert!(!view.auto_demo_visible);
        assert!(view.log_lines.is_empty());
    }

    #[test]
    fn test_view_lists_findings_with_badge() {
        let state = SharedState {
            scan_results: vec![
                finding(VulnKind::ExposedReactInternals, Severity::High),
                finding(VulnKind::UnprotectedRender, Severity::Medium),
            ],
            ..SharedState::default()
        };
        let view = PopupView::build(&state);
        assert_eq!(view.status_text, "Found 2 vulnerability issues");
        assert_eq!(view.badge_text, "2");
        assert_eq!(view.findings.len(), 2);
        assert_eq!(view.findings[0].severity, Severity::High);
        assert_eq!(
            view.findings[1].line(),
            "MEDIUM: ReactDOM.render is accessible to potential attackers"
        );
    }

    #[test]
    fn test_view_of_protected_state() {
        let state = SharedState {
            protection_active: true,
            ..SharedState::default()
        };
        let view = PopupView::build(&state);
        assert_eq!(view.protection_label, "Applied \u{2713}");
        assert_eq!(view.protection_button, ProtectionButton::Applied);
        assert!(!view.protection_button.enabled());
        assert_eq!(view.protection_button.label(), "Protection Applied");
    }

    #[test]
    fn test_view_shows_auto_demo_only_in_training() {
        let mut state = SharedState::default();
        state.activate_training();
        let view = PopupView::build(&state);
        assert!(view.training_checked);
        assert!(view.auto_demo_visible);
        assert!(!view.auto_demo_checked);
        assert_eq!(view.mode_label, "training");
    }

    #[test]
    fn test_view_formats_log_lines() {
        let mut state = SharedState::default();
        state.logs.record(crate::logbook::LogEntry::new(
            "scan",
            "completed",
            serde_json::Map::new(),
        ));
        let view = PopupView::build(&state);
        assert_eq!(view.log_lines.len(), 1);
        assert!(view.log_lines[0].contains("scan"));
        assert!(view.log_lines[0].contains("completed"));
    }

    // ===== Controller tests =====

    fn session() -> SessionRuntime {
        let world = PageWorld::new("https://app.example/")
            .with_react("18.2.0")
            .with_react_dom()
            .with_root_markers(1);
        let config = RuntimeConfig {
            request_timeout_ms: 1_000,
            initial_scan_delay_ms: 3_600_000,
            schedule: DemoSchedule {
                settle_ms: 1,
                observe_ms: 40,
                between_ms: 1,
                hook_interval_ms: 20,
            },
            extension_id: "escudo".to_string(),
        };
        SessionRuntime::start(config, MemoryStore::default(), world)
    }

    fn controller_for(session: &SessionRuntime) -> PopupController {
        PopupController::new(session.router().clone(), session.page().clone())
    }

    #[tokio::test]
    async fn test_scan_populates_view() {
        let session = session();
        let controller = controller_for(&session);
        let view = controller.scan().await.unwrap();
        assert!(!view.findings.is_empty());
        assert_eq!(
            view.status_text,
            format!("Found {} vulnerability issues", view.findings.len())
        );
        assert_eq!(view.react_version.as_deref(), Some("18.2.0"));
        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_protection_rescans_with_fewer_findings() {
        let session = session();
        let controller = controller_for(&session);
        let before = controller.scan().await.unwrap();
        assert!(before
            .findings
            .iter()
            .any(|f| f.kind == VulnKind::ExposedReactInternals));

        let after = controller.apply_protection().await.unwrap();
        assert_eq!(after.protection_label, "Applied \u{2713}");
        assert_eq!(after.protection_button, ProtectionButton::Applied);
        assert!(after
            .findings
            .iter()
            .all(|f| f.kind != VulnKind::ExposedReactInternals));
        assert!(after.findings.len() < before.findings.len());
        session.shutdown();
    }

    #[tokio::test]
    async fn test_training_confirmation_flips_both_contexts() {
        let session = session();
        let mut controller = controller_for(&session);
        let token = controller.request_training();
        let view = controller.confirm_training(token).await.unwrap();
        assert!(view.training_checked);
        assert!(view.auto_demo_visible);
        assert_eq!(view.mode_label, "training");

        let world = session.page().snapshot().await.unwrap();
        assert!(world.element(TRAINING_BANNER_ID).is_some());
        session.shutdown();
    }

    #[tokio::test]
    async fn test_stale_token_cannot_activate_training() {
        let session = session();
        let mut controller = controller_for(&session);
        let stale = controller.request_training();
        let current = controller.request_training();

        let view = controller.confirm_training(stale).await.unwrap();
        assert!(!view.training_checked);

        let view = controller.confirm_training(current).await.unwrap();
        assert!(view.training_checked);
        session.shutdown();
    }

    #[tokio::test]
    async fn test_cancelled_dialog_is_inert() {
        let session = session();
        let mut controller = controller_for(&session);
        let token = controller.request_training();
        controller.cancel_training();
        let view = controller.confirm_training(token).await.unwrap();
        assert!(!view.training_checked);
        session.shutdown();
    }

    #[tokio::test]
    async fn test_deactivation_clears_training_everywhere() {
        let session = session();
        let mut controller = controller_for(&session);
        let token = controller.request_training();
        controller.confirm_training(token).await.unwrap();
        controller.set_auto_demo(true).await.unwrap();

        let view = controller.deactivate_training().await.unwrap();
        assert!(!view.training_checked);
        assert!(!view.auto_demo_checked);
        assert!(!view.auto_demo_visible);
        assert_eq!(view.mode_label, "defense");

        let world = session.page().snapshot().await.unwrap();
        assert!(world.element(TRAINING_BANNER_ID).is_none());
        session.shutdown();
    }

    #[tokio::test]
    async fn test_demonstrate_is_gated_until_confirmed() {
        let session = session();
        let mut controller = controller_for(&session);
        let refused = controller.demonstrate("cookieAccess").await.unwrap();
        assert_eq!(
            refused,
            Response::failure("Training mode must be active to demonstrate attacks")
        );

        let token = controller.request_training();
        controller.confirm_training(token).await.unwrap();
        let accepted = controller.demonstrate("cookieAccess").await.unwrap();
        assert!(accepted.success());
        assert!(session
            .page()
            .active_demonstration()
            .await
            .unwrap()
            .is_some());
        session.shutdown();
    }

    #[tokio::test]
    async fn test_stop_demo_clears_active_demonstration() {
        let session = session();
        let mut controller = controller_for(&session);
        let token = controller.request_training();
        controller.confirm_training(token).await.unwrap();
        controller.demonstrate("cookieAccess").await.unwrap();
        assert!(session
            .page()
            .active_demonstration()
            .await
            .unwrap()
            .is_some());

        controller.stop_demo().await.unwrap();
        assert!(session
            .page()
            .active_demonstration()
            .await
            .unwrap()
            .is_none());
        session.shutdown();
    }

    #[tokio::test]
    async fn test_clear_logs_empties_view() {
        let session = session();
        let controller = controller_for(&session);
        let view = controller.scan().await.unwrap();
        assert!(!view.log_lines.is_empty());

        let view = controller.clear_logs().await.unwrap();
        assert!(view.log_lines.is_empty());
        session.shutdown();
    }
}
