//! Page-context agent.
//!
//! One agent runs per inspected page: it owns the page world, the guard,
//! and the demonstration session, and mirrors the mode flags the background
//! pushes down. Commands arrive from the router and popup; monitored
//! activity and scan results queue in the outbox as requests bound for the
//! router.

use crate::demo::{self, DemoKind, DemoSchedule, DemoSession};
use crate::detect;
use crate::guard::{CallContext, EventSink, Guard, LegitimacyPolicy, RenderOutcome, RootHandle};
use crate::message::{AttackDetails, PageCommand, PageReply, Request, SecurityEventReport};
use crate::page::{PageElement, PageWorld};
use crate::scanner;
use crate::state::Mode;

/// Queue of requests bound for the background router.
///
/// Doubles as the guard's event sink: monitored activity becomes
/// `securityEvent` and `attackAttempt` requests, kept in arrival order.
#[derive(Debug, Default)]
pub struct OutboxSink {
    queue: Vec<Request>,
}

impl OutboxSink {
    /// Queues a request.
    pub fn push(&mut self, request: Request) {
        self.queue.push(request);
    }

    /// Takes everything queued so far.
    pub fn drain(&mut self) -> Vec<Request> {
        self.queue.drain(..).collect()
    }

    /// Number of queued requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl EventSink for OutboxSink {
    fn security_event(&mut self, event: SecurityEventReport) {
        self.queue.push(Request::SecurityEvent {
            security_event: event,
        });
    }

    fn attack_attempt(&mut self, details: AttackDetails) {
        self.queue.push(Request::AttackAttempt { details });
    }
}

/// The page-context actor.
#[derive(Debug)]
pub struct PageAgent {
    world: PageWorld,
    guard: Guard,
    session: DemoSession,
    schedule: DemoSchedule,
    outbox: OutboxSink,
    mode: Mode,
    training_active: bool,
    auto_demo_active: bool,
    protection_active: bool,
    detection_reported: bool,
}

impl PageAgent {
    /// Creates an agent over a world, with the default policy and schedule.
    #[must_use]
    pub fn new(world: PageWorld) -> Self {
        Self {
            world,
            guard: Guard::default(),
            session: DemoSession::default(),
            schedule: DemoSchedule::default(),
            outbox: OutboxSink::default(),
            mode: Mode::Defense,
            training_active: false,
            auto_demo_active: false,
            protection_active: false,
            detection_reported: false,
        }
    }

    /// Replaces the guard's legitimacy policy.
    #[must_use]
    pub fn with_policy(mut self, policy: LegitimacyPolicy) -> Self {
        self.guard = Guard::new(policy);
        self
    }

    /// Replaces the demonstration schedule.
    #[must_use]
    pub fn with_schedule(mut self, schedule: DemoSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// The page world.
    #[must_use]
    pub const fn world(&self) -> &PageWorld {
        &self.world
    }

    /// Mode mirrored from the background.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the guard is installed on this page.
    #[must_use]
    pub const fn protection_active(&self) -> bool {
        self.protection_active
    }

    /// Whether training mode is mirrored on.
    #[must_use]
    pub const fn training_active(&self) -> bool {
        self.training_active
    }

    /// Currently running demonstration, if any.
    #[must_use]
    pub const fn demo_active(&self) -> Option<DemoKind> {
        self.session.active()
    }

    /// True when the automatic demonstration cycle may run: training mode
    /// on and the auto-demo flag set.
    #[must_use]
    pub const fn auto_run_armed(&self) -> bool {
        self.training_active && self.auto_demo_active
    }

    /// Takes the requests queued for the router.
    pub fn drain_outbox(&mut self) -> Vec<Request> {
        self.outbox.drain()
    }

    /// Handles one command from the router or popup.
    pub fn handle(&mut self, command: PageCommand) -> PageReply {
        match command {
            PageCommand::Scan => self.run_scan(),
            PageCommand::ApplyProtection => self.apply_protection(),
            PageCommand::CheckProtection => PageReply::protection(self.protection_active),
            PageCommand::RunDemonstration { attack_type, .. } => {
                self.run_demonstration(&attack_type)
            }
            PageCommand::StopDemonstration => {
                self.session.stop(&mut self.world);
                PageReply::ack()
            }
            PageCommand::SetMode { mode } => self.set_mode(mode),
            PageCommand::SetAutoDemo { auto_demo } => {
                self.auto_demo_active = auto_demo;
                PageReply::auto_demo_set(auto_demo)
            }
        }
    }

    fn run_scan(&mut self) -> PageReply {
        self.report_detection();
        let vulnerabilities = scanner::scan(&self.world);
        self.outbox
            .push(Request::scan_complete(vulnerabilities.clone()));
        PageReply::scan_report(vulnerabilities)
    }

    /// One-shot detection report, fired by the first scan that sees React.
    fn report_detection(&mut self) {
        if self.detection_reported || !detect::is_present(&self.world) {
            return;
        }
        self.detection_reported = true;
        self.outbox
            .push(Request::react_detected(detect::resolve_version(&self.world)));
    }

    fn apply_protection(&mut self) -> PageReply {
        if self.protection_active {
            return PageReply::protection(true);
        }
        if self.guard.apply(&mut self.world) {
            self.protection_active = true;
            self.outbox.push(Request::protection_status(true));
            PageReply::protection(true)
        } else {
            PageReply::protection(false)
        }
    }

    fn run_demonstration(&mut self, attack_type: &str) -> PageReply {
        let kind = match attack_type.parse::<DemoKind>() {
            Ok(kind) => kind,
            Err(error) => return PageReply::failure(error.to_string()),
        };
        match self
            .session
            .start(&mut self.world, kind, &self.schedule, self.training_active)
        {
            Ok(()) => PageReply::ack(),
            Err(error) => PageReply::failure(error.to_string()),
        }
    }

    fn set_mode(&mut self, mode: Mode) -> PageReply {
        self.mode = mode;
        match mode {
            Mode::Training => {
                self.training_active = true;
                demo::show_training_banner(&mut self.world);
            }
            Mode::Defense => {
                self.training_active = false;
                self.auto_demo_active = false;
                self.session.stop(&mut self.world);
                demo::hide_training_banner(&mut self.world);
            }
        }
        PageReply::mode_set(mode)
    }

    /// Runs a `ReactDOM.render` call through the guard.
    pub fn invoke_render(&mut self, ctx: &CallContext) -> RenderOutcome {
        self.guard
            .invoke_render(&mut self.world, ctx, &mut self.outbox)
    }

    /// Runs a `ReactDOM.createRoot` call through the guard.
    pub fn invoke_create_root(&mut self, ctx: &CallContext) -> RenderOutcome {
        self.guard
            .invoke_create_root(&mut self.world, ctx, &mut self.outbox)
    }

    /// Runs a `root.render` call through the guard.
    pub fn invoke_root_render(&mut self, root: &RootHandle, ctx: &CallContext) -> RenderOutcome {
        self.guard
            .invoke_root_render(&mut self.world, root, ctx, &mut self.outbox)
    }

    /// Monitored `localStorage.setItem`.
    pub fn storage_set(&mut self, key: &str, value: &str, stack: &str) {
        self.guard
            .storage_set(&mut self.world, key, value, stack, &mut self.outbox);
    }

    /// Monitored `localStorage.getItem`.
    pub fn storage_get(&mut self, key: &str, stack: &str) -> Option<String> {
        self.guard
            .storage_get(&self.world, key, stack, &mut self.outbox)
    }

    /// Monitored `localStorage.removeItem`.
    pub fn storage_remove(&mut self, key: &str, stack: &str) -> Option<String> {
        self.guard
            .storage_remove(&mut self.world, key, stack, &mut self.outbox)
    }

    /// Monitored `localStorage.clear`.
    pub fn storage_clear(&mut self, stack: &str) {
        self.guard
            .storage_clear(&mut self.world, stack, &mut self.outbox);
    }

    /// Monitored `document.cookie` read.
    pub fn cookie_read(&mut self, stack: &str) -> String {
        self.guard.cookie_read(&self.world, stack, &mut self.outbox)
    }

    /// Monitored `document.cookie` write.
    pub fn cookie_write(&mut self, value: &str, stack: &str) {
        self.guard
            .cookie_write(&mut self.world, value, stack, &mut self.outbox);
    }

    /// Monitored DOM insertion.
    pub fn insert_element(&mut self, element: PageElement) {
        self.guard
            .insert_element(&mut self.world, element, &mut self.outbox);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn react_agent() -> PageAgent {
        PageAgent::new(
            PageWorld::new("https://app.example/")
                .with_react("18.2.0")
                .with_react_dom(),
        )
    }

    // ===== Scan tests =====

    #[test]
    fn test_scan_replies_and_queues_results() {
        let mut agent = react_agent();
        let reply = agent.handle(PageCommand::Scan);
        let PageReply::ScanReport {
            vulnerabilities, ..
        } = &reply
        else {
            panic!("expected scan report, got {reply:?}");
        };
        assert!(!vulnerabilities.is_empty());

        let queued = agent.drain_outbox();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0], Request::react_detected("18.2.0"));
        assert_eq!(queued[1], Request::scan_complete(vulnerabilities.clone()));
    }

    #[test]
    fn test_scan_without_react_skips_detection() {
        let mut agent = PageAgent::new(PageWorld::new("https://plain.example/"));
        let reply = agent.handle(PageCommand::Scan);
        assert_eq!(reply, PageReply::scan_report(vec![]));
        let queued = agent.drain_outbox();
        assert_eq!(queued, vec![Request::scan_complete(vec![])]);
    }

    #[test]
    fn test_detection_reported_once_across_scans() {
        let mut agent = react_agent();
        agent.handle(PageCommand::Scan);
        agent.handle(PageCommand::Scan);
        let detections = agent
            .drain_outbox()
            .into_iter()
            .filter(|r| matches!(r, Request::ReactDetected { .. }))
            .count();
        assert_eq!(detections, 1);
    }

    // ===== Protection tests =====

    #[test]
    fn test_apply_protection_reports_status() {
        let mut agent = react_agent();
        let reply = agent.handle(PageCommand::ApplyProtection);
        assert_eq!(reply, PageReply::protection(true));
        assert!(agent.protection_active());
        assert_eq!(agent.drain_outbox(), vec![Request::protection_status(true)]);
        assert_eq!(
            agent.handle(PageCommand::CheckProtection),
            PageReply::protection(true)
        );
    }

    #[test]
    fn test_apply_protection_is_idempotent() {
        let mut agent = react_agent();
        agent.handle(PageCommand::ApplyProtection);
        agent.drain_outbox();

        let reply = agent.handle(PageCommand::ApplyProtection);
        assert_eq!(reply, PageReply::protection(true));
        assert!(agent.drain_outbox().is_empty());
    }

    #[test]
    fn test_apply_protection_without_react() {
        let mut agent = PageAgent::new(PageWorld::new("https://plain.example/"));
        let reply = agent.handle(PageCommand::ApplyProtection);
        assert_eq!(reply, PageReply::protection(false));
        assert!(!agent.protection_active());
        assert!(agent.drain_outbox().is_empty());
    }

    #[test]
    fn test_check_protection_defaults_false() {
        let mut agent = react_agent();
        assert_eq!(
            agent.handle(PageCommand::CheckProtection),
            PageReply::protection(false)
        );
    }

    // ===== Demonstration command tests =====

    #[test]
    fn test_unknown_demonstration_type_fails_cleanly() {
        let mut agent = react_agent();
        agent.handle(PageCommand::SetMode {
            mode: Mode::Training,
        });
        let reply = agent.handle(PageCommand::run_demonstration("bogus"));
        assert_eq!(
            reply,
            PageReply::failure("Unknown demonstration type: bogus")
        );
        assert!(agent.demo_active().is_none());
    }

    #[test]
    fn test_demonstration_requires_training_mode() {
        let mut agent = react_agent();
        let reply = agent.handle(PageCommand::run_demonstration("cookieAccess"));
        assert_eq!(
            reply,
            PageReply::failure("Training mode must be active to run demonstrations")
        );
        assert!(agent.demo_active().is_none());
    }

    #[test]
    fn test_training_mode_enables_demonstrations() {
        let mut agent = react_agent();
        let reply = agent.handle(PageCommand::SetMode {
            mode: Mode::Training,
        });
        assert_eq!(reply, PageReply::mode_set(Mode::Training));
        assert!(agent.training_active());
        assert!(agent.world().element(demo::TRAINING_BANNER_ID).is_some());

        let reply = agent.handle(PageCommand::run_demonstration("cookieAccess"));
        assert_eq!(reply, PageReply::ack());
        assert_eq!(agent.demo_active(), Some(DemoKind::CookieAccess));
    }

    #[test]
    fn test_stop_demonstration_acknowledges() {
        let mut agent = react_agent();
        agent.handle(PageCommand::SetMode {
            mode: Mode::Training,
        });
        agent.handle(PageCommand::run_demonstration("persistentHook"));
        let reply = agent.handle(PageCommand::StopDemonstration);
        assert_eq!(reply, PageReply::ack());
        assert!(agent.demo_active().is_none());
        assert_eq!(agent.world().timer_count(), 0);
    }

    #[test]
    fn test_defense_mode_stops_session_and_banner() {
        let mut agent = react_agent();
        agent.handle(PageCommand::SetMode {
            mode: Mode::Training,
        });
        agent.handle(PageCommand::SetAutoDemo { auto_demo: true });
        agent.handle(PageCommand::run_demonstration("cookieAccess"));
        assert!(agent.auto_run_armed());

        let reply = agent.handle(PageCommand::SetMode {
            mode: Mode::Defense,
        });
        assert_eq!(reply, PageReply::mode_set(Mode::Defense));
        assert!(agent.demo_active().is_none());
        assert!(!agent.auto_run_armed());
        assert!(!agent.training_active());
        assert!(agent.world().element(demo::TRAINING_BANNER_ID).is_none());
        assert!(agent.world().element(demo::DEMO_CONTAINER_ID).is_none());
    }

    #[test]
    fn test_auto_demo_armed_only_in_training() {
        let mut agent = react_agent();
        let reply = agent.handle(PageCommand::SetAutoDemo { auto_demo: true });
        assert_eq!(reply, PageReply::auto_demo_set(true));
        assert!(!agent.auto_run_armed());

        agent.handle(PageCommand::SetMode {
            mode: Mode::Training,
        });
        assert!(agent.auto_run_armed());
    }

    // ===== Monitored activity tests =====

    #[test]
    fn test_blocked_render_queues_attack_reports() {
        let mut agent = react_agent();
        agent.handle(PageCommand::ApplyProtection);
        agent.drain_outbox();

        let outcome = agent.invoke_render(&CallContext::injected(json!({"type": "div"})));
        assert_eq!(outcome, RenderOutcome::Blocked);

        let queued = agent.drain_outbox();
        assert_eq!(queued.len(), 2);
        let Request::AttackAttempt { details } = &queued[0] else {
            panic!("expected attack attempt, got {:?}", queued[0]);
        };
        assert_eq!(details.method, "render");
        let Request::SecurityEvent { security_event } = &queued[1] else {
            panic!("expected security event, got {:?}", queued[1]);
        };
        assert_eq!(security_event.action, "blocked_call");
        assert_eq!(security_event.target, "reactdom_render");
    }

    #[test]
    fn test_unprotected_page_stays_silent() {
        let mut agent = react_agent();
        let outcome = agent.invoke_render(&CallContext::injected(json!({"type": "div"})));
        assert_eq!(outcome, RenderOutcome::Rendered);
        agent.storage_set("authToken", "secret", "at app (https://app.example/main.js:1:1)");
        assert!(agent.drain_outbox().is_empty());
    }

    #[test]
    fn test_storage_monitoring_queues_events() {
        let mut agent = react_agent();
        agent.handle(PageCommand::ApplyProtection);
        agent.drain_outbox();

        agent.storage_set("authToken", "secret", "at eval (injected:1:1)");
        assert_eq!(
            agent.storage_get("authToken", "at eval (injected:1:1)"),
            Some("secret".to_string())
        );
        assert_eq!(
            agent.storage_remove("authToken", "at eval (injected:1:1)"),
            Some("secret".to_string())
        );
        agent.storage_clear("at eval (injected:1:1)");
        assert!(agent.world().storage.is_empty());

        let actions: Vec<String> = agent
            .drain_outbox()
            .into_iter()
            .filter_map(|request| match request {
                Request::SecurityEvent { security_event } => Some(security_event.action),
                _ => None,
            })
            .collect();
        assert_eq!(
            actions,
            vec!["sensitive_storage", "access", "removal", "clear"]
        );
    }

    #[test]
    fn test_cookie_monitoring_queues_events() {
        let mut agent = PageAgent::new(
            PageWorld::new("https://app.example/")
                .with_react("18.2.0")
                .with_react_dom()
                .with_cookie("session", "s3cr3t"),
        );
        agent.handle(PageCommand::ApplyProtection);
        agent.drain_outbox();

        agent.cookie_write("tracking=1; path=/", "at eval (injected:1:1)");
        assert_eq!(
            agent.cookie_read("at eval (injected:1:1)"),
            "session=s3cr3t; tracking=1"
        );

        let targets: Vec<String> = agent
            .drain_outbox()
            .into_iter()
            .filter_map(|request| match request {
                Request::SecurityEvent { security_event } => Some(security_event.target),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec!["document_cookie", "document_cookie"]);
    }

    #[test]
    fn test_suspicious_insertion_reported_and_kept() {
        let mut agent = react_agent();
        agent.handle(PageCommand::ApplyProtection);
        agent.drain_outbox();

        agent.insert_element(
            PageElement::new("form")
                .with_id("phish")
                .with_child(PageElement::new("input").with_attr("type", "password")),
        );
        assert!(agent.world().element("phish").is_some());

        let queued = agent.drain_outbox();
        assert_eq!(queued.len(), 1);
        let Request::SecurityEvent { security_event } = &queued[0] else {
            panic!("expected security event, got {:?}", queued[0]);
        };
        assert_eq!(security_event.action, "suspicious_element");
        assert_eq!(security_event.target, "dom_mutation");
    }

    // ===== Property tests =====

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn command_for(selector: u8, flag: bool) -> PageCommand {
            match selector {
                0 => PageCommand::Scan,
                1 => PageCommand::ApplyProtection,
                2 => PageCommand::CheckProtection,
                3 => PageCommand::run_demonstration(if flag {
                    "cookieAccess"
                } else {
                    "persistentHook"
                }),
                4 => PageCommand::StopDemonstration,
                5 => PageCommand::SetMode {
                    mode: if flag { Mode::Training } else { Mode::Defense },
                },
                _ => PageCommand::SetAutoDemo { auto_demo: flag },
            }
        }

        proptest! {
            #[test]
            fn prop_demos_only_run_in_training(
                ops in proptest::collection::vec((0u8..7, any::<bool>()), 1..30)
            ) {
                let mut agent = react_agent();
                for (selector, flag) in ops {
                    agent.handle(command_for(selector, flag));
                    prop_assert!(agent.demo_active().is_none() || agent.training_active());
                }
            }

            #[test]
            fn prop_defense_always_disarms(
                ops in proptest::collection::vec((0u8..7, any::<bool>()), 1..30)
            ) {
                let mut agent = react_agent();
                for (selector, flag) in ops {
                    agent.handle(command_for(selector, flag));
                }
                agent.handle(PageCommand::SetMode { mode: Mode::Defense });
                prop_assert!(!agent.auto_run_armed());
                prop_assert!(agent.demo_active().is_none());
                prop_assert!(agent.world().element(demo::TRAINING_BANNER_ID).is_none());
            }
        }
    }
}
