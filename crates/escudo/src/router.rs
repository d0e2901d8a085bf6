//! Background router.
//!
//! The router owns the shared state. Every request from the popup and page
//! contexts lands here, mutates the state, appends to the log, and writes
//! the result through the store. Routing never fails: refused operations
//! come back as tagged failure responses, and persistence trouble is logged
//! without failing the operation that triggered it.

use crate::logbook::LogEntry;
use crate::message::{
    AttackDetails, PageCommand, PageReply, Request, Response, SecurityEventReport,
};
use crate::persist::{PersistedState, StateStore};
use crate::result::EscudoError;
use crate::state::{SharedState, Vulnerability};
use serde_json::{json, Map, Value};

/// Refusal sent for demonstration requests outside training mode.
const DEMO_REFUSED: &str = "Training mode must be active to demonstrate attacks";

/// What routing one request produced: the reply to the sender, plus an
/// optional command to forward to the page context.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterOutcome {
    /// Reply for the request's sender
    pub response: Response,
    /// Command the runtime should forward to the page
    pub forward: Option<PageCommand>,
}

impl RouterOutcome {
    /// Plain reply, nothing forwarded.
    #[must_use]
    pub const fn reply(response: Response) -> Self {
        Self {
            response,
            forward: None,
        }
    }

    /// Reply plus a command for the page context.
    #[must_use]
    pub const fn with_forward(response: Response, command: PageCommand) -> Self {
        Self {
            response,
            forward: Some(command),
        }
    }
}

/// The background context: shared state, log, and persistence.
#[derive(Debug)]
pub struct Router<S: StateStore> {
    state: SharedState,
    store: S,
    version: String,
}

impl<S: StateStore> Router<S> {
    /// Creates a router over a store, loading any persisted state.
    ///
    /// No snapshot logs a fresh install; a snapshot written by a different
    /// version logs an upgrade. An unreadable snapshot is logged and the
    /// router starts from defaults.
    pub fn new(store: S) -> Self {
        Self::with_version(store, crate::VERSION)
    }

    /// Creates a router reporting a specific suite version.
    pub fn with_version(mut store: S, version: &str) -> Self {
        let loaded = store.load();
        let mut router = Self {
            state: SharedState::default(),
            store,
            version: version.to_string(),
        };
        match loaded {
            Ok(None) => {
                router.log(
                    "system",
                    "installed",
                    details_map(vec![("version", json!(version))]),
                );
                router.persist();
            }
            Ok(Some(snapshot)) => {
                let previous = snapshot.recorded_by;
                router.state = snapshot.state;
                if previous != version {
                    router.log(
                        "system",
                        "updated",
                        details_map(vec![
                            ("version", json!(version)),
                            ("previousVersion", json!(previous)),
                        ]),
                    );
                    router.persist();
                }
            }
            Err(error) => {
                let error = EscudoError::PersistenceFailure {
                    message: error.to_string(),
                };
                tracing::error!(error = %error, "persisted state unreadable, starting fresh");
            }
        }
        router
    }

    /// The shared state.
    #[must_use]
    pub const fn state(&self) -> &SharedState {
        &self.state
    }

    /// Routes one request from the given origin (a page URL, or `popup`).
    pub fn handle(&mut self, request: Request, origin: &str) -> RouterOutcome {
        match request {
            Request::GetState => RouterOutcome::reply(Response::state(self.state.clone())),
            Request::ScanComplete { vulnerabilities } => {
                self.scan_complete(vulnerabilities, origin)
            }
            Request::ReactDetected { version } => self.react_detected(version, origin),
            Request::ProtectionStatus { active } => self.protection_status(active, origin),
            Request::SetTrainingMode { active, confirmed } => {
                self.set_training_mode(active, confirmed, origin)
            }
            Request::SetAutoDemo { auto_demo } => self.set_auto_demo(auto_demo, origin),
            Request::DemonstrateAttack {
                attack_type,
                options,
            } => self.demonstrate_attack(attack_type, options, origin),
            Request::ClearLogs => self.clear_logs(),
            Request::SecurityEvent { security_event } => self.security_event(security_event),
            Request::AttackAttempt { details } => self.attack_attempt(&details, origin),
        }
    }

    /// Records the page's answer to a forwarded demonstration command.
    pub fn complete_demonstration(&mut self, attack_type: &str, reply: &PageReply, origin: &str) {
        if reply.success() {
            self.log(
                "training",
                "demonstrationCompleted",
                details_map(vec![
                    ("url", json!(origin)),
                    ("attackType", json!(attack_type)),
                ]),
            );
        } else {
            let error = reply.error().unwrap_or("unknown error");
            self.log(
                "training",
                "demonstrationFailed",
                details_map(vec![
                    ("url", json!(origin)),
                    ("attackType", json!(attack_type)),
                    ("error", json!(error)),
                ]),
            );
        }
        self.persist();
    }

    fn scan_complete(
        &mut self,
        vulnerabilities: Vec<Vulnerability>,
        origin: &str,
    ) -> RouterOutcome {
        let count = vulnerabilities.len();
        self.state.scan_results = vulnerabilities;
        self.log(
            "scan",
            "completed",
            details_map(vec![
                ("url", json!(origin)),
                ("vulnerabilitiesFound", json!(count)),
            ]),
        );
        self.persist();
        RouterOutcome::reply(Response::ack())
    }

    fn react_detected(&mut self, version: String, origin: &str) -> RouterOutcome {
        self.state.detected_react_version = Some(version.clone());
        self.log(
            "detection",
            "reactFound",
            details_map(vec![("url", json!(origin)), ("version", json!(version))]),
        );
        self.persist();
        RouterOutcome::reply(Response::ack())
    }

    fn protection_status(&mut self, active: bool, origin: &str) -> RouterOutcome {
        self.state.protection_active = active;
        let action = if active { "enabled" } else { "disabled" };
        self.log(
            "protection",
            action,
            details_map(vec![("url", json!(origin))]),
        );
        self.persist();
        RouterOutcome::reply(Response::ack())
    }

    /// Training-mode switch. Activation is logged whether or not it is
    /// confirmed, but only a confirmed request flips the state. A request
    /// matching the current state is answered without logging anything.
    fn set_training_mode(&mut self, active: bool, confirmed: bool, origin: &str) -> RouterOutcome {
        if active == self.state.training_active {
            return RouterOutcome::reply(Response::training_mode(
                self.state.training_active,
                self.state.mode,
            ));
        }
        if active {
            self.log(
                "training",
                "activated",
                details_map(vec![("url", json!(origin)), ("confirmed", json!(confirmed))]),
            );
            if confirmed {
                self.state.activate_training();
            }
        } else {
            self.log(
                "training",
                "deactivated",
                details_map(vec![("url", json!(origin))]),
            );
            self.state.deactivate_training();
        }
        self.persist();
        RouterOutcome::reply(Response::training_mode(
            self.state.training_active,
            self.state.mode,
        ))
    }

    fn set_auto_demo(&mut self, auto_demo: bool, origin: &str) -> RouterOutcome {
        self.state.auto_demo_active = auto_demo;
        let action = if auto_demo {
            "autoDemoEnabled"
        } else {
            "autoDemoDisabled"
        };
        self.log("training", action, details_map(vec![("url", json!(origin))]));
        self.persist();
        RouterOutcome::reply(Response::auto_demo(auto_demo))
    }

    fn demonstrate_attack(
        &mut self,
        attack_type: String,
        options: Map<String, Value>,
        origin: &str,
    ) -> RouterOutcome {
        if !self.state.training_active {
            return RouterOutcome::reply(Response::failure(DEMO_REFUSED));
        }
        self.log(
            "training",
            "demonstrationRequested",
            details_map(vec![
                ("url", json!(origin)),
                ("attackType", json!(attack_type.clone())),
            ]),
        );
        self.persist();
        RouterOutcome::with_forward(
            Response::ack(),
            PageCommand::RunDemonstration {
                attack_type,
                options,
            },
        )
    }

    fn clear_logs(&mut self) -> RouterOutcome {
        self.state.logs.clear();
        self.persist();
        RouterOutcome::reply(Response::ack())
    }

    fn security_event(&mut self, event: SecurityEventReport) -> RouterOutcome {
        let mut payload = details_map(vec![
            ("url", json!(event.url)),
            ("target", json!(event.target)),
        ]);
        for (key, value) in event.details {
            payload.insert(key, value);
        }
        self.log("security", &event.action, payload);
        self.persist();
        RouterOutcome::reply(Response::ack())
    }

    fn attack_attempt(&mut self, attack: &AttackDetails, origin: &str) -> RouterOutcome {
        self.log(
            "security",
            "attackAttempt",
            details_map(vec![
                ("url", json!(origin)),
                ("method", json!(attack.method)),
                ("args", json!(attack.args)),
                ("stack", json!(attack.stack)),
            ]),
        );
        self.persist();
        RouterOutcome::reply(Response::ack())
    }

    fn log(&mut self, category: &str, action: &str, details: Map<String, Value>) {
        self.state.logs.record(LogEntry::new(category, action, details));
    }

    /// Writes the state through the store. A failed write is logged; the
    /// triggering operation carries on.
    fn persist(&mut self) {
        let snapshot = PersistedState::new(self.version.clone(), self.state.clone());
        if let Err(error) = self.store.save(&snapshot) {
            let error = EscudoError::PersistenceFailure {
                message: error.to_string(),
            };
            tracing::error!(error = %error, "state persistence failed");
        }
    }
}

fn details_map(pairs: Vec<(&'static str, Value)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
