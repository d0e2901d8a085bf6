//! Async session runtime.
//!
//! Wires the two contexts together: the background [`Router`] and the page
//! [`PageAgent`] each run as a task owning their state, reachable only
//! through handles. Values crossing a handle are serialized and rebuilt,
//! so nothing that cannot survive the wire sneaks across a boundary.
//!
//! Message flow mirrors the contexts' roles. The page reports upward with
//! fire-and-forget sends; the background replies to each request before
//! forwarding any command down to the page. That discipline keeps the two
//! mailbox loops from ever waiting on each other.

use crate::agent::PageAgent;
use crate::demo::{DemoKind, DemoSchedule, AUTO_SEQUENCE};
use crate::guard::{LegitimacyPolicy, DEFAULT_EXTENSION_ID};
use crate::message::{PageCommand, PageReply, Request, Response};
use crate::page::PageWorld;
use crate::persist::StateStore;
use crate::result::{EscudoError, EscudoResult};
use crate::router::Router;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// How long a handle waits for a reply before giving up
    pub request_timeout_ms: u64,
    /// Delay between session start and the automatic first scan
    pub initial_scan_delay_ms: u64,
    /// Demonstration pacing
    pub schedule: DemoSchedule,
    /// Identity the guard treats as its own origin
    pub extension_id: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            initial_scan_delay_ms: 1_000,
            schedule: DemoSchedule::default(),
            extension_id: DEFAULT_EXTENSION_ID.to_string(),
        }
    }
}

/// Rebuilds a value through its serialized form, the way a context
/// boundary would.
fn structured_clone<T>(value: &T) -> EscudoResult<T>
where
    T: Serialize + DeserializeOwned,
{
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

struct RouterMsg {
    request: Request,
    origin: String,
    reply: oneshot::Sender<Response>,
}

enum PageMsg {
    Command {
        command: PageCommand,
        reply: oneshot::Sender<PageReply>,
    },
    DemoActive(oneshot::Sender<Option<DemoKind>>),
    Snapshot(oneshot::Sender<Box<PageWorld>>),
    InitialScan,
}

/// Client side of the background context.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    tx: mpsc::UnboundedSender<RouterMsg>,
    timeout_ms: u64,
}

impl RouterHandle {
    /// Sends a request and awaits the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the background context is gone or the reply
    /// does not arrive within the configured timeout.
    pub async fn send(&self, request: Request, origin: &str) -> EscudoResult<Response> {
        let request = structured_clone(&request)?;
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RouterMsg {
                request,
                origin: origin.to_string(),
                reply,
            })
            .map_err(|_| EscudoError::transport("background context is gone"))?;
        let response = match timeout(Duration::from_millis(self.timeout_ms), rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(EscudoError::transport(
                    "background context dropped the reply",
                ))
            }
            Err(_) => {
                return Err(EscudoError::Timeout {
                    ms: self.timeout_ms,
                })
            }
        };
        structured_clone(&response)
    }

    /// Queues a request without waiting for the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the background context is gone.
    pub fn report(&self, request: Request, origin: &str) -> EscudoResult<()> {
        let request = structured_clone(&request)?;
        let (reply, _discarded) = oneshot::channel();
        self.tx
            .send(RouterMsg {
                request,
                origin: origin.to_string(),
                reply,
            })
            .map_err(|_| EscudoError::transport("background context is gone"))
    }
}

/// Client side of the page context.
#[derive(Debug, Clone)]
pub struct PageHandle {
    tx: mpsc::UnboundedSender<PageMsg>,
    timeout_ms: u64,
}

impl PageHandle {
    /// Sends a command and awaits the page's reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the page context is gone or the reply does not
    /// arrive within the configured timeout.
    pub async fn send(&self, command: PageCommand) -> EscudoResult<PageReply> {
        let command = structured_clone(&command)?;
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PageMsg::Command { command, reply })
            .map_err(|_| EscudoError::transport("page context is gone"))?;
        let page_reply = self.await_reply(rx).await?;
        structured_clone(&page_reply)
    }

    /// Which demonstration the page is currently running, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the page context is gone or does not answer in
    /// time.
    pub async fn active_demonstration(&self) -> EscudoResult<Option<DemoKind>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PageMsg::DemoActive(reply))
            .map_err(|_| EscudoError::transport("page context is gone"))?;
        self.await_reply(rx).await
    }

    /// A copy of the page world as the agent currently sees it.
    ///
    /// # Errors
    ///
    /// Returns an error if the page context is gone or does not answer in
    /// time.
    pub async fn snapshot(&self) -> EscudoResult<PageWorld> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PageMsg::Snapshot(reply))
            .map_err(|_| EscudoError::transport("page context is gone"))?;
        Ok(*self.await_reply(rx).await?)
    }

    async fn await_reply<T>(&self, rx: oneshot::Receiver<T>) -> EscudoResult<T> {
        match timeout(Duration::from_millis(self.timeout_ms), rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(EscudoError::transport("page context dropped the reply")),
            Err(_) => Err(EscudoError::Timeout {
                ms: self.timeout_ms,
            }),
        }
    }
}

/// One running pair of contexts.
#[derive(Debug)]
pub struct SessionRuntime {
    id: Uuid,
    router: RouterHandle,
    page: PageHandle,
    router_task: JoinHandle<()>,
    page_task: JoinHandle<()>,
}

impl SessionRuntime {
    /// Spawns the context tasks on the current Tokio runtime.
    ///
    /// The page agent starts over the given world; the router loads
    /// whatever the store holds. After the configured delay the page runs
    /// its first scan on its own.
    pub fn start<S>(config: RuntimeConfig, store: S, world: PageWorld) -> Self
    where
        S: StateStore + Send + 'static,
    {
        let (router_tx, router_rx) = mpsc::unbounded_channel();
        let (page_tx, page_rx) = mpsc::unbounded_channel();
        let router = RouterHandle {
            tx: router_tx,
            timeout_ms: config.request_timeout_ms,
        };
        let page = PageHandle {
            tx: page_tx.clone(),
            timeout_ms: config.request_timeout_ms,
        };

        let agent = PageAgent::new(world)
            .with_policy(LegitimacyPolicy::new(&config.extension_id))
            .with_schedule(config.schedule);

        let router_task = tokio::spawn(run_router(Router::new(store), router_rx, page.clone()));
        let page_task = tokio::spawn(run_page(
            agent,
            page_rx,
            router.clone(),
            page.clone(),
            config.schedule,
        ));

        let delay = config.initial_scan_delay_ms;
        tokio::spawn(async move {
            sleep(Duration::from_millis(delay)).await;
            let _ = page_tx.send(PageMsg::InitialScan);
        });

        Self {
            id: Uuid::new_v4(),
            router,
            page,
            router_task,
            page_task,
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Handle to the background context.
    #[must_use]
    pub const fn router(&self) -> &RouterHandle {
        &self.router
    }

    /// Handle to the page context.
    #[must_use]
    pub const fn page(&self) -> &PageHandle {
        &self.page
    }

    /// Stops both context tasks. Queued messages are dropped.
    pub fn shutdown(self) {
        self.router_task.abort();
        self.page_task.abort();
    }
}

async fn run_router<S: StateStore>(
    mut router: Router<S>,
    mut mailbox: mpsc::UnboundedReceiver<RouterMsg>,
    page: PageHandle,
) {
    while let Some(RouterMsg {
        request,
        origin,
        reply,
    }) = mailbox.recv().await
    {
        let outcome = router.handle(request, &origin);
        let _ = reply.send(outcome.response);
        if let Some(command) = outcome.forward {
            forward_to_page(&mut router, &page, command, &origin).await;
        }
    }
}

/// Forwards one command down to the page and, for demonstrations, records
/// how the page answered.
async fn forward_to_page<S: StateStore>(
    router: &mut Router<S>,
    page: &PageHandle,
    command: PageCommand,
    origin: &str,
) {
    let demo_kind = match &command {
        PageCommand::RunDemonstration { attack_type, .. } => Some(attack_type.clone()),
        _ => None,
    };
    let reply = match page.send(command).await {
        Ok(reply) => reply,
        Err(error) => PageReply::failure(error.to_string()),
    };
    if let Some(attack_type) = demo_kind {
        router.complete_demonstration(&attack_type, &reply, origin);
    }
}

async fn run_page(
    mut agent: PageAgent,
    mut mailbox: mpsc::UnboundedReceiver<PageMsg>,
    router: RouterHandle,
    page: PageHandle,
    schedule: DemoSchedule,
) {
    let (armed_tx, armed_rx) = watch::channel(false);
    let mut driver: Option<JoinHandle<()>> = None;

    while let Some(message) = mailbox.recv().await {
        match message {
            PageMsg::Command { command, reply } => {
                let outcome = agent.handle(command);
                route_outbox(&mut agent, &router);
                let _ = reply.send(outcome);

                armed_tx.send_replace(agent.auto_run_armed());
                let idle = driver.as_ref().map_or(true, JoinHandle::is_finished);
                if agent.auto_run_armed() && idle {
                    driver = Some(tokio::spawn(auto_demo_driver(
                        page.clone(),
                        armed_rx.clone(),
                        schedule,
                    )));
                }
            }
            PageMsg::DemoActive(reply) => {
                let _ = reply.send(agent.demo_active());
            }
            PageMsg::Snapshot(reply) => {
                let _ = reply.send(Box::new(agent.world().clone()));
            }
            PageMsg::InitialScan => {
                let _ = agent.handle(PageCommand::Scan);
                route_outbox(&mut agent, &router);
            }
        }
    }
}

/// Sends everything the agent queued up to the background. Reports are
/// fire-and-forget; a full mailbox cannot happen and a dead background
/// only costs the report.
fn route_outbox(agent: &mut PageAgent, router: &RouterHandle) {
    let origin = agent.world().url.clone();
    for request in agent.drain_outbox() {
        if let Err(error) = router.report(request, &origin) {
            tracing::warn!(error = %error, "background report failed");
        }
    }
}

/// Runs the demonstration sequence while the armed flag stays set.
///
/// Each pass runs one demonstration, leaves it visible for the observe
/// window, stops it, and pauses before the next. A refused demonstration
/// skips its waits; a dead page ends the run.
async fn auto_demo_driver(page: PageHandle, armed: watch::Receiver<bool>, schedule: DemoSchedule) {
    if !*armed.borrow() {
        return;
    }
    match page.active_demonstration().await {
        Ok(Some(_)) => {
            let _ = page.send(PageCommand::StopDemonstration).await;
            sleep(Duration::from_millis(schedule.settle_ms)).await;
        }
        Ok(None) => {}
        Err(_) => return,
    }
    for kind in AUTO_SEQUENCE {
        if !*armed.borrow() {
            break;
        }
        match page.send(PageCommand::run_demonstration(kind.wire_name())).await {
            Ok(reply) if reply.success() => {}
            Ok(_) => continue,
            Err(_) => break,
        }
        sleep(Duration::from_millis(schedule.observe_ms)).await;
        let _ = page.send(PageCommand::StopDemonstration).await;
        sleep(Duration::from_millis(schedule.between_ms)).await;
    }
    let _ = page.send(PageCommand::StopDemonstration).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::demo::INJECTION_ID;
    use crate::persist::MemoryStore;
    use crate::state::{Mode, SharedState};

    fn demo_world() -> PageWorld {
        PageWorld::new("https://app.example/")
            .with_react("18.2.0")
            .with_react_dom()
            .with_root_markers(1)
            .with_cookie("session", "abc123")
    }

    fn fast_config() -> RuntimeConfig {
        RuntimeConfig {
            request_timeout_ms: 1_000,
            // keep the startup scan away from the assertions
            initial_scan_delay_ms: 3_600_000,
            schedule: DemoSchedule {
                settle_ms: 1,
                observe_ms: 40,
                between_ms: 1,
                hook_interval_ms: 20,
            },
            extension_id: "escudo".to_string(),
        }
    }

    fn start_session() -> SessionRuntime {
        SessionRuntime::start(fast_config(), MemoryStore::default(), demo_world())
    }

    async fn background_state(session: &SessionRuntime) -> SharedState {
        let response = session
            .router()
            .send(Request::GetState, "popup")
            .await
            .unwrap();
        match response {
            Response::State { state, .. } => *state,
            other => panic!("expected state response, got {other:?}"),
        }
    }

    // ===== Config tests =====

    #[test]
    fn test_runtime_config_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.request_timeout_ms, 5_000);
        assert_eq!(config.initial_scan_delay_ms, 1_000);
        assert_eq!(config.extension_id, "escudo");

        let parsed: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, RuntimeConfig::default());
    }

    #[test]
    fn test_structured_clone_round_trips_requests() {
        let request = Request::demonstrate_attack("cookieAccess");
        let cloned = structured_clone(&request).unwrap();
        assert_eq!(cloned, request);
    }

    // ===== Session flow tests =====

    #[tokio::test]
    async fn test_scan_flows_into_background_state() {
        let session = start_session();
        let reply = session.page().send(PageCommand::Scan).await.unwrap();
        assert!(reply.success());

        let state = background_state(&session).await;
        assert!(!state.scan_results.is_empty());
        assert_eq!(state.detected_react_version.as_deref(), Some("18.2.0"));
        assert!(state
            .logs
            .iter()
            .any(|e| e.category == "scan" && e.action == "completed"));
        session.shutdown();
    }

    #[tokio::test]
    async fn test_protection_reaches_both_contexts() {
        let session = start_session();
        let reply = session
            .page()
            .send(PageCommand::ApplyProtection)
            .await
            .unwrap();
        assert_eq!(reply, PageReply::protection(true));

        let world = session.page().snapshot().await.unwrap();
        assert!(!world.react.unwrap().internals_exposed);

        let state = background_state(&session).await;
        assert!(state.protection_active);
        session.shutdown();
    }

    #[tokio::test]
    async fn test_demonstration_completion_recorded() {
        let session = start_session();
        session
            .router()
            .send(Request::set_training_mode(true, true), "popup")
            .await
            .unwrap();
        session
            .page()
            .send(PageCommand::SetMode {
                mode: Mode::Training,
            })
            .await
            .unwrap();

        let response = session
            .router()
            .send(Request::demonstrate_attack("cookieAccess"), "popup")
            .await
            .unwrap();
        assert!(response.success());

        let state = background_state(&session).await;
        let actions: Vec<&str> = state.logs.iter().map(|e| e.action.as_str()).collect();
        assert!(actions.contains(&"demonstrationRequested"));
        assert!(actions.contains(&"demonstrationCompleted"));
        assert_eq!(
            session.page().active_demonstration().await.unwrap(),
            Some(DemoKind::CookieAccess)
        );
        session.shutdown();
    }

    #[tokio::test]
    async fn test_demonstration_refused_outside_training() {
        let session = start_session();
        let response = session
            .router()
            .send(Request::demonstrate_attack("cookieAccess"), "popup")
            .await
            .unwrap();
        assert_eq!(
            response,
            Response::failure("Training mode must be active to demonstrate attacks")
        );
        assert!(session
            .page()
            .active_demonstration()
            .await
            .unwrap()
            .is_none());
        session.shutdown();
    }

    #[tokio::test]
    async fn test_page_refusal_logged_as_failed_demonstration() {
        let session = start_session();
        // Background says training, the page mirror was never flipped
        session
            .router()
            .send(Request::set_training_mode(true, true), "popup")
            .await
            .unwrap();
        session
            .router()
            .send(Request::demonstrate_attack("cookieAccess"), "popup")
            .await
            .unwrap();

        let state = background_state(&session).await;
        let newest_training = state.logs.entries_for_category("training").next().unwrap();
        assert_eq!(newest_training.action, "demonstrationFailed");
        assert_eq!(
            newest_training.details["error"],
            "Training mode must be active to run demonstrations"
        );
        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_scan_runs_after_startup_delay() {
        let config = RuntimeConfig {
            initial_scan_delay_ms: 1_000,
            ..fast_config()
        };
        let session = SessionRuntime::start(config, MemoryStore::default(), demo_world());
        sleep(Duration::from_millis(1_100)).await;

        let state = background_state(&session).await;
        assert!(state
            .logs
            .iter()
            .any(|e| e.category == "scan" && e.action == "completed"));
        assert!(!state.scan_results.is_empty());
        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_demo_driver_cycles_and_disarms() {
        let session = start_session();
        session
            .page()
            .send(PageCommand::SetMode {
                mode: Mode::Training,
            })
            .await
            .unwrap();
        session
            .page()
            .send(PageCommand::SetAutoDemo { auto_demo: true })
            .await
            .unwrap();

        // The second entry in the sequence leaves an injection marker behind
        let mut saw_injection = false;
        for _ in 0..400 {
            sleep(Duration::from_millis(5)).await;
            let world = session.page().snapshot().await.unwrap();
            if world.element(INJECTION_ID).is_some() {
                saw_injection = true;
                break;
            }
        }
        assert!(saw_injection, "driver never reached the DOM demonstration");

        session
            .page()
            .send(PageCommand::SetAutoDemo { auto_demo: false })
            .await
            .unwrap();
        sleep(Duration::from_millis(600)).await;
        assert!(session
            .page()
            .active_demonstration()
            .await
            .unwrap()
            .is_none());
        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_fails_after_shutdown() {
        let session = start_session();
        let router = session.router().clone();
        session.shutdown();
        assert!(router.send(Request::GetState, "popup").await.is_err());
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let first = start_session();
        let second = start_session();
        assert_ne!(first.id(), second.id());
        first.shutdown();
        second.shutdown();
    }
}
