//! Runtime protection guard.
//!
//! [`Guard::apply`] hardens a page world: render entry points are marked
//! protected, the secret internals objects stop being reachable, and the
//! storage, cookie, and DOM monitors come up. After that, every intercepted
//! call goes through a [`Guard`] method, which consults the
//! [`LegitimacyPolicy`] and reports what it saw to an [`EventSink`]. Blocked
//! calls produce both an [`AttackDetails`] report and a `blocked_call`
//! security event; monitored-but-allowed activity produces security events
//! only, and the underlying operation still goes through.

use crate::message::{AttackDetails, SecurityEventReport};
use crate::page::{PageElement, PageWorld};
use serde_json::{Map, Value};

/// Extension id used when a runtime does not supply its own.
pub const DEFAULT_EXTENSION_ID: &str = "escudo";

/// Stack fragments that mark a call as injected rather than application code.
const SUSPICIOUS_PATTERNS: [&str; 6] = [
    "chrome-extension://",
    "moz-extension://",
    "eval",
    "Function",
    "injected",
    "inject.js",
];

/// Storage key fragments that suggest secret material.
const SENSITIVE_KEY_PATTERNS: [&str; 9] = [
    "token",
    "auth",
    "key",
    "secret",
    "password",
    "credential",
    "session",
    "jwt",
    "api",
];

/// URI schemes that are suspicious inside attribute values.
const SUSPICIOUS_ATTRIBUTE_SCHEMES: [&str; 3] = ["javascript:", "data:", "vbscript:"];

/// True when a storage key looks like it holds secrets.
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEY_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// True when an inserted element matches a known injection pattern: a form
/// collecting passwords, an unsandboxed iframe, an inline script, or any
/// attribute value smuggling a script-capable URI scheme.
#[must_use]
pub fn is_suspicious_element(element: &PageElement) -> bool {
    if element.tag == "form" && element.contains_password_input() {
        return true;
    }
    if element.tag == "iframe" && element.attr("sandbox").is_none() {
        return true;
    }
    if element.tag == "script"
        && element.text.as_deref().is_some_and(|text| !text.is_empty())
        && element.attr("src").is_none()
    {
        return true;
    }
    element.attributes.values().any(|value| {
        let lower = value.to_lowercase();
        SUSPICIOUS_ATTRIBUTE_SCHEMES
            .iter()
            .any(|scheme| lower.contains(scheme))
    })
}

/// Decides whether an intercepted call came from application code.
#[derive(Debug, Clone)]
pub struct LegitimacyPolicy {
    suspicious_patterns: Vec<String>,
    own_origin: String,
}

impl LegitimacyPolicy {
    /// Policy that trusts stacks mentioning our own extension origin.
    #[must_use]
    pub fn new(extension_id: &str) -> Self {
        Self {
            suspicious_patterns: SUSPICIOUS_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            own_origin: format!("chrome-extension://{extension_id}"),
        }
    }

    /// True when the stack carries a suspicious fragment and none of our own
    /// frames. A stack that passes through this extension is always trusted.
    #[must_use]
    pub fn is_suspicious(&self, stack: &str) -> bool {
        if stack.contains(&self.own_origin) {
            return false;
        }
        self.suspicious_patterns
            .iter()
            .any(|pattern| stack.contains(pattern.as_str()))
    }
}

impl Default for LegitimacyPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION_ID)
    }
}

/// Receives guard reports. The page agent forwards them to the router; tests
/// and the simulator record them directly.
pub trait EventSink {
    /// Monitored page activity.
    fn security_event(&mut self, event: SecurityEventReport);
    /// A render call the guard refused to forward.
    fn attack_attempt(&mut self, details: AttackDetails);
}

/// Sink that keeps everything it receives, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Security events observed
    pub events: Vec<SecurityEventReport>,
    /// Blocked-call reports observed
    pub attacks: Vec<AttackDetails>,
}

impl EventSink for RecordingSink {
    fn security_event(&mut self, event: SecurityEventReport) {
        self.events.push(event);
    }

    fn attack_attempt(&mut self, details: AttackDetails) {
        self.attacks.push(details);
    }
}

/// What the guard knows about one intercepted call.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Call stack as the page captured it
    pub stack: String,
    /// First argument to the call
    pub argument: Value,
}

impl CallContext {
    /// Creates a context from a raw stack and argument.
    #[must_use]
    pub fn new(stack: impl Into<String>, argument: Value) -> Self {
        Self {
            stack: stack.into(),
            argument,
        }
    }

    /// Context shaped like a call from bundled application code.
    #[must_use]
    pub fn application(argument: Value) -> Self {
        Self::new(
            "at renderApp (https://app.example/static/js/main.js:10:5)",
            argument,
        )
    }

    /// Context shaped like a call arriving through an injected script.
    #[must_use]
    pub fn injected(argument: Value) -> Self {
        Self::new("at eval (injected:1:1)", argument)
    }
}

/// Handle returned by an intercepted `createRoot` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootHandle {
    /// True for the inert decoy handed to blocked callers
    pub fake: bool,
}

/// What an intercepted render call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Forwarded to the real method
    Rendered,
    /// Refused; nothing rendered
    Blocked,
    /// A root handle, real or decoy
    Root(RootHandle),
}

/// The protection layer over one page world.
#[derive(Debug, Default)]
pub struct Guard {
    policy: LegitimacyPolicy,
    react_internals_trapped: bool,
    reactdom_internals_trapped: bool,
    monitors_installed: bool,
    storage_monitor: bool,
    cookie_monitor: bool,
}

impl Guard {
    /// Creates an uninstalled guard with the given policy.
    #[must_use]
    pub fn new(policy: LegitimacyPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Hardens the world. Returns whether anything was newly applied; a
    /// world with no React globals is left alone.
    ///
    /// Internals objects become unreachable (reads are trapped and reported
    /// instead), render entry points get their protected mark, and the
    /// storage, cookie, and DOM monitors come up. Re-applying over an
    /// already hardened world changes nothing and returns `false`.
    pub fn apply(&mut self, world: &mut PageWorld) -> bool {
        if world.react.is_none() && world.react_dom.is_none() {
            tracing::warn!(url = %world.url, "no React detected, nothing to protect");
            return false;
        }
        let mut applied = false;

        if let Some(react) = world.react.as_mut() {
            if react.internals_exposed {
                react.internals_exposed = false;
                self.react_internals_trapped = true;
                applied = true;
                tracing::debug!("protected React internals");
            }
        }
        if let Some(react_dom) = world.react_dom.as_mut() {
            if react_dom.internals_exposed {
                react_dom.internals_exposed = false;
                self.reactdom_internals_trapped = true;
                applied = true;
                tracing::debug!("protected ReactDOM internals");
            }
            for entry in [
                react_dom.render.as_mut(),
                react_dom.create_root.as_mut(),
                react_dom.find_dom_node.as_mut(),
            ]
            .into_iter()
            .flatten()
            {
                if !entry.protected {
                    entry.protected = true;
                    applied = true;
                }
            }
        }
        for monitor in [
            &mut self.monitors_installed,
            &mut self.storage_monitor,
            &mut self.cookie_monitor,
        ] {
            if !*monitor {
                *monitor = true;
                applied = true;
            }
        }

        if applied {
            tracing::info!(url = %world.url, "protection applied");
        }
        applied
    }

    /// An intercepted `ReactDOM.render` call.
    ///
    /// Suspicious calls against a protected entry are refused and reported;
    /// everything else forwards and bumps the entry's call count.
    pub fn invoke_render(
        &mut self,
        world: &mut PageWorld,
        ctx: &CallContext,
        sink: &mut dyn EventSink,
    ) -> RenderOutcome {
        let Some(entry) = world
            .react_dom
            .as_mut()
            .and_then(|dom| dom.render.as_mut())
        else {
            return RenderOutcome::Blocked;
        };
        if entry.protected && self.policy.is_suspicious(&ctx.stack) {
            let report = self.blocked_call(world, "reactdom_render", ctx);
            sink.attack_attempt(AttackDetails::new(
                "render",
                ctx.argument.to_string(),
                ctx.stack.clone(),
            ));
            sink.security_event(report);
            return RenderOutcome::Blocked;
        }
        entry.call_count += 1;
        RenderOutcome::Rendered
    }

    /// An intercepted `ReactDOM.createRoot` call.
    ///
    /// Suspicious calls against a protected entry get an inert decoy root
    /// and are reported; everything else gets a real handle.
    pub fn invoke_create_root(
        &mut self,
        world: &mut PageWorld,
        ctx: &CallContext,
        sink: &mut dyn EventSink,
    ) -> RenderOutcome {
        let Some(entry) = world
            .react_dom
            .as_mut()
            .and_then(|dom| dom.create_root.as_mut())
        else {
            return RenderOutcome::Blocked;
        };
        if entry.protected && self.policy.is_suspicious(&ctx.stack) {
            let report = self.blocked_call(world, "reactdom_createRoot", ctx);
            sink.attack_attempt(AttackDetails::new(
                "createRoot",
                ctx.argument.to_string(),
                ctx.stack.clone(),
            ));
            sink.security_event(report);
            return RenderOutcome::Root(RootHandle { fake: true });
        }
        entry.call_count += 1;
        RenderOutcome::Root(RootHandle { fake: false })
    }

    /// A `render` call on a root handle.
    ///
    /// The decoy root renders nothing. Real roots created through a
    /// protected `createRoot` carry the wrap forward: suspicious calls are
    /// refused and reported as `root_render`.
    pub fn invoke_root_render(
        &mut self,
        world: &mut PageWorld,
        root: &RootHandle,
        ctx: &CallContext,
        sink: &mut dyn EventSink,
    ) -> RenderOutcome {
        if root.fake {
            return RenderOutcome::Blocked;
        }
        let wrapped = world
            .react_dom
            .as_ref()
            .and_then(|dom| dom.create_root.as_ref())
            .is_some_and(|entry| entry.protected);
        if wrapped && self.policy.is_suspicious(&ctx.stack) {
            let report = self.blocked_call(world, "root_render", ctx);
            sink.security_event(report);
            return RenderOutcome::Blocked;
        }
        world.root_render_calls += 1;
        RenderOutcome::Rendered
    }

    /// An intercepted `ReactDOM.findDOMNode` call. Always forwards; when the
    /// entry is protected the call is reported. Returns whether the method
    /// existed to call.
    pub fn find_dom_node(
        &mut self,
        world: &mut PageWorld,
        stack: &str,
        sink: &mut dyn EventSink,
    ) -> bool {
        let Some(entry) = world
            .react_dom
            .as_mut()
            .and_then(|dom| dom.find_dom_node.as_mut())
        else {
            return false;
        };
        entry.call_count += 1;
        if entry.protected {
            sink.security_event(SecurityEventReport::new(
                "call",
                "reactdom_findDOMNode",
                details_map(vec![("stack", Value::String(stack.to_string()))]),
                world.url.clone(),
            ));
        }
        true
    }

    /// An attempted read of `React.__SECRET_INTERNALS`. Returns whether the
    /// caller obtained the real object.
    pub fn read_react_internals(
        &mut self,
        world: &PageWorld,
        stack: &str,
        sink: &mut dyn EventSink,
    ) -> bool {
        if self.react_internals_trapped {
            sink.security_event(SecurityEventReport::new(
                "access_attempt",
                "react_internals",
                details_map(vec![("stack", Value::String(stack.to_string()))]),
                world.url.clone(),
            ));
            return false;
        }
        world
            .react
            .as_ref()
            .is_some_and(|react| react.internals_exposed)
    }

    /// An attempted read of `ReactDOM.__SECRET_INTERNALS`. Returns whether
    /// the caller obtained the real object.
    pub fn read_reactdom_internals(
        &mut self,
        world: &PageWorld,
        stack: &str,
        sink: &mut dyn EventSink,
    ) -> bool {
        if self.reactdom_internals_trapped {
            sink.security_event(SecurityEventReport::new(
                "access_attempt",
                "reactdom_internals",
                details_map(vec![("stack", Value::String(stack.to_string()))]),
                world.url.clone(),
            ));
            return false;
        }
        world
            .react_dom
            .as_ref()
            .is_some_and(|dom| dom.internals_exposed)
    }

    /// A monitored `localStorage.setItem`. The write always goes through;
    /// sensitive keys are reported.
    pub fn storage_set(
        &mut self,
        world: &mut PageWorld,
        key: &str,
        value: &str,
        stack: &str,
        sink: &mut dyn EventSink,
    ) {
        if self.storage_monitor && is_sensitive_key(key) {
            sink.security_event(SecurityEventReport::new(
                "sensitive_storage",
                "localStorage_setItem",
                details_map(vec![
                    ("key", Value::String(key.to_string())),
                    ("stack", Value::String(stack.to_string())),
                ]),
                world.url.clone(),
            ));
        }
        world.storage.insert(key.to_string(), value.to_string());
    }

    /// A monitored `localStorage.getItem`.
    pub fn storage_get(
        &mut self,
        world: &PageWorld,
        key: &str,
        stack: &str,
        sink: &mut dyn EventSink,
    ) -> Option<String> {
        if self.storage_monitor && is_sensitive_key(key) {
            sink.security_event(SecurityEventReport::new(
                "access",
                "localStorage_getItem",
                details_map(vec![
                    ("key", Value::String(key.to_string())),
                    ("stack", Value::String(stack.to_string())),
                ]),
                world.url.clone(),
            ));
        }
        world.storage.get(key).cloned()
    }

    /// A monitored `localStorage.removeItem`.
    pub fn storage_remove(
        &mut self,
        world: &mut PageWorld,
        key: &str,
        stack: &str,
        sink: &mut dyn EventSink,
    ) -> Option<String> {
        if self.storage_monitor && is_sensitive_key(key) {
            sink.security_event(SecurityEventReport::new(
                "removal",
                "localStorage_removeItem",
                details_map(vec![
                    ("key", Value::String(key.to_string())),
                    ("stack", Value::String(stack.to_string())),
                ]),
                world.url.clone(),
            ));
        }
        world.storage.remove(key)
    }

    /// A monitored `localStorage.clear`. Always reported.
    pub fn storage_clear(&mut self, world: &mut PageWorld, stack: &str, sink: &mut dyn EventSink) {
        if self.storage_monitor {
            sink.security_event(SecurityEventReport::new(
                "clear",
                "localStorage_clear",
                details_map(vec![("stack", Value::String(stack.to_string()))]),
                world.url.clone(),
            ));
        }
        world.storage.clear();
    }

    /// A monitored `document.cookie` read.
    pub fn cookie_read(
        &mut self,
        world: &PageWorld,
        stack: &str,
        sink: &mut dyn EventSink,
    ) -> String {
        if self.cookie_monitor {
            sink.security_event(SecurityEventReport::new(
                "access",
                "document_cookie",
                details_map(vec![("stack", Value::String(stack.to_string()))]),
                world.url.clone(),
            ));
        }
        world.cookie_string()
    }

    /// A monitored `document.cookie` write.
    pub fn cookie_write(
        &mut self,
        world: &mut PageWorld,
        value: &str,
        stack: &str,
        sink: &mut dyn EventSink,
    ) {
        if self.cookie_monitor {
            sink.security_event(SecurityEventReport::new(
                "modification",
                "document_cookie",
                details_map(vec![
                    ("value", Value::String(value.to_string())),
                    ("stack", Value::String(stack.to_string())),
                ]),
                world.url.clone(),
            ));
        }
        world.write_cookie(value);
    }

    /// A monitored top-level DOM insertion. The insertion always goes
    /// through; elements matching an injection pattern are reported.
    pub fn insert_element(
        &mut self,
        world: &mut PageWorld,
        element: PageElement,
        sink: &mut dyn EventSink,
    ) {
        if self.monitors_installed && is_suspicious_element(&element) {
            let outer: String = element.outer_html().chars().take(200).collect();
            sink.security_event(SecurityEventReport::new(
                "suspicious_element",
                "dom_mutation",
                details_map(vec![
                    ("element", Value::String(outer)),
                    ("parentElement", Value::String("BODY".to_string())),
                ]),
                world.url.clone(),
            ));
        }
        world.insert_element(element);
    }

    fn blocked_call(
        &self,
        world: &PageWorld,
        target: &str,
        ctx: &CallContext,
    ) -> SecurityEventReport {
        SecurityEventReport::new(
            "blocked_call",
            target,
            details_map(vec![
                ("stack", Value::String(ctx.stack.clone())),
                ("args", Value::String(ctx.argument.to_string())),
            ]),
            world.url.clone(),
        )
    }
}

fn details_map(pairs: Vec<(&'static str, Value)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guarded_world() -> (PageWorld, Guard) {
        let mut world = PageWorld::new("https://app.example/")
            .with_react("18.2.0")
            .with_react_dom();
        let mut guard = Guard::new(LegitimacyPolicy::new("abcdefgh"));
        assert!(guard.apply(&mut world));
        (world, guard)
    }

    // ===== policy tests =====

    #[test]
    fn test_injected_stack_is_suspicious() {
        let policy = LegitimacyPolicy::new("abcdefgh");
        assert!(policy.is_suspicious("at eval (injected:1:1)"));
        assert!(policy.is_suspicious("at hook (chrome-extension://other/inject.js:3:1)"));
        assert!(!policy.is_suspicious(
            "at renderApp (https://app.example/static/js/main.js:10:5)"
        ));
    }

    #[test]
    fn test_own_extension_frames_are_trusted() {
        let policy = LegitimacyPolicy::new("abcdefgh");
        assert!(!policy.is_suspicious(
            "at scan (chrome-extension://abcdefgh/content.js:12:3)"
        ));
    }

    // ===== sensitive key tests =====

    #[test]
    fn test_sensitive_key_matching() {
        assert!(is_sensitive_key("authToken"));
        assert!(is_sensitive_key("API_KEY"));
        assert!(is_sensitive_key("session_id"));
        assert!(!is_sensitive_key("theme"));
        assert!(!is_sensitive_key("cart"));
    }

    // ===== apply tests =====

    #[test]
    fn test_apply_without_react_does_nothing() {
        let mut world = PageWorld::new("https://plain.example/");
        let mut guard = Guard::default();
        assert!(!guard.apply(&mut world));
    }

    #[test]
    fn test_apply_hardens_globals_once() {
        let (world, mut guard) = guarded_world();
        assert!(!world.react.as_ref().unwrap().internals_exposed);
        let dom = world.react_dom.as_ref().unwrap();
        assert!(!dom.internals_exposed);
        assert!(dom.render.as_ref().unwrap().protected);
        assert!(dom.create_root.as_ref().unwrap().protected);
        assert!(dom.find_dom_node.as_ref().unwrap().protected);

        let mut world = world;
        assert!(!guard.apply(&mut world));

        // A second apply must not stack a second wrapper: one legitimate
        // call still reaches the original exactly once.
        let mut sink = RecordingSink::default();
        let ctx = CallContext::application(json!({"type": "div"}));
        assert_eq!(
            guard.invoke_render(&mut world, &ctx, &mut sink),
            RenderOutcome::Rendered
        );
        assert_eq!(
            world
                .react_dom
                .as_ref()
                .unwrap()
                .render
                .as_ref()
                .unwrap()
                .call_count,
            1
        );
    }

    // ===== render interception tests =====

    #[test]
    fn test_suspicious_render_is_blocked_and_reported() {
        let (mut world, mut guard) = guarded_world();
        let mut sink = RecordingSink::default();
        let ctx = CallContext::injected(json!({"type": "div"}));
        let outcome = guard.invoke_render(&mut world, &ctx, &mut sink);
        assert_eq!(outcome, RenderOutcome::Blocked);
        assert_eq!(
            world
                .react_dom
                .as_ref()
                .unwrap()
                .render
                .as_ref()
                .unwrap()
                .call_count,
            0
        );
        assert_eq!(sink.attacks.len(), 1);
        assert_eq!(sink.attacks[0].method, "render");
        assert_eq!(sink.attacks[0].args, r#"{"type":"div"}"#);
        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.events[0].action, "blocked_call");
        assert_eq!(sink.events[0].target, "reactdom_render");
        assert_eq!(sink.events[0].url, "https://app.example/");
    }

    #[test]
    fn test_legitimate_render_forwards() {
        let (mut world, mut guard) = guarded_world();
        let mut sink = RecordingSink::default();
        let ctx = CallContext::application(json!({"type": "div"}));
        let outcome = guard.invoke_render(&mut world, &ctx, &mut sink);
        assert_eq!(outcome, RenderOutcome::Rendered);
        assert_eq!(
            world
                .react_dom
                .as_ref()
                .unwrap()
                .render
                .as_ref()
                .unwrap()
                .call_count,
            1
        );
        assert!(sink.attacks.is_empty());
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_unprotected_render_forwards_even_when_suspicious() {
        let mut world = PageWorld::new("https://app.example/")
            .with_react("17.0.2")
            .with_react_dom();
        let mut guard = Guard::default();
        let mut sink = RecordingSink::default();
        let ctx = CallContext::injected(json!(null));
        let outcome = guard.invoke_render(&mut world, &ctx, &mut sink);
        assert_eq!(outcome, RenderOutcome::Rendered);
        assert!(sink.attacks.is_empty());
    }

    // ===== createRoot and root.render tests =====

    #[test]
    fn test_suspicious_create_root_gets_decoy() {
        let (mut world, mut guard) = guarded_world();
        let mut sink = RecordingSink::default();
        let ctx = CallContext::injected(json!("#root"));
        let RenderOutcome::Root(root) = guard.invoke_create_root(&mut world, &ctx, &mut sink)
        else {
            panic!("expected a root handle");
        };
        assert!(root.fake);
        assert_eq!(sink.attacks[0].method, "createRoot");
        assert_eq!(sink.events[0].target, "reactdom_createRoot");

        // The decoy renders nothing, silently.
        let render_ctx = CallContext::injected(json!({"type": "iframe"}));
        let outcome = guard.invoke_root_render(&mut world, &root, &render_ctx, &mut sink);
        assert_eq!(outcome, RenderOutcome::Blocked);
        assert_eq!(world.root_render_calls, 0);
        assert_eq!(sink.events.len(), 1);
    }

    #[test]
    fn test_real_root_blocks_suspicious_render() {
        let (mut world, mut guard) = guarded_world();
        let mut sink = RecordingSink::default();
        let ctx = CallContext::application(json!("#root"));
        let RenderOutcome::Root(root) = guard.invoke_create_root(&mut world, &ctx, &mut sink)
        else {
            panic!("expected a root handle");
        };
        assert!(!root.fake);

        let legit = CallContext::application(json!({"type": "div"}));
        assert_eq!(
            guard.invoke_root_render(&mut world, &root, &legit, &mut sink),
            RenderOutcome::Rendered
        );
        assert_eq!(world.root_render_calls, 1);

        let suspicious = CallContext::injected(json!({"type": "iframe"}));
        assert_eq!(
            guard.invoke_root_render(&mut world, &root, &suspicious, &mut sink),
            RenderOutcome::Blocked
        );
        assert_eq!(world.root_render_calls, 1);
        let last = sink.events.last().unwrap();
        assert_eq!(last.action, "blocked_call");
        assert_eq!(last.target, "root_render");
        assert!(sink.attacks.is_empty());
    }

    // ===== findDOMNode and internals tests =====

    #[test]
    fn test_find_dom_node_forwards_and_reports() {
        let (mut world, mut guard) = guarded_world();
        let mut sink = RecordingSink::default();
        assert!(guard.find_dom_node(&mut world, "at probe (injected:1:1)", &mut sink));
        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.events[0].action, "call");
        assert_eq!(sink.events[0].target, "reactdom_findDOMNode");
    }

    #[test]
    fn test_internals_reads_are_trapped() {
        let (world, mut guard) = guarded_world();
        let mut sink = RecordingSink::default();
        assert!(!guard.read_react_internals(&world, "at steal (injected:1:1)", &mut sink));
        assert!(!guard.read_reactdom_internals(&world, "at steal (injected:1:1)", &mut sink));
        let targets: Vec<&str> = sink.events.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["react_internals", "reactdom_internals"]);
        assert!(sink
            .events
            .iter()
            .all(|event| event.action == "access_attempt"));
    }

    #[test]
    fn test_unguarded_internals_read_succeeds() {
        let world = PageWorld::new("https://app.example/").with_react("18.2.0");
        let mut guard = Guard::default();
        let mut sink = RecordingSink::default();
        assert!(guard.read_react_internals(&world, "at steal (injected:1:1)", &mut sink));
        assert!(sink.events.is_empty());
    }

    // ===== storage monitor tests =====

    #[test]
    fn test_sensitive_storage_writes_are_reported_but_stored() {
        let (mut world, mut guard) = guarded_world();
        let mut sink = RecordingSink::default();
        guard.storage_set(&mut world, "authToken", "abc123", "at app", &mut sink);
        guard.storage_set(&mut world, "theme", "dark", "at app", &mut sink);
        assert_eq!(world.storage.get("authToken").map(String::as_str), Some("abc123"));
        assert_eq!(world.storage.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.events[0].action, "sensitive_storage");
        assert_eq!(sink.events[0].target, "localStorage_setItem");
        assert_eq!(sink.events[0].details["key"], json!("authToken"));
    }

    #[test]
    fn test_storage_reads_removals_and_clear() {
        let (mut world, mut guard) = guarded_world();
        world.storage.insert("jwt".to_string(), "eyJ".to_string());
        let mut sink = RecordingSink::default();
        assert_eq!(
            guard.storage_get(&world, "jwt", "at app", &mut sink),
            Some("eyJ".to_string())
        );
        assert_eq!(
            guard.storage_remove(&mut world, "jwt", "at app", &mut sink),
            Some("eyJ".to_string())
        );
        guard.storage_clear(&mut world, "at app", &mut sink);
        assert!(world.storage.is_empty());
        let actions: Vec<&str> = sink.events.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["access", "removal", "clear"]);
    }

    #[test]
    fn test_unmonitored_storage_is_silent() {
        let mut world = PageWorld::new("https://app.example/").with_react("18.2.0");
        let mut guard = Guard::default();
        let mut sink = RecordingSink::default();
        guard.storage_set(&mut world, "password", "hunter22", "at app", &mut sink);
        assert!(sink.events.is_empty());
        assert_eq!(
            world.storage.get("password").map(String::as_str),
            Some("hunter22")
        );
    }

    // ===== cookie monitor tests =====

    #[test]
    fn test_cookie_access_is_monitored() {
        let (mut world, mut guard) = guarded_world();
        world = world.with_cookie("session", "s3cr3t");
        let mut sink = RecordingSink::default();
        assert_eq!(
            guard.cookie_read(&world, "at app", &mut sink),
            "session=s3cr3t"
        );
        guard.cookie_write(&mut world, "tracking=1; path=/", "at app", &mut sink);
        assert_eq!(world.cookie_string(), "session=s3cr3t; tracking=1");
        let actions: Vec<&str> = sink.events.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["access", "modification"]);
        assert_eq!(sink.events[1].details["value"], json!("tracking=1; path=/"));
    }

    // ===== DOM mutation tests =====

    #[test]
    fn test_phishing_form_insert_is_reported() {
        let (mut world, mut guard) = guarded_world();
        let mut sink = RecordingSink::default();
        let form = PageElement::new("form").with_child(
            PageElement::new("input").with_attr("type", "password"),
        );
        guard.insert_element(&mut world, form, &mut sink);
        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.events[0].action, "suspicious_element");
        assert_eq!(sink.events[0].target, "dom_mutation");
        assert_eq!(sink.events[0].details["parentElement"], json!("BODY"));
        // The insertion itself still happened.
        assert!(world.dom.elements.iter().any(|e| e.tag == "form"));
    }

    #[test]
    fn test_element_heuristics() {
        assert!(is_suspicious_element(
            &PageElement::new("iframe").with_attr("src", "https://evil.example/")
        ));
        assert!(!is_suspicious_element(
            &PageElement::new("iframe")
                .with_attr("src", "https://videos.example/")
                .with_attr("sandbox", "")
        ));
        assert!(is_suspicious_element(
            &PageElement::new("script").with_text("fetch('/admin')")
        ));
        assert!(!is_suspicious_element(
            &PageElement::new("script").with_attr("src", "https://app.example/main.js")
        ));
        assert!(is_suspicious_element(
            &PageElement::new("a").with_attr("href", "JavaScript:alert(1)")
        ));
        assert!(!is_suspicious_element(
            &PageElement::new("div").with_text("hello")
        ));
    }

    #[test]
    fn test_benign_insert_is_silent() {
        let (mut world, mut guard) = guarded_world();
        let mut sink = RecordingSink::default();
        guard.insert_element(
            &mut world,
            PageElement::new("div").with_id("toast").with_text("saved"),
            &mut sink,
        );
        assert!(sink.events.is_empty());
        assert!(world.element("toast").is_some());
    }
}
