//! In-memory model of the inspected page.
//!
//! The page world is the injectable "global object" every other module
//! operates on: detection reads its React globals, the scanner walks its
//! elements and scripts, the guard marks its render entry points, and
//! demonstrations insert overlay nodes and virtual timers into it. The CLI
//! loads worlds from JSON snapshots; tests build them directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Truncates to `max` characters and appends `...`, matching how element
/// snippets are reported in findings.
#[must_use]
pub(crate) fn snippet(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

/// The `React` global, as far as the suite inspects it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactGlobal {
    /// `React.version`, when the page exposes it
    pub version: Option<String>,
    /// Whether the secret internals object is reachable
    pub internals_exposed: bool,
    /// Whether `ReactCurrentOwner` is reachable (fiber internals)
    pub current_owner_present: bool,
    /// Standard hooks the global exposes (`useState`, `useEffect`, ...)
    pub hooks: Vec<String>,
    /// Deprecated lifecycle methods reachable on the page
    pub unsafe_lifecycles: Vec<String>,
}

/// One callable render entry point on the `ReactDOM` global.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderEntry {
    /// Whether the guard has wrapped this entry (`isProtected` marker)
    pub protected: bool,
    /// Forwarded calls observed so far
    pub call_count: u64,
}

/// The `ReactDOM` global.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactDomGlobal {
    /// Whether the secret internals object is reachable
    pub internals_exposed: bool,
    /// `ReactDOM.render`, when present (React <= 17 style)
    pub render: Option<RenderEntry>,
    /// `ReactDOM.createRoot`, when present (React 18+)
    pub create_root: Option<RenderEntry>,
    /// `ReactDOM.findDOMNode`, when present
    pub find_dom_node: Option<RenderEntry>,
}

/// A component-bearing element observed on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMarker {
    /// Element tag name
    pub tag: String,
    /// Element id, if any
    pub id: Option<String>,
    /// Element class attribute, if any
    pub class_name: Option<String>,
}

/// A DOM element in the world model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageElement {
    /// Tag name, lowercase
    pub tag: String,
    /// `id` attribute
    pub id: Option<String>,
    /// Remaining attributes
    pub attributes: BTreeMap<String, String>,
    /// Text content
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<PageElement>,
    /// Whether a React component rendered this element with raw HTML
    pub dangerous_inner_html: bool,
}

impl PageElement {
    /// Creates an element with just a tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Appends a child.
    #[must_use]
    pub fn with_child(mut self, child: PageElement) -> Self {
        self.children.push(child);
        self
    }

    /// Marks the element as rendered with raw HTML.
    #[must_use]
    pub fn with_dangerous_inner_html(mut self) -> Self {
        self.dangerous_inner_html = true;
        self
    }

    /// Attribute lookup.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Serialized form used in finding locations and mutation reports.
    #[must_use]
    pub fn outer_html(&self) -> String {
        let mut html = format!("<{}", self.tag);
        if let Some(id) = &self.id {
            html.push_str(&format!(" id=\"{id}\""));
        }
        for (name, value) in &self.attributes {
            html.push_str(&format!(" {name}=\"{value}\""));
        }
        html.push('>');
        if let Some(text) = &self.text {
            html.push_str(text);
        }
        for child in &self.children {
            html.push_str(&child.outer_html());
        }
        html.push_str(&format!("</{}>", self.tag));
        html
    }

    /// True if this element or any descendant is a password input.
    #[must_use]
    pub fn contains_password_input(&self) -> bool {
        if self.tag == "input" && self.attr("type") == Some("password") {
            return true;
        }
        self.children
            .iter()
            .any(PageElement::contains_password_input)
    }
}

/// A cookie visible to the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
}

/// What a virtual interval does on each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimerAction {
    /// Rewrite the indicator element's text with the tick count
    UpdateHookIndicator {
        /// Element to update
        target_id: String,
    },
}

/// A virtual `setInterval` registered in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTimer {
    /// Timer handle
    pub id: u64,
    /// Tick period in milliseconds
    pub period_ms: u64,
    /// Next due time on the world clock
    pub next_due_ms: u64,
    /// Ticks fired so far
    pub ticks: u64,
    /// What each tick does
    pub action: TimerAction,
}

/// The DOM portion of the world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageDom {
    /// Count of `[data-reactroot]` elements (React 16+ marker)
    pub react_root_markers: u32,
    /// Count of `[data-reactid]` elements (React 15 and earlier marker)
    pub react_id_markers: u32,
    /// Live elements, top level
    pub elements: Vec<PageElement>,
    /// Inline script bodies
    pub scripts: Vec<String>,
    /// Component-bearing elements, for the internals report
    pub component_markers: Vec<ComponentMarker>,
}

/// The injectable page model.
///
/// In snapshot JSON only `url` is required; `protocol` and `hostname` are
/// derived from it when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageWorld {
    /// Full page URL
    pub url: String,
    /// URL scheme without the colon (`https`, `http`, `file`, ...)
    #[serde(default)]
    pub protocol: String,
    /// Host without port
    #[serde(default)]
    pub hostname: String,
    /// The `React` global, when present
    #[serde(default)]
    pub react: Option<ReactGlobal>,
    /// The `ReactDOM` global, when present
    #[serde(default)]
    pub react_dom: Option<ReactDomGlobal>,
    /// `__REACT_DEVTOOLS_GLOBAL_HOOK__` present
    #[serde(default)]
    pub devtools_hook: bool,
    /// Redux store detected
    #[serde(default)]
    pub redux_present: bool,
    /// React Router detected
    #[serde(default)]
    pub router_present: bool,
    /// DOM model
    #[serde(default)]
    pub dom: PageDom,
    /// Cookies visible to the page
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// localStorage model
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
    /// Render calls observed on created roots
    #[serde(skip)]
    pub root_render_calls: u64,
    #[serde(skip)]
    timers: Vec<PageTimer>,
    #[serde(skip)]
    next_timer_id: u64,
    #[serde(skip)]
    clock_ms: u64,
}

impl Default for PageWorld {
    fn default() -> Self {
        Self::new("https://app.example/")
    }
}

impl PageWorld {
    /// Creates an empty world at the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let (protocol, hostname) = split_url(&url);
        Self {
            url,
            protocol,
            hostname,
            react: None,
            react_dom: None,
            devtools_hook: false,
            redux_present: false,
            router_present: false,
            dom: PageDom::default(),
            cookies: Vec::new(),
            storage: BTreeMap::new(),
            root_render_calls: 0,
            timers: Vec::new(),
            next_timer_id: 0,
            clock_ms: 0,
        }
    }

    /// Adds a default React global at the given version.
    #[must_use]
    pub fn with_react(mut self, version: impl Into<String>) -> Self {
        self.react = Some(ReactGlobal {
            version: Some(version.into()),
            internals_exposed: true,
            current_owner_present: true,
            ..ReactGlobal::default()
        });
        self
    }

    /// Adds a default ReactDOM global with callable `render` and
    /// `createRoot` entries.
    #[must_use]
    pub fn with_react_dom(mut self) -> Self {
        self.react_dom = Some(ReactDomGlobal {
            internals_exposed: true,
            render: Some(RenderEntry::default()),
            create_root: Some(RenderEntry::default()),
            find_dom_node: Some(RenderEntry::default()),
        });
        self
    }

    /// Marks the devtools hook present.
    #[must_use]
    pub fn with_devtools_hook(mut self) -> Self {
        self.devtools_hook = true;
        self
    }

    /// Sets the `[data-reactroot]` marker count.
    #[must_use]
    pub fn with_root_markers(mut self, count: u32) -> Self {
        self.dom.react_root_markers = count;
        self
    }

    /// Sets the `[data-reactid]` marker count.
    #[must_use]
    pub fn with_id_markers(mut self, count: u32) -> Self {
        self.dom.react_id_markers = count;
        self
    }

    /// Adds a cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push(Cookie {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a localStorage pair.
    #[must_use]
    pub fn with_storage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.storage.insert(key.into(), value.into());
        self
    }

    /// Adds an inline script body.
    #[must_use]
    pub fn with_script(mut self, body: impl Into<String>) -> Self {
        self.dom.scripts.push(body.into());
        self
    }

    /// Adds a top-level element.
    #[must_use]
    pub fn with_element(mut self, element: PageElement) -> Self {
        self.dom.elements.push(element);
        self
    }

    /// Adds a component marker.
    #[must_use]
    pub fn with_component_marker(mut self, marker: ComponentMarker) -> Self {
        self.dom.component_markers.push(marker);
        self
    }

    /// Parses a snapshot, deriving `protocol` and `hostname` from the URL
    /// when the snapshot leaves them out.
    pub fn from_json(json: &str) -> crate::result::EscudoResult<Self> {
        let mut world: Self = serde_json::from_str(json)?;
        if world.protocol.is_empty() && world.hostname.is_empty() {
            let (protocol, hostname) = split_url(&world.url);
            world.protocol = protocol;
            world.hostname = hostname;
        }
        Ok(world)
    }

    /// Elapsed virtual time in milliseconds.
    #[must_use]
    pub const fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Finds a top-level element by id.
    #[must_use]
    pub fn element(&self, id: &str) -> Option<&PageElement> {
        self.dom.elements.iter().find(|e| e.id.as_deref() == Some(id))
    }

    /// Finds a top-level element by id, mutably.
    pub fn element_mut(&mut self, id: &str) -> Option<&mut PageElement> {
        self.dom
            .elements
            .iter_mut()
            .find(|e| e.id.as_deref() == Some(id))
    }

    /// Inserts a top-level element.
    pub fn insert_element(&mut self, element: PageElement) {
        self.dom.elements.push(element);
    }

    /// Prepends a top-level element (banner position).
    pub fn prepend_element(&mut self, element: PageElement) {
        self.dom.elements.insert(0, element);
    }

    /// Removes the first top-level element with the given id. Returns
    /// whether anything was removed.
    pub fn remove_element(&mut self, id: &str) -> bool {
        if let Some(pos) = self
            .dom
            .elements
            .iter()
            .position(|e| e.id.as_deref() == Some(id))
        {
            self.dom.elements.remove(pos);
            true
        } else {
            false
        }
    }

    /// The page's cookie string, `document.cookie` style.
    #[must_use]
    pub fn cookie_string(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Applies a `document.cookie` style write: everything before the first
    /// `;` is the `name=value` pair, attributes are ignored.
    pub fn write_cookie(&mut self, raw: &str) {
        let pair = raw.split(';').next().unwrap_or("");
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        let name = name.trim().to_string();
        let value = value.trim().to_string();
        if let Some(existing) = self.cookies.iter_mut().find(|c| c.name == name) {
            existing.value = value;
        } else {
            self.cookies.push(Cookie { name, value });
        }
    }

    /// Registers a virtual interval. Returns the timer handle.
    pub fn set_interval(&mut self, period_ms: u64, action: TimerAction) -> u64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        self.timers.push(PageTimer {
            id,
            period_ms,
            next_due_ms: self.clock_ms + period_ms,
            ticks: 0,
            action,
        });
        id
    }

    /// Cancels a virtual interval. Returns whether it existed.
    pub fn clear_interval(&mut self, id: u64) -> bool {
        if let Some(pos) = self.timers.iter().position(|t| t.id == id) {
            self.timers.remove(pos);
            true
        } else {
            false
        }
    }

    /// Number of live timers.
    #[must_use]
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Ticks fired by the given timer so far.
    #[must_use]
    pub fn timer_ticks(&self, id: u64) -> Option<u64> {
        self.timers.iter().find(|t| t.id == id).map(|t| t.ticks)
    }

    /// Advances the virtual clock, firing due timers in order.
    pub fn advance_millis(&mut self, ms: u64) {
        let target = self.clock_ms + ms;
        loop {
            let due = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.next_due_ms <= target)
                .min_by_key(|(_, t)| t.next_due_ms)
                .map(|(idx, t)| (idx, t.next_due_ms));
            let Some((idx, due_ms)) = due else { break };
            self.clock_ms = due_ms;
            let timer = &mut self.timers[idx];
            timer.ticks += 1;
            timer.next_due_ms = due_ms + timer.period_ms;
            let ticks = timer.ticks;
            let action = timer.action.clone();
            self.apply_timer_action(&action, ticks);
        }
        self.clock_ms = target;
    }

    fn apply_timer_action(&mut self, action: &TimerAction, ticks: u64) {
        match action {
            TimerAction::UpdateHookIndicator { target_id } => {
                if let Some(element) = self.element_mut(target_id) {
                    element.text = Some(format!("Hook executed {ticks} times"));
                }
            }
        }
    }
}

/// Splits a URL into scheme (no colon) and host (no port). Falls back to
/// empty strings for unparseable input rather than failing the model.
fn split_url(url: &str) -> (String, String) {
    let Some((scheme, rest)) = url.split_once("://") else {
        return (String::new(), String::new());
    };
    let authority = rest.split('/').next().unwrap_or("");
    let host = authority.split(':').next().unwrap_or("");
    (scheme.to_string(), host.to_string())
}
