//! React presence and version detection.
//!
//! Presence is any of four signals: the `React` global, the devtools hook,
//! a modern root marker, or a legacy id marker. Version resolution walks an
//! ordered capability table; the first rule that yields a label wins.

use crate::page::{ComponentMarker, PageWorld};
use serde::Serialize;

/// The ten standard hooks the detector looks for, with their descriptions.
const HOOK_CATALOG: [(&str, &str); 10] = [
    ("useState", "State management hook"),
    ("useEffect", "Side effects hook"),
    ("useContext", "Context access hook"),
    ("useReducer", "Reducer state management hook"),
    ("useCallback", "Memoized callback hook"),
    ("useMemo", "Memoized value hook"),
    ("useRef", "Mutable reference hook"),
    ("useLayoutEffect", "Synchronous effect hook"),
    ("useImperativeHandle", "Customized ref value hook"),
    ("useDebugValue", "Debug label hook"),
];

/// Maximum component markers included in a report sample
const COMPONENT_SAMPLE_LIMIT: usize = 10;

/// A positive detection result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// Resolved version label
    pub version: String,
}

/// A hook the page's React global exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HookInfo {
    /// Hook name
    pub name: &'static str,
    /// What the hook is for
    pub description: &'static str,
}

/// Full detection report for a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    /// Resolved version label
    pub version: String,
    /// Development build markers present
    pub dev_mode: bool,
    /// `useState` and `useEffect` both callable
    pub hooks_available: bool,
    /// Standard hooks found on the global
    pub hooks: Vec<HookInfo>,
    /// React Router detected
    pub using_react_router: bool,
    /// Redux detected
    pub using_redux: bool,
    /// Component-bearing elements on the page
    pub component_count: usize,
    /// Up to ten sampled components
    pub component_sample: Vec<ComponentMarker>,
}

/// True if any presence signal is on.
#[must_use]
pub fn is_present(world: &PageWorld) -> bool {
    world.react.is_some()
        || world.devtools_hook
        || world.dom.react_root_markers > 0
        || world.dom.react_id_markers > 0
}

type VersionRule = fn(&PageWorld) -> Option<String>;

/// Ordered version resolution rules; first match wins.
const VERSION_RULES: &[VersionRule] = &[explicit_version, modern_root_marker, legacy_id_marker];

fn explicit_version(world: &PageWorld) -> Option<String> {
    world.react.as_ref()?.version.clone()
}

fn modern_root_marker(world: &PageWorld) -> Option<String> {
    (world.dom.react_root_markers > 0).then(|| "16+".to_string())
}

fn legacy_id_marker(world: &PageWorld) -> Option<String> {
    (world.dom.react_id_markers > 0).then(|| "15 or earlier".to_string())
}

/// Resolves the version label for a page where React was detected.
#[must_use]
pub fn resolve_version(world: &PageWorld) -> String {
    VERSION_RULES
        .iter()
        .find_map(|rule| rule(world))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Detects React, resolving a version label when present.
#[must_use]
pub fn detect(world: &PageWorld) -> Option<Detection> {
    is_present(world).then(|| Detection {
        version: resolve_version(world),
    })
}

/// Builds the full detection report, or `None` when React is absent.
#[must_use]
pub fn report(world: &PageWorld) -> Option<DetectionReport> {
    if !is_present(world) {
        return None;
    }
    let hook_names: &[String] = world
        .react
        .as_ref()
        .map_or(&[], |react| react.hooks.as_slice());
    let hooks: Vec<HookInfo> = HOOK_CATALOG
        .iter()
        .filter(|(name, _)| hook_names.iter().any(|h| h == name))
        .map(|&(name, description)| HookInfo { name, description })
        .collect();
    let hooks_available = hook_names.iter().any(|h| h == "useState")
        && hook_names.iter().any(|h| h == "useEffect");
    let dev_mode = world.devtools_hook
        || world
            .react
            .as_ref()
            .is_some_and(|react| react.internals_exposed);
    Some(DetectionReport {
        version: resolve_version(world),
        dev_mode,
        hooks_available,
        hooks,
        using_react_router: world.router_present,
        using_redux: world.redux_present,
        component_count: world.dom.component_markers.len(),
        component_sample: world
            .dom
            .component_markers
            .iter()
            .take(COMPONENT_SAMPLE_LIMIT)
            .cloned()
            .collect(),
    })
}
