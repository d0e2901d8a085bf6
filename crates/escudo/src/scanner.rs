//! Vulnerability scanner.
//!
//! Runs a fixed table of checks against a [`PageWorld`] and reports findings
//! in table order. Worlds with no React presence scan clean without running
//! any check. Checks are isolated from each other: a failing check is logged
//! and skipped while the rest still run.

use crate::detect;
use crate::page::{snippet, PageElement, PageWorld};
use crate::result::{EscudoError, EscudoResult};
use crate::state::{Severity, VulnKind, Vulnerability};
use regex::Regex;

/// A single scan check. `Ok(None)` means the check ran and found nothing.
type CheckFn = fn(&PageWorld) -> EscudoResult<Option<Vulnerability>>;

/// All checks, in report order.
const CHECKS: &[(&str, CheckFn)] = &[
    ("exposed_react_internals", exposed_react_internals),
    ("exposed_reactdom_internals", exposed_reactdom_internals),
    ("unprotected_render", unprotected_render),
    ("unprotected_create_root", unprotected_create_root),
    ("dangerous_inner_html", dangerous_inner_html),
    ("exposed_credentials", exposed_credentials),
    ("insecure_context", insecure_context),
    ("unsafe_lifecycle_methods", unsafe_lifecycle_methods),
];

/// Deprecated lifecycle methods, in the order they are checked.
const UNSAFE_LIFECYCLES: [&str; 3] = [
    "componentWillMount",
    "componentWillReceiveProps",
    "componentWillUpdate",
];

/// Scans the world and returns findings in check order.
///
/// Returns an empty list when the world shows no React presence signal.
#[must_use]
pub fn scan(world: &PageWorld) -> Vec<Vulnerability> {
    let mut findings = Vec::new();
    if !detect::is_present(world) {
        return findings;
    }
    for (name, check) in CHECKS {
        match check(world) {
            Ok(Some(finding)) => findings.push(finding),
            Ok(None) => {}
            Err(error) => tracing::warn!(check = %name, error = %error, "scan check failed"),
        }
    }
    findings
}

fn exposed_react_internals(world: &PageWorld) -> EscudoResult<Option<Vulnerability>> {
    let exposed = world
        .react
        .as_ref()
        .is_some_and(|react| react.internals_exposed);
    if !exposed {
        return Ok(None);
    }
    Ok(Some(Vulnerability::new(
        VulnKind::ExposedReactInternals,
        Severity::High,
        "React internals are exposed, allowing potential DOM manipulation attacks",
        world.url.as_str(),
        "The React.__SECRET_INTERNALS_DO_NOT_USE_OR_YOU_WILL_BE_FIRED object is accessible",
    )))
}

fn exposed_reactdom_internals(world: &PageWorld) -> EscudoResult<Option<Vulnerability>> {
    let exposed = world
        .react_dom
        .as_ref()
        .is_some_and(|dom| dom.internals_exposed);
    if !exposed {
        return Ok(None);
    }
    Ok(Some(Vulnerability::new(
        VulnKind::ExposedReactdomInternals,
        Severity::High,
        "ReactDOM internals are exposed, allowing potential DOM manipulation attacks",
        world.url.as_str(),
        "The ReactDOM.__SECRET_INTERNALS_DO_NOT_USE_OR_YOU_WILL_BE_FIRED object is accessible",
    )))
}

fn unprotected_render(world: &PageWorld) -> EscudoResult<Option<Vulnerability>> {
    let unprotected = world
        .react_dom
        .as_ref()
        .and_then(|dom| dom.render.as_ref())
        .is_some_and(|entry| !entry.protected);
    if !unprotected {
        return Ok(None);
    }
    Ok(Some(Vulnerability::new(
        VulnKind::UnprotectedRender,
        Severity::Medium,
        "ReactDOM.render is accessible to potential attackers",
        world.url.as_str(),
        "The ReactDOM.render method can be used to inject content",
    )))
}

fn unprotected_create_root(world: &PageWorld) -> EscudoResult<Option<Vulnerability>> {
    let unprotected = world
        .react_dom
        .as_ref()
        .and_then(|dom| dom.create_root.as_ref())
        .is_some_and(|entry| !entry.protected);
    if !unprotected {
        return Ok(None);
    }
    Ok(Some(Vulnerability::new(
        VulnKind::UnprotectedCreateRoot,
        Severity::Medium,
        "ReactDOM.createRoot is accessible to potential attackers",
        world.url.as_str(),
        "The ReactDOM.createRoot method can be used to inject content in React 18+",
    )))
}

fn dangerous_inner_html(world: &PageWorld) -> EscudoResult<Option<Vulnerability>> {
    // Reported once, for the first such element in document order.
    let Some(element) = first_dangerous(&world.dom.elements) else {
        return Ok(None);
    };
    Ok(Some(Vulnerability::new(
        VulnKind::DangerousInnerhtml,
        Severity::Medium,
        "dangerouslySetInnerHTML found in React components",
        snippet(&element.outer_html(), 100),
        "This can lead to XSS vulnerabilities if user input is not properly sanitized",
    )))
}

/// Depth-first preorder walk, same order `querySelectorAll('*')` yields.
fn first_dangerous(elements: &[PageElement]) -> Option<&PageElement> {
    for element in elements {
        if element.dangerous_inner_html {
            return Some(element);
        }
        if let Some(found) = first_dangerous(&element.children) {
            return Some(found);
        }
    }
    None
}

fn exposed_credentials(world: &PageWorld) -> EscudoResult<Option<Vulnerability>> {
    let pattern = Regex::new(
        r#"(?i)(api|token|key|secret|password|credential)([A-Za-z0-9_-]+)?\s*[:=]\s*["']([^"']{8,})["']"#,
    )
    .map_err(|error| EscudoError::ScanCheckFailure {
        check: "exposed_credentials".to_string(),
        message: error.to_string(),
    })?;
    // Reported once, for the first script with any match.
    for body in &world.dom.scripts {
        let matches = pattern.find_iter(body).count();
        if matches > 0 {
            let outer = format!("<script>{body}</script>");
            return Ok(Some(Vulnerability::new(
                VulnKind::ExposedCredentials,
                Severity::Critical,
                format!("Potential credentials found in script tag: {matches} matches"),
                snippet(&outer, 100),
                "Sensitive information should not be included directly in client-side code",
            )));
        }
    }
    Ok(None)
}

fn insecure_context(world: &PageWorld) -> EscudoResult<Option<Vulnerability>> {
    let local = world.hostname == "localhost" || world.hostname == "127.0.0.1";
    if world.protocol == "https" || local {
        return Ok(None);
    }
    Ok(Some(Vulnerability::new(
        VulnKind::InsecureContext,
        Severity::High,
        "Application is running in an insecure context (non-HTTPS)",
        world.url.as_str(),
        "Running React applications over HTTP can expose them to man-in-the-middle attacks",
    )))
}

fn unsafe_lifecycle_methods(world: &PageWorld) -> EscudoResult<Option<Vulnerability>> {
    let Some(react) = world.react.as_ref() else {
        return Ok(None);
    };
    // Reported once, for the first method in UNSAFE_LIFECYCLES order.
    for method in UNSAFE_LIFECYCLES {
        if react
            .unsafe_lifecycles
            .iter()
            .any(|name| name.as_str() == method)
        {
            return Ok(Some(Vulnerability::new(
                VulnKind::UnsafeLifecycleMethods,
                Severity::Low,
                format!("Potentially unsafe lifecycle method \"{method}\" detected"),
                world.url.as_str(),
                "These methods are deprecated and may lead to bugs in concurrent rendering",
            )));
        }
    }
    Ok(None)
}
