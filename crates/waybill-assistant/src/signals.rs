//! Role and context detection from host-provided signals.

use std::sync::Arc;

use waybill_core::{Context, Role};

/// Ordered role classification table. The first needle found in the
/// identity signal decides the role; no match means [`Role::Visitor`].
pub const ROLE_PRECEDENCE: [(&str, Role); 3] = [
    ("admin", Role::Admin),
    ("employee", Role::Employee),
    ("client", Role::Client),
];

/// Supplies the identity signal: a string describing the current route or area.
pub trait IdentitySource: Send + Sync {
    fn identity(&self) -> String;
}

/// Supplies the UI-location signal: identifiers of the currently visible
/// sections, in host document order.
pub trait LocationSource: Send + Sync {
    fn visible_sections(&self) -> Vec<String>;
}

/// A fixed identity string.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub String);

impl IdentitySource for StaticIdentity {
    fn identity(&self) -> String {
        self.0.clone()
    }
}

/// Classify an identity signal into a role.
///
/// Case-insensitive substring checks in [`ROLE_PRECEDENCE`] order.
pub fn classify_role(identity: &str) -> Role {
    let lowered = identity.to_lowercase();
    ROLE_PRECEDENCE
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, role)| *role)
        .unwrap_or(Role::Visitor)
}

/// Pick the active context from visible section identifiers.
///
/// The first non-blank identifier wins; none means `"default"`.
pub fn select_context<I, S>(sections: I) -> Context
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    sections
        .into_iter()
        .find_map(|section| {
            let id = section.as_ref().trim();
            (!id.is_empty()).then(|| Context::new(id))
        })
        .unwrap_or_default()
}

/// Derives the active role and context from the host collaborators.
///
/// Both probes are read-only and may be invoked any number of times.
#[derive(Clone)]
pub struct SignalDetector {
    identity: Arc<dyn IdentitySource>,
    location: Arc<dyn LocationSource>,
}

impl SignalDetector {
    pub fn new(identity: Arc<dyn IdentitySource>, location: Arc<dyn LocationSource>) -> Self {
        Self { identity, location }
    }

    pub fn detect_role(&self) -> Role {
        let identity = self.identity.identity();
        let role = classify_role(&identity);
        tracing::debug!(identity = %identity, role = %role, "Role detected");
        role
    }

    pub fn detect_context(&self) -> Context {
        let context = select_context(self.location.visible_sections());
        tracing::debug!(context = %context, "Context detected");
        context
    }
}
