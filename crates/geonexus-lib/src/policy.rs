//! Static allow-list access policy.
//!
//! A policy is loaded once from configuration and evaluated for every request
//! before any backend work happens.
//!
//! Matching rules:
//!
//! - an exact match always allows;
//! - an unqualified entry (no `.`) allows any resource whose bare name (the
//!   part after its last `.`) equals the entry, so `buildings` allows
//!   `public.buildings`;
//! - a qualified entry only allows the identical resource, so
//!   `public.buildings` does not allow `buildings`;
//! - an empty allow-list allows everything and logs a warning on every
//!   evaluation.

use std::collections::BTreeSet;

use tracing::{debug, warn};

/// Separator between a namespace (schema) and a resource name.
pub const NAMESPACE_SEPARATOR: char = '.';

/// Outcome of [`AccessPolicy::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The resource matched the allow-list.
    Allowed,
    /// The allow-list is empty; the request is allowed in degraded mode.
    AllowedUnrestricted,
    /// The resource is not on the allow-list.
    Denied,
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        !matches!(self, AccessDecision::Denied)
    }
}

/// Allow-list of resource identifiers for one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allow_list: BTreeSet<String>,
}

impl AccessPolicy {
    /// Build a policy from allow-list entries. Blank entries are ignored.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allow_list: entries
                .into_iter()
                .map(|entry| entry.as_ref().trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect(),
        }
    }

    /// A policy with no entries (allow-all, degraded).
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allow_list.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.allow_list.iter().map(String::as_str)
    }

    /// Evaluate `resource_id` against the allow-list.
    pub fn evaluate(&self, resource_id: &str) -> AccessDecision {
        if self.allow_list.is_empty() {
            warn!(
                resource = resource_id,
                "access allow-list is empty; allowing every resource (degraded security posture)"
            );
            return AccessDecision::AllowedUnrestricted;
        }

        if self.allow_list.contains(resource_id) {
            return AccessDecision::Allowed;
        }

        let bare = bare_name(resource_id);
        let bare_match = self
            .allow_list
            .iter()
            .filter(|entry| !entry.contains(NAMESPACE_SEPARATOR))
            .any(|entry| entry == bare);

        if bare_match {
            debug!(resource = resource_id, bare, "resource allowed by bare-name entry");
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied
        }
    }
}

/// The portion of `resource_id` after its last namespace separator.
pub fn bare_name(resource_id: &str) -> &str {
    resource_id
        .rsplit_once(NAMESPACE_SEPARATOR)
        .map(|(_, name)| name)
        .unwrap_or(resource_id)
}
