//! Per-path IP whitelist.
//!
//! # Semantics
//! - Empty rule map: every path is open
//! - Path with a rule: only the listed IPs pass
//! - Path without a rule: open
//!
//! The remote endpoint must be `ip:port` with exactly one colon. Anything
//! else is rejected before an IP is derived from it.

use std::collections::{HashMap, HashSet};

use axum::http::StatusCode;

use crate::http::response::ServiceResponse;

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The caller may proceed.
    Allow,
    /// The path has a whitelist and the caller's IP is not on it.
    DenyForbidden { reason: String },
    /// The remote endpoint is not a plain `ip:port`.
    RejectMalformed { reason: String },
}

impl Decision {
    /// Whether this is [`Decision::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Envelope sent to the client for a refusal; `None` when allowed.
    pub fn into_envelope(self) -> Option<ServiceResponse> {
        match self {
            Decision::Allow => None,
            Decision::DenyForbidden { reason } => Some(
                ServiceResponse::error(StatusCode::FORBIDDEN, reason)
                    .with_status(StatusCode::FORBIDDEN),
            ),
            Decision::RejectMalformed { reason } => Some(
                ServiceResponse::error(StatusCode::BAD_REQUEST, reason)
                    .with_status(StatusCode::BAD_REQUEST),
            ),
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::DenyForbidden { .. } => "forbidden",
            Decision::RejectMalformed { .. } => "malformed",
        }
    }
}

/// Immutable per-path whitelist, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    rules: HashMap<String, HashSet<String>>,
}

impl AccessGate {
    pub fn new(rules: HashMap<String, HashSet<String>>) -> Self {
        Self { rules }
    }

    /// Build from the config shape `{path: {ip: _}}`.
    pub fn from_config(access: &HashMap<String, HashMap<String, i64>>) -> Self {
        let rules = access
            .iter()
            .map(|(path, ips)| (path.clone(), ips.keys().cloned().collect()))
            .collect();
        Self { rules }
    }

    /// Restrict `path` to `ips`, replacing any existing rule for it.
    pub fn with_rule<I, S>(mut self, path: impl Into<String>, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules
            .insert(path.into(), ips.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide whether `remote_endpoint` may access `path`.
    pub fn check(&self, path: &str, remote_endpoint: &str) -> Decision {
        let parts: Vec<&str> = remote_endpoint.split(':').collect();
        if parts.len() != 2 {
            let decision = Decision::RejectMalformed {
                reason: "invalid remoteaddr".to_string(),
            };
            tracing::trace!(
                path = %path,
                remote = %remote_endpoint,
                outcome = decision.outcome(),
                "Access check"
            );
            return decision;
        }

        let ip = parts[0];
        let decision = if self.is_allowed(path, ip) {
            Decision::Allow
        } else {
            Decision::DenyForbidden {
                reason: "have perm limit, and your ip not in whitelist".to_string(),
            }
        };
        tracing::trace!(path = %path, ip = %ip, outcome = decision.outcome(), "Access check");
        decision
    }

    fn is_allowed(&self, path: &str, ip: &str) -> bool {
        match self.rules.get(path) {
            Some(allowed) => allowed.contains(ip),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_gate() -> AccessGate {
        AccessGate::default().with_rule("/admin", ["10.0.0.1"])
    }

    #[test]
    fn test_empty_rules_allow_everything() {
        let gate = AccessGate::default();
        assert!(gate.is_unrestricted());
        assert_eq!(gate.check("/admin", "1.2.3.4:80"), Decision::Allow);
    }

    #[test]
    fn test_absent_path_allows_any_ip() {
        let gate = admin_gate();
        for ip in ["10.0.0.1", "10.0.0.2", "192.168.1.9", "0.0.0.0"] {
            let endpoint = format!("{}:4000", ip);
            assert_eq!(gate.check("/public", &endpoint), Decision::Allow);
            assert_eq!(gate.check("/Admin", &endpoint), Decision::Allow);
        }
    }

    #[test]
    fn test_listed_path_checks_membership() {
        let gate = admin_gate();
        assert_eq!(gate.check("/admin", "10.0.0.1:5000"), Decision::Allow);
        assert!(matches!(
            gate.check("/admin", "10.0.0.2:5000"),
            Decision::DenyForbidden { .. }
        ));
    }

    #[test]
    fn test_empty_whitelist_denies_everyone() {
        let gate = AccessGate::default().with_rule("/", Vec::<String>::new());
        assert!(!gate.check("/", "10.0.0.1:5000").is_allowed());
    }

    #[test]
    fn test_malformed_endpoints_are_rejected() {
        let gate = AccessGate::default();
        for endpoint in ["10.0.0.1", "", "[::1]:8080", "a:b:c", "::"] {
            assert!(
                matches!(gate.check("/", endpoint), Decision::RejectMalformed { .. }),
                "endpoint {:?} should be malformed",
                endpoint
            );
        }
    }

    #[test]
    fn test_from_config_uses_inner_keys() {
        let access = HashMap::from([(
            "/admin".to_string(),
            HashMap::from([("10.0.0.1".to_string(), 0)]),
        )]);
        let gate = AccessGate::from_config(&access);
        assert!(gate.check("/admin", "10.0.0.1:1").is_allowed());
        assert!(!gate.check("/admin", "10.0.0.3:1").is_allowed());
    }

    #[test]
    fn test_refusals_map_to_envelopes() {
        let forbidden = admin_gate()
            .check("/admin", "10.0.0.2:5000")
            .into_envelope()
            .unwrap();
        assert_eq!(forbidden.status, 403);
        assert_eq!(forbidden.http_status(), StatusCode::FORBIDDEN);

        let malformed = admin_gate().check("/admin", "bogus").into_envelope().unwrap();
        assert_eq!(malformed.status, 400);
        assert_eq!(malformed.message, "invalid remoteaddr");

        assert!(Decision::Allow.into_envelope().is_none());
    }
}
