//! Named ACLs with first-match-wins semantics
//!
//! The tracer consumes ACLs purely through `Acl::check(flow) -> LineAction`;
//! the line representation here is the minimal header-space matcher the
//! engine's tests need.

use serde::{Deserialize, Serialize};

use crate::flow::{Flow, IpProtocol};

use super::types::Prefix;

/// Verdict of an ACL line or of a whole ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineAction {
    Permit,
    Deny,
}

/// Header-space matcher. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderMatch {
    pub src_ips: Option<Prefix>,
    pub dst_ips: Option<Prefix>,
    /// Empty means any protocol.
    pub ip_protocols: Vec<IpProtocol>,
    /// Inclusive port range.
    pub src_ports: Option<(u16, u16)>,
    pub dst_ports: Option<(u16, u16)>,
}

impl HeaderMatch {
    /// Matcher accepting every flow.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn matches(&self, flow: &Flow) -> bool {
        if let Some(src) = self.src_ips {
            if !src.contains(flow.src_ip) {
                return false;
            }
        }
        if let Some(dst) = self.dst_ips {
            if !dst.contains(flow.dst_ip) {
                return false;
            }
        }
        if !self.ip_protocols.is_empty() && !self.ip_protocols.contains(&flow.ip_protocol) {
            return false;
        }
        if let Some((lo, hi)) = self.src_ports {
            if flow.src_port < lo || flow.src_port > hi {
                return false;
            }
        }
        if let Some((lo, hi)) = self.dst_ports {
            if flow.dst_port < lo || flow.dst_port > hi {
                return false;
            }
        }
        true
    }
}

/// One line of an ACL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclLine {
    pub action: LineAction,
    pub matcher: HeaderMatch,
}

/// A named access control list. First matching line wins; a flow matching
/// no line is denied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acl {
    pub name: String,
    pub lines: Vec<AclLine>,
}

impl Acl {
    pub fn new(name: impl Into<String>, lines: Vec<AclLine>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }

    /// ACL permitting every flow.
    pub fn permit_all(name: impl Into<String>) -> Self {
        Self::new(
            name,
            vec![AclLine {
                action: LineAction::Permit,
                matcher: HeaderMatch::any(),
            }],
        )
    }

    /// ACL denying every flow.
    pub fn deny_all(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Evaluate the ACL against a flow.
    pub fn check(&self, flow: &Flow) -> LineAction {
        self.lines
            .iter()
            .find(|line| line.matcher.matches(flow))
            .map(|line| line.action)
            .unwrap_or(LineAction::Deny)
    }
}
