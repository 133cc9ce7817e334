//! `ServerAcl` (spec §3): host/IP allow-listing applied to every inbound
//! request before it reaches the cache (spec §4.6 step 2: "Reject if
//! client host/IP not allowed -> 403").

use ipnet::IpNet;
use std::net::IpAddr;

/// Host and IP checks each short-circuit `true` when their list is empty
/// (allow-all per axis); non-empty lists require membership.
#[derive(Debug, Clone, Default)]
pub struct ServerAcl {
    pub allow_all: bool,
    pub allowed_hosts: Vec<String>,
    pub allowed_ips: Vec<IpAddr>,
    pub cidr_ranges: Vec<IpNet>,
}

impl ServerAcl {
    pub fn new() -> Self {
        ServerAcl::default()
    }

    /// Parse `cidr_ranges` from dotted/slash notation, skipping anything
    /// unparsable (logged, not fatal — a malformed range in config should
    /// not take the whole server down).
    pub fn with_cidr_ranges(mut self, ranges: &[String]) -> Self {
        for raw in ranges {
            match raw.parse::<IpNet>() {
                Ok(net) => self.cidr_ranges.push(net),
                Err(e) => tracing::warn!(range = %raw, error = %e, "ignoring unparsable CIDR range in ACL config"),
            }
        }
        self
    }

    pub fn allow_host(&self, host: &str) -> bool {
        if self.allow_all || self.allowed_hosts.is_empty() {
            return true;
        }
        self.allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }

    /// `true` when empty `allowed_ips`/`cidr_ranges` (allow-all) or when
    /// `ip` is an exact match or falls inside a configured range.
    pub fn allow_ip(&self, ip: IpAddr) -> bool {
        if self.allow_all || (self.allowed_ips.is_empty() && self.cidr_ranges.is_empty()) {
            return true;
        }
        self.allowed_ips.contains(&ip) || self.cidr_ranges.iter().any(|net| net.contains(&ip))
    }

    /// Combined decision a request handler applies (spec §4.6 step 2).
    pub fn permit(&self, host: Option<&str>, ip: Option<IpAddr>) -> bool {
        if self.allow_all {
            return true;
        }
        let host_ok = host.map(|h| self.allow_host(h)).unwrap_or(true);
        let ip_ok = ip.map(|a| self.allow_ip(a)).unwrap_or(true);
        host_ok && ip_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lists_allow_everything() {
        let acl = ServerAcl::new();
        assert!(acl.allow_host("anything"));
        assert!(acl.allow_ip("10.0.0.5".parse().unwrap()));
    }

    #[test]
    fn s6_scenario_cidr_range_permits_and_denies_by_membership() {
        let acl = ServerAcl::new().with_cidr_ranges(&["192.168.0.0/16".to_string()]);
        assert!(!acl.allow_ip("10.0.0.5".parse().unwrap()));
        assert!(acl.allow_ip("192.168.1.7".parse().unwrap()));
    }

    #[test]
    fn allow_all_overrides_nonempty_lists() {
        let acl = ServerAcl {
            allow_all: true,
            allowed_hosts: vec!["only-this-host".into()],
            ..ServerAcl::default()
        };
        assert!(acl.allow_host("some-other-host"));
    }

    #[test]
    fn unparsable_cidr_range_is_skipped_not_fatal() {
        let acl = ServerAcl::new().with_cidr_ranges(&["not-a-cidr".to_string()]);
        assert!(acl.cidr_ranges.is_empty());
    }

    #[test]
    fn exact_ip_match_is_allowed_without_a_cidr_range() {
        let acl = ServerAcl {
            allowed_ips: vec!["203.0.113.9".parse().unwrap()],
            ..ServerAcl::default()
        };
        assert!(acl.allow_ip("203.0.113.9".parse().unwrap()));
        assert!(!acl.allow_ip("203.0.113.10".parse().unwrap()));
    }
}
