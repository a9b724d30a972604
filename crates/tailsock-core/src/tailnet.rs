//! Tailnet address-range membership.
//!
//! Tailscale assigns every node an IPv4 address out of the CGNAT block
//! `100.64.0.0/10` and an IPv6 address out of `fd7a:115c:a1e0::/48`. An
//! address belongs to the tailnet iff it falls in the range matching its own
//! family; IPv4-mapped IPv6 forms (`::ffff:a.b.c.d`) are unwrapped and tested
//! as IPv4.

use std::net::IpAddr;
use std::sync::LazyLock;

use ipnet::{Ipv4Net, Ipv6Net};

static TAILNET_V4: LazyLock<Ipv4Net> =
    LazyLock::new(|| "100.64.0.0/10".parse().expect("valid CGNAT range"));

static TAILNET_V6: LazyLock<Ipv6Net> =
    LazyLock::new(|| "fd7a:115c:a1e0::/48".parse().expect("valid tailnet ULA range"));

/// Check whether an already-parsed address is inside the tailnet ranges.
///
/// An IPv4-mapped IPv6 address is unwrapped first; a plain v6 address is never
/// tested against the v4 range and vice versa.
#[must_use]
pub fn is_tailnet_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => TAILNET_V4.contains(&v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => TAILNET_V4.contains(&v4),
            None => TAILNET_V6.contains(&v6),
        },
    }
}

/// Classify a textual address, returning the canonical address that matched.
///
/// `"::ffff:100.64.0.1"` matches as the embedded `100.64.0.1`. Returns `None`
/// for addresses outside the tailnet ranges and for unparseable input.
#[must_use]
pub fn tailnet_addr(addr: &str) -> Option<IpAddr> {
    let ip: IpAddr = addr.trim().parse().ok()?;
    let canonical = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        v4 => v4,
    };
    is_tailnet_ip(canonical).then_some(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cgnat_membership() {
        assert_eq!(
            tailnet_addr("100.64.0.1"),
            Some("100.64.0.1".parse().unwrap())
        );
        assert_eq!(
            tailnet_addr("100.127.255.254"),
            Some("100.127.255.254".parse().unwrap())
        );
        assert_eq!(tailnet_addr("8.8.8.8"), None);
        assert_eq!(tailnet_addr("100.128.0.1"), None);
    }

    #[test]
    fn ula_membership() {
        assert!(tailnet_addr("fd7a:115c:a1e0::1").is_some());
        assert!(tailnet_addr("fd7a:115c:a1e0:ab12::1").is_some());
        assert_eq!(tailnet_addr("fd7a:115c:a1e1::1"), None);
        assert_eq!(tailnet_addr("2001:db8::1"), None);
    }

    #[test]
    fn v4_mapped_unwraps_to_v4() {
        assert_eq!(
            tailnet_addr("::ffff:100.64.0.1"),
            Some("100.64.0.1".parse().unwrap())
        );
        assert_eq!(tailnet_addr("::ffff:8.8.8.8"), None);
    }

    #[test]
    fn families_never_cross() {
        // A v6 address numerically inside the CGNAT block's v4 bits is not
        // tailnet; only the mapped form unwraps.
        assert_eq!(tailnet_addr("::6440:1"), None);
        assert!(!is_tailnet_ip("fd7a:115c:a1e1::1".parse().unwrap()));
    }

    #[test]
    fn garbage_input_is_none() {
        assert_eq!(tailnet_addr("not-an-address"), None);
        assert_eq!(tailnet_addr(""), None);
    }
}
