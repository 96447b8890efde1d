//! Address classification and host resolution.

use crate::error::ValidationError;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use url::Host;

/// Resolves a hostname to the addresses a fetch could end up talking to
pub trait HostResolver: Send + Sync {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        Ok((host, 443)
            .to_socket_addrs()?
            .map(|address| address.ip())
            .collect())
    }
}

/// Whether an address is publicly routable unicast
pub fn is_global_unicast(address: &IpAddr) -> bool {
    match address {
        IpAddr::V4(v4) => is_global_v4(v4),
        IpAddr::V6(v6) => is_global_v6(v6),
    }
}

fn is_global_v4(address: &Ipv4Addr) -> bool {
    let [a, b, c, _] = address.octets();
    let non_global = address.is_unspecified()
        || a == 0
        || address.is_private()
        || address.is_loopback()
        || address.is_link_local()
        || address.is_broadcast()
        || address.is_documentation()
        || address.is_multicast()
        // shared address space (carrier-grade NAT)
        || (a == 100 && (64..=127).contains(&b))
        // IETF protocol assignments
        || (a == 192 && b == 0 && c == 0)
        // benchmarking
        || (a == 198 && (b == 18 || b == 19))
        // reserved
        || a >= 240;
    !non_global
}

fn is_global_v6(address: &Ipv6Addr) -> bool {
    if let Some(mapped) = address.to_ipv4_mapped() {
        return is_global_v4(&mapped);
    }
    let segments = address.segments();
    // only 2000::/3 is allocated for global unicast
    if segments[0] & 0xe000 != 0x2000 {
        return false;
    }
    let documentation = segments[0] == 0x2001 && segments[1] == 0x0db8;
    let ietf_protocol = segments[0] == 0x2001 && segments[1] < 0x0200;
    !(documentation || ietf_protocol)
}

/// Reject a host if any address it maps to is not global unicast.
///
/// IP literals are checked directly; names go through the resolver.
pub fn ensure_global(host: &Host<&str>, resolver: &dyn HostResolver) -> Result<(), ValidationError> {
    let literal = match host {
        Host::Ipv4(v4) => IpAddr::V4(*v4),
        Host::Ipv6(v6) => IpAddr::V6(*v6),
        Host::Domain(name) => return resolve_global(name, resolver).map(|_| ()),
    };
    if is_global_unicast(&literal) {
        Ok(())
    } else {
        Err(ValidationError::NonGlobalAddress {
            host: host.to_string().to_lowercase(),
        })
    }
}

/// Resolve `name`, failing unless every address is global unicast
pub fn resolve_global(name: &str, resolver: &dyn HostResolver) -> Result<Vec<IpAddr>, ValidationError> {
    let addresses = resolve_any(name, resolver)?;
    if addresses.iter().all(is_global_unicast) {
        Ok(addresses)
    } else {
        Err(ValidationError::NonGlobalAddress {
            host: name.to_lowercase(),
        })
    }
}

/// Resolve `name` to at least one address, whatever its class
pub fn resolve_any(name: &str, resolver: &dyn HostResolver) -> Result<Vec<IpAddr>, ValidationError> {
    let unresolvable = || ValidationError::UnresolvableHost {
        host: name.to_lowercase(),
    };
    let addresses = resolver.resolve(name).map_err(|_| unresolvable())?;
    if addresses.is_empty() {
        return Err(unresolvable());
    }
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver(Vec<IpAddr>);

    impl HostResolver for FixedResolver {
        fn resolve(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
            Ok(self.0.clone())
        }
    }

    fn v4(text: &str) -> IpAddr {
        IpAddr::V4(text.parse().unwrap())
    }

    fn v6(text: &str) -> IpAddr {
        IpAddr::V6(text.parse().unwrap())
    }

    #[test]
    fn public_addresses_are_global() {
        assert!(is_global_unicast(&v4("8.8.8.8")));
        assert!(is_global_unicast(&v4("142.250.72.14")));
        assert!(is_global_unicast(&v6("2607:f8b0:4004:800::200e")));
    }

    #[test]
    fn internal_v4_ranges_are_not_global() {
        for address in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.9",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "198.18.0.1",
            "192.0.2.10",
            "224.0.0.1",
            "255.255.255.255",
            "240.0.0.1",
        ] {
            assert!(!is_global_unicast(&v4(address)), "{address} should be rejected");
        }
    }

    #[test]
    fn internal_v6_ranges_are_not_global() {
        for address in ["::1", "::", "fe80::1", "fd00::1", "ff02::1", "2001:db8::1", "::ffff:127.0.0.1"] {
            assert!(!is_global_unicast(&v6(address)), "{address} should be rejected");
        }
    }

    #[test]
    fn any_private_resolution_rejects_host() {
        let resolver = FixedResolver(vec![v4("8.8.8.8"), v4("10.0.0.1")]);
        let err = ensure_global(&Host::Domain("mixed.example.com"), &resolver).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonGlobalAddress {
                host: "mixed.example.com".to_string()
            }
        );
    }

    #[test]
    fn empty_resolution_is_unresolvable() {
        let resolver = FixedResolver(vec![]);
        let err = ensure_global(&Host::Domain("nowhere.example.com"), &resolver).unwrap_err();
        assert!(matches!(err, ValidationError::UnresolvableHost { .. }));
    }

    #[test]
    fn ip_literal_skips_resolver() {
        let resolver = FixedResolver(vec![v4("127.0.0.1")]);
        assert!(ensure_global(&Host::Ipv4("8.8.4.4".parse().unwrap()), &resolver).is_ok());
    }
}
