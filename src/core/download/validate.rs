//! Download URL validation and host rewriting.
//!
//! Every non-cached, non-fixture fetch passes through
//! [`validate_download_url`] first. The checks run in a fixed order:
//!
//! 1. blocked internal host aliases (before any override lookup)
//! 2. host rewrite from the override map
//! 3. https only
//! 4. a hostname must be present
//! 5. allowlist, with the media CDN wildcard
//! 6. every resolved address must be global unicast
//!
//! Overridden hosts skip 3, 5 and 6 when override exceptions are allowed.

use super::address::{ensure_global, HostResolver};
use crate::config::{RunCapabilities, ScanSettings};
use crate::error::ValidationError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::warn;
use url::Url;

/// Internal aliases that are never fetched, whatever the overrides say
pub const BLOCKED_HOSTS: &[&str] = &["host.docker.internal", "metadata.google.internal"];

/// Allowlist entries that switch on the media CDN shard pattern
pub const MEDIA_CDN_SENTINELS: &[&str] = &["googleusercontent.com", ".googleusercontent.com"];

static MEDIA_CDN_HOST: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^lh\d+\.googleusercontent\.com$").ok());

/// Which hosts a run may download from, and how to reach them
#[derive(Debug, Clone, Default)]
pub struct DownloadPolicy {
    /// Empty means any host
    pub allowed_hosts: Vec<String>,
    /// Lowercase original host -> replacement host or base URL
    pub host_overrides: HashMap<String, String>,
    pub allow_override_exceptions: bool,
}

impl DownloadPolicy {
    /// Policy for one run: allowlist from settings, overrides only if granted
    pub fn for_run(settings: &ScanSettings, capabilities: &RunCapabilities) -> Self {
        Self {
            allowed_hosts: settings.scan_allowed_download_hosts.clone(),
            host_overrides: capabilities.host_overrides.clone(),
            allow_override_exceptions: capabilities.allow_override_exceptions,
        }
    }

    /// Lowercase hosts that overrides point at, when they skip the
    /// address checks. Empty otherwise.
    pub fn exempt_hosts(&self) -> HashSet<String> {
        if !self.allow_override_exceptions {
            return HashSet::new();
        }
        let Ok(anchor) = Url::parse("https://override.invalid/") else {
            return HashSet::new();
        };
        self.host_overrides
            .values()
            .filter_map(|replacement| rewrite_host(&anchor, replacement))
            .filter_map(|target| target.host_str().map(str::to_lowercase))
            .collect()
    }

    fn override_for(&self, host: &str) -> Option<&str> {
        self.host_overrides
            .get(host)
            .or_else(|| self.host_overrides.get(&host.to_lowercase()))
            .map(String::as_str)
    }
}

/// Validate a photo's download URL and return the URL to actually fetch.
pub fn validate_download_url(
    photo_id: &str,
    raw_url: &str,
    policy: &DownloadPolicy,
    resolver: &dyn HostResolver,
) -> Result<Url, ValidationError> {
    let malformed = || ValidationError::MalformedUrl {
        photo_id: photo_id.to_string(),
    };
    let original = Url::parse(raw_url).map_err(|_| malformed())?;
    let original_host = original.host_str().unwrap_or_default().to_lowercase();

    if BLOCKED_HOSTS.contains(&original_host.as_str()) {
        warn!(host = %original_host, "Rejected blocked download host");
        return Err(ValidationError::BlockedHost {
            host: original_host,
        });
    }

    let replacement = policy.override_for(&original_host);
    let exempt = replacement.is_some() && policy.allow_override_exceptions;
    let effective = match replacement {
        Some(replacement) if replacement != original_host => {
            rewrite_host(&original, replacement).ok_or_else(malformed)?
        }
        _ => original,
    };

    let effective_host = effective.host_str().unwrap_or_default().to_lowercase();

    if effective.scheme() != "https" && !exempt {
        return Err(ValidationError::InsecureScheme {
            host: effective_host,
        });
    }

    let host = match effective.host() {
        Some(host) if !effective_host.is_empty() => host,
        _ => return Err(ValidationError::MissingHostname),
    };

    if exempt {
        return Ok(effective);
    }

    if !is_allowed_host(&effective_host, &policy.allowed_hosts) {
        warn!(host = %effective_host, "Rejected download URL host");
        return Err(ValidationError::HostNotAllowed {
            host: effective_host,
        });
    }

    ensure_global(&host, resolver)?;
    Ok(effective)
}

/// Whether `host` passes the allowlist
pub fn is_allowed_host(host: &str, allowed_hosts: &[String]) -> bool {
    if allowed_hosts.is_empty() {
        return true;
    }
    let normalized: Vec<String> = allowed_hosts
        .iter()
        .map(|allowed| allowed.trim().to_lowercase())
        .filter(|allowed| !allowed.is_empty())
        .collect();
    let host = host.to_lowercase();

    if normalized.iter().any(|allowed| *allowed == host) {
        return true;
    }
    let wildcard = normalized
        .iter()
        .any(|allowed| MEDIA_CDN_SENTINELS.contains(&allowed.as_str()));
    wildcard
        && MEDIA_CDN_HOST
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(&host))
}

/// Point `original` at `replacement`, keeping path and query.
///
/// A replacement with a scheme (`http://localhost:9000`) swaps scheme, host
/// and port. A bare host swaps the host only; a bare `host:port` also sets
/// the port.
pub fn rewrite_host(original: &Url, replacement: &str) -> Option<Url> {
    let mut rewritten = original.clone();
    if replacement.contains("://") {
        let target = Url::parse(replacement).ok()?;
        rewritten.set_scheme(target.scheme()).ok()?;
        rewritten.set_host(target.host_str()).ok()?;
        rewritten.set_port(target.port()).ok()?;
    } else {
        let target = Url::parse(&format!("{}://{}", original.scheme(), replacement)).ok()?;
        rewritten.set_host(target.host_str()).ok()?;
        if target.port().is_some() {
            rewritten.set_port(target.port()).ok()?;
        }
    }
    Some(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::IpAddr;

    struct StaticResolver(&'static str);

    impl HostResolver for StaticResolver {
        fn resolve(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
            Ok(vec![self.0.parse().unwrap()])
        }
    }

    const PUBLIC: StaticResolver = StaticResolver("142.250.72.14");
    const PRIVATE: StaticResolver = StaticResolver("10.0.0.5");

    fn default_policy() -> DownloadPolicy {
        DownloadPolicy {
            allowed_hosts: vec![
                "googleusercontent.com".to_string(),
                "photos.google.com".to_string(),
            ],
            ..DownloadPolicy::default()
        }
    }

    fn policy_with_override(from: &str, to: &str) -> DownloadPolicy {
        let mut policy = default_policy();
        policy.host_overrides.insert(from.to_string(), to.to_string());
        policy.allow_override_exceptions = true;
        policy
    }

    #[test]
    fn exempt_hosts_are_override_targets() {
        let mut policy = policy_with_override("lh3.googleusercontent.com", "http://LocalHost:9000");
        policy
            .host_overrides
            .insert("photos.google.com".to_string(), "mirror.internal:8443".to_string());

        let exempt = policy.exempt_hosts();
        assert_eq!(exempt.len(), 2);
        assert!(exempt.contains("localhost"));
        assert!(exempt.contains("mirror.internal"));

        policy.allow_override_exceptions = false;
        assert!(policy.exempt_hosts().is_empty());
    }

    #[test]
    fn production_policy_has_no_overrides() {
        let settings = ScanSettings {
            environment: "prod".to_string(),
            scan_download_host_overrides: HashMap::from([(
                "lh3.googleusercontent.com".to_string(),
                "http://localhost:9000".to_string(),
            )]),
            ..ScanSettings::default()
        };
        let policy = DownloadPolicy::for_run(&settings, &RunCapabilities::resolve(&settings, false));
        assert!(policy.host_overrides.is_empty());
        assert!(policy.exempt_hosts().is_empty());
        assert_eq!(policy.allowed_hosts, settings.scan_allowed_download_hosts);
    }

    #[test]
    fn media_shard_host_is_accepted() {
        let url = validate_download_url(
            "p1",
            "https://lh3.googleusercontent.com/abc?token=secret",
            &default_policy(),
            &PUBLIC,
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("lh3.googleusercontent.com"));
    }

    #[test]
    fn plain_http_is_rejected() {
        let err = validate_download_url(
            "p1",
            "http://lh3.googleusercontent.com/abc",
            &default_policy(),
            &PUBLIC,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InsecureScheme {
                host: "lh3.googleusercontent.com".to_string()
            }
        );
    }

    #[test]
    fn unlisted_host_is_rejected_without_leaking_url() {
        let err = validate_download_url(
            "p1",
            "https://evil.example.com/x?sig=TOPSECRET",
            &default_policy(),
            &PUBLIC,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'evil.example.com'"));
        assert!(message.contains("not allowed"));
        assert!(!message.contains("TOPSECRET"));
        assert!(!message.contains("/x"));
    }

    #[test]
    fn allowed_host_resolving_privately_is_rejected() {
        let err = validate_download_url(
            "p1",
            "https://lh5.googleusercontent.com/x",
            &default_policy(),
            &PRIVATE,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::NonGlobalAddress { .. }));
    }

    #[test]
    fn loopback_literal_is_rejected_when_allowlist_empty() {
        let err = validate_download_url(
            "p1",
            "https://127.0.0.1/x",
            &DownloadPolicy::default(),
            &PUBLIC,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::NonGlobalAddress { .. }));
    }

    #[test]
    fn blocked_alias_wins_over_override() {
        let policy = policy_with_override("host.docker.internal", "localhost:9000");
        let err = validate_download_url(
            "p1",
            "https://host.docker.internal/x",
            &policy,
            &PUBLIC,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::BlockedHost {
                host: "host.docker.internal".to_string()
            }
        );
    }

    #[test]
    fn override_exception_bypasses_checks() {
        let policy = policy_with_override("media.fixture", "http://127.0.0.1:9000");
        let url = validate_download_url(
            "p1",
            "https://media.fixture/img/1.jpg?x=1",
            &policy,
            &PRIVATE,
        )
        .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/img/1.jpg?x=1");
    }

    #[test]
    fn override_without_exception_still_validates() {
        let mut policy = policy_with_override("media.fixture", "http://127.0.0.1:9000");
        policy.allow_override_exceptions = false;
        let err = validate_download_url("p1", "https://media.fixture/a", &policy, &PUBLIC)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InsecureScheme { .. }));
    }

    #[test]
    fn malformed_url_names_photo() {
        let err =
            validate_download_url("p9", "not a url", &default_policy(), &PUBLIC).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MalformedUrl {
                photo_id: "p9".to_string()
            }
        );
    }

    #[test]
    fn bare_host_rewrite_keeps_port_and_path() {
        let original = Url::parse("https://a.example.com:8443/p/q?x=1").unwrap();
        let rewritten = rewrite_host(&original, "b.example.com").unwrap();
        assert_eq!(rewritten.as_str(), "https://b.example.com:8443/p/q?x=1");
    }

    #[test]
    fn scheme_rewrite_replaces_authority() {
        let original = Url::parse("https://a.example.com:8443/p?x=1").unwrap();
        let rewritten = rewrite_host(&original, "http://localhost:9000").unwrap();
        assert_eq!(rewritten.as_str(), "http://localhost:9000/p?x=1");
    }

    #[test]
    fn allowlist_matching() {
        let allowed = vec![" Photos.Google.com ".to_string(), ".googleusercontent.com".to_string()];
        assert!(is_allowed_host("photos.google.com", &allowed));
        assert!(is_allowed_host("LH12.googleusercontent.com", &allowed));
        assert!(!is_allowed_host("evil.googleusercontent.com", &allowed));
        assert!(!is_allowed_host("lh3.googleusercontent.com.evil.io", &allowed));
        assert!(is_allowed_host("anything.example", &[]));
    }

    #[test]
    fn wildcard_requires_sentinel() {
        let allowed = vec!["photos.google.com".to_string()];
        assert!(!is_allowed_host("lh3.googleusercontent.com", &allowed));
    }
}
