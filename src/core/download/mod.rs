//! # Download Module
//!
//! Fetches photo bytes from an untrusted media service without letting a
//! crafted URL reach internal infrastructure.
//!
//! ## Lookup Order
//! 1. Per-run cache (no counter change)
//! 2. Fixture directory, when enabled outside production
//! 3. URL validation, then a single network fetch (no retries)
//!
//! A [`DownloadClient`] lives for exactly one scan. Its cache and counter
//! are never shared between runs.

mod address;
mod fetcher;
mod fixtures;
mod validate;

pub use address::{
    ensure_global, is_global_unicast, resolve_any, resolve_global, HostResolver, SystemResolver,
};
pub use fetcher::{ByteFetcher, GlobalOnlyResolver, HttpFetcher, MAX_PHOTO_BYTES};
pub use fixtures::{is_path_like, FixtureSource, FIXTURE_EXTENSIONS};
pub use validate::{
    is_allowed_host, rewrite_host, validate_download_url, DownloadPolicy, BLOCKED_HOSTS,
    MEDIA_CDN_SENTINELS,
};

use crate::core::photo::PhotoItem;
use crate::error::{Result, ValidationError};
use crate::events::{null_sender, ByteSource, DownloadEvent, Event, EventSender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Memoizing, validating photo downloader for a single run
pub struct DownloadClient {
    policy: DownloadPolicy,
    fixtures: Option<FixtureSource>,
    fetcher: Arc<dyn ByteFetcher>,
    resolver: Arc<dyn HostResolver>,
    cache: Mutex<HashMap<String, Arc<Vec<u8>>>>,
    downloads: AtomicUsize,
    events: EventSender,
}

impl DownloadClient {
    pub fn new(
        policy: DownloadPolicy,
        fixtures: Option<FixtureSource>,
        fetcher: Arc<dyn ByteFetcher>,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        Self {
            policy,
            fixtures,
            fetcher,
            resolver,
            cache: Mutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
            events: null_sender(),
        }
    }

    /// Report every real fetch on `events`
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    /// Bytes for a photo, fetched at most once per client
    pub fn fetch(&self, photo: &PhotoItem) -> Result<Arc<Vec<u8>>> {
        if let Some(bytes) = self.cached(&photo.id) {
            debug!(photo_id = %photo.id, "Download cache hit");
            return Ok(bytes);
        }

        if let Some(fixtures) = &self.fixtures {
            if let Some(bytes) = fixtures.load(&photo.id)? {
                debug!(photo_id = %photo.id, dir = %fixtures.dir().display(), "Loaded fixture bytes");
                return Ok(self.store(&photo.id, bytes, ByteSource::Fixture));
            }
        }

        let raw_url = photo
            .download_url
            .as_deref()
            .ok_or_else(|| ValidationError::MissingDownloadUrl {
                photo_id: photo.id.clone(),
            })?;
        let url = validate_download_url(&photo.id, raw_url, &self.policy, self.resolver.as_ref())?;
        let bytes = self.fetcher.fetch(&url)?;
        debug!(photo_id = %photo.id, size = bytes.len(), "Downloaded photo bytes");
        Ok(self.store(&photo.id, bytes, ByteSource::Network))
    }

    /// Number of real fetches (fixture loads included, cache hits excluded)
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::Relaxed)
    }

    fn cached(&self, photo_id: &str) -> Option<Arc<Vec<u8>>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(photo_id)
            .cloned()
    }

    fn store(&self, photo_id: &str, bytes: Vec<u8>, source: ByteSource) -> Arc<Vec<u8>> {
        self.events.send(Event::Download(DownloadEvent::Fetched {
            photo_id: photo_id.to_string(),
            source,
            size_bytes: bytes.len(),
        }));
        let bytes = Arc::new(bytes);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(photo_id.to_string(), Arc::clone(&bytes));
        self.downloads.fetch_add(1, Ordering::Relaxed);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, TransportError};
    use chrono::{TimeZone, Utc};
    use std::io;
    use std::net::IpAddr;
    use url::Url;

    struct CountingFetcher {
        calls: AtomicUsize,
        status: Option<u16>,
    }

    impl CountingFetcher {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                status: None,
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                status: Some(status),
            })
        }
    }

    impl ByteFetcher for CountingFetcher {
        fn fetch(&self, url: &Url) -> std::result::Result<Vec<u8>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.status {
                Some(status) => Err(TransportError {
                    host: url.host_str().unwrap_or_default().to_string(),
                    status: Some(status),
                }),
                None => Ok(url.path().as_bytes().to_vec()),
            }
        }
    }

    struct PublicResolver;

    impl HostResolver for PublicResolver {
        fn resolve(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
            Ok(vec!["142.250.72.14".parse().unwrap()])
        }
    }

    fn photo(id: &str, url: Option<&str>) -> PhotoItem {
        let item = PhotoItem::new(id, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        match url {
            Some(url) => item.with_download_url(url),
            None => item,
        }
    }

    fn client(fetcher: Arc<CountingFetcher>, fixtures: Option<FixtureSource>) -> DownloadClient {
        let policy = DownloadPolicy {
            allowed_hosts: vec!["googleusercontent.com".to_string()],
            ..DownloadPolicy::default()
        };
        DownloadClient::new(policy, fixtures, fetcher, Arc::new(PublicResolver))
    }

    #[test]
    fn second_fetch_is_served_from_cache() {
        let fetcher = CountingFetcher::ok();
        let client = client(Arc::clone(&fetcher), None);
        let item = photo("p1", Some("https://lh3.googleusercontent.com/a"));

        let first = client.fetch(&item).unwrap();
        let second = client.fetch(&item).unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.download_count(), 1);
    }

    #[test]
    fn missing_url_is_a_validation_error() {
        let client = client(CountingFetcher::ok(), None);
        let err = client.fetch(&photo("p1", None)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::MissingDownloadUrl { .. })
        ));
        assert_eq!(client.download_count(), 0);
    }

    #[test]
    fn rejected_host_never_reaches_fetcher() {
        let fetcher = CountingFetcher::ok();
        let client = client(Arc::clone(&fetcher), None);
        let err = client
            .fetch(&photo("p1", Some("https://evil.example.com/a")))
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn transport_failure_is_not_counted() {
        let client = client(CountingFetcher::failing(403), None);
        let err = client
            .fetch(&photo("p1", Some("https://lh3.googleusercontent.com/a")))
            .unwrap_err();
        assert!(err.to_string().contains("status 403"));
        assert_eq!(client.download_count(), 0);
    }

    #[test]
    fn fixture_bytes_take_precedence_and_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("p1.jpg"), b"fixture").unwrap();
        let fetcher = CountingFetcher::ok();
        let client = client(
            Arc::clone(&fetcher),
            Some(FixtureSource::new(dir.path(), false)),
        );

        let bytes = client.fetch(&photo("p1", None)).unwrap();
        assert_eq!(bytes.as_slice(), b"fixture");
        assert_eq!(client.download_count(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn lenient_fixture_miss_uses_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = CountingFetcher::ok();
        let client = client(
            Arc::clone(&fetcher),
            Some(FixtureSource::new(dir.path(), false)),
        );

        client
            .fetch(&photo("p2", Some("https://lh3.googleusercontent.com/b")))
            .unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
