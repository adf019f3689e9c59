//! Process-wide signing certificate cache with expiry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::allow_list::CertUrlPolicy;
use super::source::CertificateSource;
use super::validator;
use crate::error::{fetch_error, Error, FetchErrorKind};

/// A certificate as fetched from its URL.
///
/// Entries are replaced wholesale on refresh and never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCertificate {
    /// The URL the PEM was fetched from (the cache key).
    pub source_url: String,
    /// The PEM text exactly as served.
    pub pem_text: String,
    /// When this entry stops being served.
    pub expires_at: DateTime<Utc>,
}

impl CachedCertificate {
    /// Whether the entry has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

struct Inner<S> {
    source: S,
    policy: CertUrlPolicy,
    max_age: Duration,
    entries: DashMap<String, CachedCertificate>,
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Caches provider signing certificates keyed by URL.
///
/// An entry expires at the certificate's own `notAfter` or `max_age` after it was
/// fetched, whichever comes first. Cloning the cache shares its state, so one instance
/// created at startup can be handed to every verifier.
///
/// Concurrent misses on the same URL are collapsed onto a single fetch with a per-URL
/// lock; different URLs never wait on each other.
pub struct CertificateCache<S: CertificateSource> {
    inner: Arc<Inner<S>>,
}

impl<S: CertificateSource> Clone for CertificateCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CertificateSource> CertificateCache<S> {
    /// Default upper bound on how long a fetched certificate is served before a refetch.
    pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

    /// Create a cache over `source`, fetching only URLs that satisfy `policy`.
    pub fn new(source: S, policy: CertUrlPolicy) -> Self {
        Self::with_chrono_max_age(source, policy, Duration::hours(Self::DEFAULT_MAX_AGE_HOURS))
    }

    /// Create a cache with a custom maximum entry age.
    pub fn with_max_age(source: S, policy: CertUrlPolicy, max_age: std::time::Duration) -> Self {
        let max_age = Duration::from_std(max_age).unwrap_or(Duration::MAX);
        Self::with_chrono_max_age(source, policy, max_age)
    }

    fn with_chrono_max_age(source: S, policy: CertUrlPolicy, max_age: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                policy,
                max_age,
                entries: DashMap::new(),
                refresh_locks: DashMap::new(),
            }),
        }
    }

    /// The URL policy applied before any fetch.
    pub fn policy(&self) -> &CertUrlPolicy {
        &self.inner.policy
    }

    /// Get the PEM text for `url`, fetching it if it is not cached or has expired.
    pub async fn get_certificate(&self, url: &str) -> Result<String, Error> {
        self.get_certificate_inner(url, None).await
    }

    /// Like [`Self::get_certificate`], but gives up with `FetchErrorKind::Timeout` once
    /// `deadline` passes.
    pub async fn get_certificate_until(&self, url: &str, deadline: Instant) -> Result<String, Error> {
        self.get_certificate_inner(url, Some(deadline)).await
    }

    async fn get_certificate_inner(
        &self,
        url: &str,
        deadline: Option<Instant>,
    ) -> Result<String, Error> {
        let parsed_url = self.inner.policy.check(url).inspect_err(|_| {
            warn!("Refusing to fetch certificate from disallowed URL {}", url);
        })?;

        if let Some(pem_text) = self.lookup(url) {
            debug!("Certificate cache hit for {}", url);
            return Ok(pem_text);
        }

        let refresh = async {
            let refresh_lock = RefreshLock::acquire(&self.inner.refresh_locks, url);
            let _guard = refresh_lock.lock.lock().await;

            // Another request may have refreshed the entry while we waited
            if let Some(pem_text) = self.lookup(url) {
                debug!("Certificate for {} was refreshed by another request", url);
                return Ok::<String, Error>(pem_text);
            }

            debug!("Certificate cache miss for {}, fetching", url);
            let pem_text = self.inner.source.fetch(&parsed_url).await?;
            let certificate = validator::parse(&pem_text)?;

            let fetched_at = Utc::now();
            let expires_at = fetched_at
                .checked_add_signed(self.inner.max_age)
                .map_or(certificate.not_after(), |capped| capped.min(certificate.not_after()));

            self.inner.entries.insert(
                url.to_string(),
                CachedCertificate {
                    source_url: url.to_string(),
                    pem_text: pem_text.clone(),
                    expires_at,
                },
            );
            debug!("Cached certificate for {} until {}", url, expires_at);

            Ok::<String, Error>(pem_text)
        };

        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, refresh)
                .await
                .unwrap_or_else(|_| {
                    warn!("Certificate fetch from {} exceeded its deadline", url);
                    Err(fetch_error(
                        FetchErrorKind::Timeout,
                        "Certificate fetch exceeded the verification deadline",
                    ))
                }),
            None => refresh.await,
        }
    }

    fn lookup(&self, url: &str) -> Option<String> {
        let now = Utc::now();
        self.inner
            .entries
            .get(url)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.pem_text.clone())
    }

    /// Remove every entry, forcing the next request for each URL to refetch.
    pub fn clear_cache(&self) {
        self.inner.entries.clear();
        self.inner.refresh_locks.clear();
    }

    /// Snapshot of the current entries, expired ones included. For debugging only.
    pub fn inspect_cache(&self) -> Vec<CachedCertificate> {
        self.inner
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Drop entries that have expired, along with refresh locks nobody holds.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.inner
            .entries
            .retain(|_, entry| !entry.is_expired_at(now));
        self.inner
            .refresh_locks
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// A handle on the per-URL refresh lock.
///
/// Dropping the last handle removes the lock from the map, so the map only holds URLs with
/// a refresh in flight. This also runs when a refresh is abandoned at its deadline.
struct RefreshLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    url: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> RefreshLock<'a> {
    fn acquire(locks: &'a DashMap<String, Arc<Mutex<()>>>, url: &'a str) -> Self {
        let lock = locks
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self { locks, url, lock }
    }
}

impl Drop for RefreshLock<'_> {
    fn drop(&mut self) {
        // Two references: the map's and ours. Any more means another request is waiting.
        self.locks.remove_if(self.url, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}
