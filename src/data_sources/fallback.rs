//! Staleness detection and the alternate data source.
//!
//! The primary feature service occasionally lags behind the daily report.
//! When a [`FreshnessPolicy`] judges its `Datenstand` too old, the same query
//! is re-issued against an [`AlternateSource`] that answers with documents of
//! the same shape.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};

use super::transport::{RawResponse, Transport};
use crate::error::FetchError;

/// Decides whether a provider's as-of timestamp is too old to trust.
pub trait FreshnessPolicy: Send + Sync {
    /// Whether data computed at `as_of` is stale right now.
    fn is_stale(&self, as_of: DateTime<Utc>) -> bool;
}

/// Stale once the cutoff hour has passed on a day the data was not computed.
///
/// The daily report normally lands shortly after midnight, so before
/// `cutoff_hour` yesterday's data is still expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCutoff {
    cutoff_hour: u32,
}

impl DailyCutoff {
    /// Create a policy with the given UTC cutoff hour (clamped to 0..=23).
    pub fn new(cutoff_hour: u32) -> Self {
        Self {
            cutoff_hour: cutoff_hour.min(23),
        }
    }

    /// Evaluate the policy at an explicit instant.
    pub fn is_stale_at(&self, as_of: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        as_of.date_naive() < now.date_naive() && now.hour() >= self.cutoff_hour
    }
}

impl Default for DailyCutoff {
    fn default() -> Self {
        Self::new(4)
    }
}

impl FreshnessPolicy for DailyCutoff {
    fn is_stale(&self, as_of: DateTime<Utc>) -> bool {
        self.is_stale_at(as_of, Utc::now())
    }
}

/// Never considers data stale; disables the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStale;

impl FreshnessPolicy for NeverStale {
    fn is_stale(&self, _as_of: DateTime<Utc>) -> bool {
        false
    }
}

/// Answers a primary-source query from a secondary provider.
#[async_trait]
pub trait AlternateSource: Send + Sync {
    /// Re-run the query behind `original_url`.
    ///
    /// `region_code` is the two-digit state code for queries restricted to a
    /// single state.
    async fn fetch(
        &self,
        original_url: &str,
        region_code: Option<&str>,
    ) -> Result<RawResponse, FetchError>;
}

/// Alternate source mirroring the primary services under another base URL.
#[derive(Clone)]
pub struct MirrorSource {
    transport: Arc<dyn Transport>,
    primary_base: String,
    mirror_base: String,
}

impl MirrorSource {
    /// Create a mirror that rewrites `primary_base` to `mirror_base`.
    pub fn new(transport: Arc<dyn Transport>, primary_base: &str, mirror_base: &str) -> Self {
        Self {
            transport,
            primary_base: primary_base.trim_end_matches('/').to_string(),
            mirror_base: mirror_base.trim_end_matches('/').to_string(),
        }
    }

    /// The mirror URL for a primary query.
    pub fn mirror_url(&self, original_url: &str, region_code: Option<&str>) -> String {
        let mut url = match original_url.strip_prefix(&self.primary_base) {
            Some(rest) => format!("{}{}", self.mirror_base, rest),
            None => original_url.to_string(),
        };

        if let Some(code) = region_code {
            let separator = if url.contains('?') { '&' } else { '?' };
            url.push(separator);
            url.push_str(&format!("regionCode={}", urlencoding::encode(code)));
        }

        url
    }
}

#[async_trait]
impl AlternateSource for MirrorSource {
    async fn fetch(
        &self,
        original_url: &str,
        region_code: Option<&str>,
    ) -> Result<RawResponse, FetchError> {
        let url = self.mirror_url(original_url, region_code);
        self.transport.get(&url).await
    }
}

/// No alternate source configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAlternate;

#[async_trait]
impl AlternateSource for NoAlternate {
    async fn fetch(
        &self,
        _original_url: &str,
        _region_code: Option<&str>,
    ) -> Result<RawResponse, FetchError> {
        Err(FetchError::AlternateUnavailable)
    }
}
