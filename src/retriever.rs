//! Retrieval of state statistics with staleness fallback.
//!
//! # Control flow
//!
//! Every operation builds a query URL, fetches it, rejects provider errors,
//! reads the provider's as-of timestamp and maps the raw rows into the output
//! schema. History and event-count operations additionally run the
//! freshness check: when the primary `Datenstand` is stale the same query is
//! re-issued once against the alternate source.
//!
//! Operations share no state. Within one operation the remote calls are
//! strictly sequential, at most two per operation.
//!
//! # Example
//!
//! ```ignore
//! let transport = Arc::new(HttpTransport::new(Duration::from_secs(30), DEFAULT_USER_AGENT)?);
//! let retriever = StatesRetriever::new(transport);
//! let deaths = retriever.new_deaths().await?;
//! println!("{} states, as of {}", deaths.data.len(), deaths.last_update);
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::data_sources::arcgis::{self, DEFAULT_BASE_URL, Feature};
use crate::data_sources::fallback::{AlternateSource, FreshnessPolicy, NeverStale, NoAlternate};
use crate::data_sources::rki::{self, AgeGroupAttributes, AggregateAttributes, StateAttributes};
use crate::data_sources::transport::{RawResponse, Transport};
use crate::dates;
use crate::error::FetchError;
use crate::model::{AgeGroups, DeltaRecord, HistoryRecord, Metric, ResponseEnvelope, StateRecord};
use crate::regions::{self, RegionId};

/// Offset between `Aktualisierung` and the actual report time.
///
/// The states service stamps its refresh one hour early.
pub const REPORTING_OFFSET_HOURS: i64 = 1;

/// Region id assigned to the synthetic zero-record.
pub const SYNTHETIC_REGION_ID: RegionId = 1;

/// Fetches state statistics from the RKI feature services.
///
/// Cheap to clone; clones share the transport and fallback collaborators.
#[derive(Clone)]
pub struct StatesRetriever {
    transport: Arc<dyn Transport>,
    base_url: String,
    freshness: Arc<dyn FreshnessPolicy>,
    alternate: Arc<dyn AlternateSource>,
}

impl StatesRetriever {
    /// Create a retriever against the public services, with the fallback disabled.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            freshness: Arc::new(NeverStale),
            alternate: Arc::new(NoAlternate),
        }
    }

    /// Use a different services root (for mirrors and testing).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Enable the staleness fallback.
    pub fn with_fallback(
        mut self,
        freshness: Arc<dyn FreshnessPolicy>,
        alternate: Arc<dyn AlternateSource>,
    ) -> Self {
        self.freshness = freshness;
        self.alternate = alternate;
        self
    }

    /// The services root queries are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current totals for every state.
    ///
    /// No fallback: the states service always answers with one row per state.
    #[instrument(skip(self))]
    pub async fn current_state_stats(&self) -> Result<ResponseEnvelope<Vec<StateRecord>>, FetchError> {
        let url = rki::current_states_query().url(&self.base_url);
        let features: Vec<Feature<StateAttributes>> = self.query(&url).await?;

        let first = features
            .first()
            .ok_or_else(|| FetchError::MissingTimestamp { url: url.clone() })?;
        let last_update =
            dates::parse_date(&first.attributes.updated)? + Duration::hours(REPORTING_OFFSET_HOURS);

        let data = features
            .into_iter()
            .map(|feature| {
                let attributes = feature.attributes;
                let id = attributes
                    .region_id()
                    .ok_or_else(|| FetchError::InvalidAttribute {
                        field: "LAN_ew_AGS",
                        value: attributes.key.clone(),
                    })?;
                Ok(attributes.into_record(id))
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        Ok(ResponseEnvelope::new(data, last_update))
    }

    /// Cumulative recovered count per state.
    #[instrument(skip(self))]
    pub async fn cumulative_recovered(&self) -> Result<ResponseEnvelope<Vec<DeltaRecord>>, FetchError> {
        let metric = Metric::Recovered;
        let url = rki::events_query(metric, rki::CUMULATIVE_FLAGS).url(&self.base_url);
        let features: Vec<Feature<AggregateAttributes>> = self.query(&url).await?;

        let (features, last_update) = self.ensure_fresh(&url, None, features).await?;
        let data: Vec<DeltaRecord> = features.iter().map(|f| f.attributes.to_delta(metric)).collect();

        Ok(ResponseEnvelope::new(data, last_update))
    }

    /// Cases new in the latest report, per state.
    pub async fn new_cases(&self) -> Result<ResponseEnvelope<Vec<DeltaRecord>>, FetchError> {
        self.new_events(Metric::Cases).await
    }

    /// Deaths new in the latest report, per state.
    pub async fn new_deaths(&self) -> Result<ResponseEnvelope<Vec<DeltaRecord>>, FetchError> {
        self.new_events(Metric::Deaths).await
    }

    /// Recoveries new in the latest report, per state.
    pub async fn new_recovered(&self) -> Result<ResponseEnvelope<Vec<DeltaRecord>>, FetchError> {
        self.new_events(Metric::Recovered).await
    }

    /// Events of `metric` new in the latest report, per state.
    ///
    /// When no state reports a new event the result is a single zero-count
    /// record for [`SYNTHETIC_REGION_ID`], dated with the `Datenstand` of the
    /// cumulative query, so the result is never empty and always carries the
    /// provider's as-of date.
    #[instrument(skip(self))]
    pub async fn new_events(&self, metric: Metric) -> Result<ResponseEnvelope<Vec<DeltaRecord>>, FetchError> {
        let url = rki::events_query(metric, rki::NEW_EVENT_FLAGS).url(&self.base_url);
        let mut features: Vec<Feature<AggregateAttributes>> = self.query(&url).await?;

        if features.is_empty() {
            debug!(%metric, "No new events in any state, reading Datenstand from cumulative query");
            let datenstand = self.cumulative_datenstand(metric).await?;
            features.push(Feature::new(AggregateAttributes::zero(
                metric,
                SYNTHETIC_REGION_ID,
                datenstand,
            )));
        }

        let (features, last_update) = self.ensure_fresh(&url, None, features).await?;
        let data: Vec<DeltaRecord> = features.iter().map(|f| f.attributes.to_delta(metric)).collect();

        Ok(ResponseEnvelope::new(data, last_update))
    }

    /// Daily cases per state, see [`Self::history`].
    pub async fn cases_history(
        &self,
        days: Option<u32>,
        region: Option<RegionId>,
    ) -> Result<ResponseEnvelope<Vec<HistoryRecord>>, FetchError> {
        self.history(Metric::Cases, days, region).await
    }

    /// Daily deaths per state, see [`Self::history`].
    pub async fn deaths_history(
        &self,
        days: Option<u32>,
        region: Option<RegionId>,
    ) -> Result<ResponseEnvelope<Vec<HistoryRecord>>, FetchError> {
        self.history(Metric::Deaths, days, region).await
    }

    /// Daily recoveries per state, see [`Self::history`].
    pub async fn recovered_history(
        &self,
        days: Option<u32>,
        region: Option<RegionId>,
    ) -> Result<ResponseEnvelope<Vec<HistoryRecord>>, FetchError> {
        self.history(Metric::Recovered, days, region).await
    }

    /// Per-state, per-day time series of `metric`, ordered by state then date.
    ///
    /// # Arguments
    ///
    /// * `days` - Only include reports from the last `days` days (0 means all)
    /// * `region` - Only include one state (0 means all)
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        metric: Metric,
        days: Option<u32>,
        region: Option<RegionId>,
    ) -> Result<ResponseEnvelope<Vec<HistoryRecord>>, FetchError> {
        let since = days.filter(|d| *d > 0).map(dates::date_before);
        let region = region.filter(|id| *id > 0);

        let url = rki::history_query(metric, since.as_deref(), region).url(&self.base_url);
        let features: Vec<Feature<AggregateAttributes>> = self.query(&url).await?;

        let (features, last_update) = self.ensure_fresh(&url, region, features).await?;
        let data = features
            .into_iter()
            .map(|feature| history_record(metric, feature.attributes))
            .collect::<Result<Vec<_>, FetchError>>()?;

        Ok(ResponseEnvelope::new(data, last_update))
    }

    /// Case and death counts by state, age band and sex.
    ///
    /// This dataset has no `Datenstand`; `last_update` is the response's
    /// `Last-Modified` header, or the current time when absent.
    #[instrument(skip(self))]
    pub async fn age_groups(&self, region: Option<RegionId>) -> Result<ResponseEnvelope<AgeGroups>, FetchError> {
        let url = rki::age_groups_query().url(&self.base_url);
        let response = self.transport.get(&url).await?;
        let features: Vec<Feature<AgeGroupAttributes>> = arcgis::decode(&response)?;

        let last_update = response
            .last_modified
            .as_deref()
            .and_then(dates::parse_http_date)
            .unwrap_or_else(Utc::now);

        let region = region.filter(|id| *id > 0);
        let mut groups = AgeGroups::new();

        for feature in &features {
            let attributes = &feature.attributes;
            let Some(id) = attributes.state_id() else {
                continue;
            };
            if region.is_some_and(|wanted| wanted != id) {
                continue;
            }
            let Some(abbreviation) = regions::abbreviation(id) else {
                debug!(id, "Skipping age group row for unknown state");
                continue;
            };

            groups
                .entry(abbreviation.to_string())
                .or_default()
                .insert(attributes.age_group.clone(), attributes.to_bucket());
        }

        Ok(ResponseEnvelope::new(groups, last_update))
    }

    /// Fetch `url` from the primary source and decode its features.
    async fn query<A: DeserializeOwned>(&self, url: &str) -> Result<Vec<Feature<A>>, FetchError> {
        debug!(url, "Querying feature service");
        let response = self.transport.get(url).await?;
        let features = arcgis::decode(&response)?;
        debug!(url, features = features.len(), "Feature query complete");
        Ok(features)
    }

    /// The `Datenstand` of the cumulative query for `metric`.
    async fn cumulative_datenstand(&self, metric: Metric) -> Result<dates::RawDate, FetchError> {
        let url = rki::events_query(metric, rki::CUMULATIVE_FLAGS).url(&self.base_url);
        let features: Vec<Feature<AggregateAttributes>> = self.query(&url).await?;

        features
            .into_iter()
            .next()
            .and_then(|f| f.attributes.datenstand)
            .ok_or(FetchError::MissingTimestamp { url })
    }

    /// Apply the freshness policy to a primary result.
    ///
    /// Returns the rows to map and their as-of timestamp. When the primary data
    /// is stale the alternate source is asked exactly once; its rows replace
    /// the primary rows only when it returned at least one.
    async fn ensure_fresh(
        &self,
        url: &str,
        region: Option<RegionId>,
        primary: Vec<Feature<AggregateAttributes>>,
    ) -> Result<(Vec<Feature<AggregateAttributes>>, DateTime<Utc>), FetchError> {
        let as_of = datenstand(&primary, url)?;

        if !self.freshness.is_stale(as_of) {
            return Ok((primary, as_of));
        }

        let region_code = region.map(regions::region_code);
        info!(
            url,
            region_code = region_code.as_deref(),
            as_of = %as_of,
            "Primary data is stale, querying alternate source"
        );

        let response: RawResponse = self.alternate.fetch(url, region_code.as_deref()).await?;
        let alternate: Vec<Feature<AggregateAttributes>> = arcgis::decode(&response)?;

        if alternate.is_empty() {
            warn!(
                url = %response.url,
                "Alternate source returned no features, keeping primary data"
            );
            return Ok((primary, as_of));
        }

        let alternate_as_of = datenstand(&alternate, &response.url)?;
        info!(as_of = %alternate_as_of, features = alternate.len(), "Using alternate source data");
        Ok((alternate, alternate_as_of))
    }
}

/// The parsed `Datenstand` of the first row.
fn datenstand(features: &[Feature<AggregateAttributes>], url: &str) -> Result<DateTime<Utc>, FetchError> {
    let raw = features
        .first()
        .and_then(|f| f.attributes.datenstand.as_ref())
        .ok_or_else(|| FetchError::MissingTimestamp { url: url.to_string() })?;
    dates::parse_date(raw)
}

fn history_record(metric: Metric, attributes: AggregateAttributes) -> Result<HistoryRecord, FetchError> {
    let raw_date = attributes
        .report_date
        .as_ref()
        .ok_or_else(|| FetchError::InvalidAttribute {
            field: "MeldeDatum",
            value: "null".to_string(),
        })?;
    let date = dates::parse_date(raw_date)?;
    let count = attributes.count(metric);

    let name = attributes.region_name.unwrap_or_else(|| {
        regions::by_id(attributes.region_id)
            .map(|r| r.name.to_string())
            .unwrap_or_default()
    });

    Ok(HistoryRecord {
        id: attributes.region_id,
        name,
        metric,
        count,
        date,
    })
}
