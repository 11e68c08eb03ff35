//! Output records for state statistics.
//!
//! These types are the stable schema handed to callers. Their serialized field
//! names never depend on which provider (primary or alternate) supplied the
//! underlying attributes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::regions::RegionId;

/// Any result payload together with the provider's "as of" timestamp.
///
/// `last_update` is always the data provider's stated currency, never the
/// moment the fetch happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope<T> {
    /// The mapped records.
    pub data: T,

    /// When the provider last computed the dataset.
    pub last_update: DateTime<Utc>,
}

impl<T> ResponseEnvelope<T> {
    /// Wrap `data` with its as-of timestamp.
    pub fn new(data: T, last_update: DateTime<Utc>) -> Self {
        Self { data, last_update }
    }
}

/// The epidemiological quantity a query counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Reported infections.
    Cases,
    /// Reported deaths.
    Deaths,
    /// Estimated recoveries.
    Recovered,
}

impl Metric {
    /// Every metric, in output order.
    pub const ALL: [Metric; 3] = [Metric::Cases, Metric::Deaths, Metric::Recovered];

    /// Name of the aggregated field in output records.
    pub fn output_name(&self) -> &'static str {
        match self {
            Metric::Cases => "cases",
            Metric::Deaths => "deaths",
            Metric::Recovered => "recovered",
        }
    }

    /// Provider attribute holding the per-row count.
    pub fn count_field(&self) -> &'static str {
        match self {
            Metric::Cases => "AnzahlFall",
            Metric::Deaths => "AnzahlTodesfall",
            Metric::Recovered => "AnzahlGenesen",
        }
    }

    /// Provider attribute flagging whether a row is new in the latest report.
    ///
    /// `1`: only in the latest report, `0`: in both, `-1`: only in the previous
    /// one (a correction), `-9`: not applicable.
    pub fn flag_field(&self) -> &'static str {
        match self {
            Metric::Cases => "NeuerFall",
            Metric::Deaths => "NeuerTodesfall",
            Metric::Recovered => "NeuGenesen",
        }
    }

    /// Flag values selecting rows counted in a history time series.
    pub fn history_flags(&self) -> &'static str {
        match self {
            Metric::Cases => "1,0",
            Metric::Deaths | Metric::Recovered => "1,0,-9",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.output_name())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.output_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

/// One federal state's current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    /// Official state key.
    pub id: RegionId,

    /// Display name.
    pub name: String,

    /// Inhabitants.
    pub population: i64,

    /// Cumulative reported cases.
    pub cases: i64,

    /// Cumulative reported deaths.
    pub deaths: i64,

    /// Cases reported over the last seven days.
    pub cases_per_week: i64,

    /// Deaths reported over the last seven days.
    pub deaths_per_week: i64,
}

/// A single metric's count for one state.
///
/// Serializes as `{"id": 1, "<metric>": count}` so the metric name becomes
/// the field name, e.g. `{"id": 1, "deaths": 0}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRecord {
    /// Official state key.
    pub id: RegionId,

    /// Which quantity `count` measures.
    pub metric: Metric,

    /// New events since the last report, or a cumulative total for
    /// [`crate::retriever::StatesRetriever::cumulative_recovered`].
    pub count: i64,
}

impl Serialize for DeltaRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry(self.metric.output_name(), &self.count)?;
        map.end()
    }
}

/// One state's count for one reporting day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    /// Official state key.
    pub id: RegionId,

    /// Display name as reported by the provider.
    pub name: String,

    /// Which quantity `count` measures.
    pub metric: Metric,

    /// Events reported for `date`.
    pub count: i64,

    /// Reporting date (`MeldeDatum`).
    pub date: DateTime<Utc>,
}

impl Serialize for HistoryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry(self.metric.output_name(), &self.count)?;
        map.serialize_entry("date", &self.date)?;
        map.end()
    }
}

/// Per-sex counts and incidences for one state and one age band.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeGroupBucket {
    pub cases_male: i64,
    pub cases_female: i64,
    pub deaths_male: i64,
    pub deaths_female: i64,
    pub cases_male_per_100k: f64,
    pub cases_female_per_100k: f64,
    pub deaths_male_per_100k: f64,
    pub deaths_female_per_100k: f64,
}

/// State abbreviation → age band (e.g. `"A35-A59"`) → bucket.
pub type AgeGroups = BTreeMap<String, BTreeMap<String, AgeGroupBucket>>;
