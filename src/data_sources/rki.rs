//! RKI feature services: query definitions and attribute schemas.
//!
//! Three services are used:
//!
//! - `Coronafälle_in_den_Bundesländern`: one row per state with current totals
//! - `Covid19_hubv`: one row per reported case group, aggregated server-side
//! - `rki_altersgruppen_hubv`: per-state, per-age-band counts and incidences

use serde::Deserialize;

use super::arcgis::{ArcgisQuery, StatisticType};
use crate::dates::RawDate;
use crate::model::{AgeGroupBucket, DeltaRecord, Metric, StateRecord};
use crate::regions::RegionId;

pub const STATES_SERVICE: &str = "Coronafälle_in_den_Bundesländern";
pub const CASES_SERVICE: &str = "Covid19_hubv";
pub const AGE_GROUPS_SERVICE: &str = "rki_altersgruppen_hubv";

/// Flag values selecting events new in the latest report (including corrections).
pub const NEW_EVENT_FLAGS: &str = "1,-1";

/// Flag values selecting every event counted in the latest report.
pub const CUMULATIVE_FLAGS: &str = "1,0";

/// Current totals for every state.
pub fn current_states_query() -> ArcgisQuery {
    ArcgisQuery::new(STATES_SERVICE).out_fields(&[
        "LAN_ew_EWZ",
        "LAN_ew_AGS",
        "Fallzahl",
        "Aktualisierung",
        "Death",
        "cases7_bl",
        "death7_bl",
        "LAN_ew_GEN",
    ])
}

/// Per-state sum of `metric` over rows whose new-event flag is in `flags`.
pub fn events_query(metric: Metric, flags: &str) -> ArcgisQuery {
    ArcgisQuery::new(CASES_SERVICE)
        .filter(format!("{} IN({})", metric.flag_field(), flags))
        .out_fields(&[metric.count_field(), "MeldeDatum", "IdBundesland", "Datenstand"])
        .order_by(&["IdBundesland"])
        .group_by(&["IdBundesland", "Datenstand"])
        .statistic(StatisticType::Sum, metric.count_field(), metric.output_name())
        .statistic(StatisticType::Max, "MeldeDatum", "date")
}

/// Per-state, per-day series of `metric`.
///
/// `since` is a `YYYY-MM-DD` date; only reports on or after it are included.
pub fn history_query(metric: Metric, since: Option<&str>, region: Option<RegionId>) -> ArcgisQuery {
    let mut query = ArcgisQuery::new(CASES_SERVICE).filter(format!(
        "{} IN({})",
        metric.flag_field(),
        metric.history_flags()
    ));

    if let Some(date) = since {
        query = query.filter(format!("MeldeDatum >= TIMESTAMP '{}'", date));
    }
    if let Some(id) = region {
        query = query.filter(format!("IdBundesland = {}", id));
    }

    query
        .out_fields(&[
            metric.count_field(),
            "MeldeDatum",
            "Bundesland",
            "IdBundesland",
            "Datenstand",
        ])
        .order_by(&["IdBundesland", "MeldeDatum"])
        .group_by(&["IdBundesland", "MeldeDatum", "Bundesland", "Datenstand"])
        .statistic(StatisticType::Sum, metric.count_field(), metric.output_name())
}

/// Every age-group row at state level and above.
pub fn age_groups_query() -> ArcgisQuery {
    ArcgisQuery::new(AGE_GROUPS_SERVICE)
        .filter("AdmUnitId<17")
        .out_fields(&["*"])
}

/// A row of [`current_states_query`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateAttributes {
    /// State key as a zero-padded string, e.g. `"01"`.
    #[serde(rename = "LAN_ew_AGS")]
    pub key: String,

    #[serde(rename = "LAN_ew_GEN")]
    pub name: String,

    #[serde(rename = "LAN_ew_EWZ", default)]
    pub population: Option<i64>,

    #[serde(rename = "Fallzahl", default)]
    pub cases: Option<i64>,

    #[serde(rename = "Death", default)]
    pub deaths: Option<i64>,

    #[serde(rename = "cases7_bl", default)]
    pub cases_per_week: Option<i64>,

    #[serde(rename = "death7_bl", default)]
    pub deaths_per_week: Option<i64>,

    /// Epoch milliseconds of the last refresh.
    #[serde(rename = "Aktualisierung")]
    pub updated: RawDate,
}

impl StateAttributes {
    /// The numeric state id encoded in [`Self::key`].
    pub fn region_id(&self) -> Option<RegionId> {
        self.key.trim().parse().ok()
    }

    /// Map to an output record, given the already-validated id.
    pub fn into_record(self, id: RegionId) -> StateRecord {
        StateRecord {
            id,
            name: self.name,
            population: self.population.unwrap_or_default(),
            cases: self.cases.unwrap_or_default(),
            deaths: self.deaths.unwrap_or_default(),
            cases_per_week: self.cases_per_week.unwrap_or_default(),
            deaths_per_week: self.deaths_per_week.unwrap_or_default(),
        }
    }
}

/// A row of [`events_query`] or [`history_query`].
///
/// Only the aggregate named after the queried metric is present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregateAttributes {
    #[serde(rename = "IdBundesland")]
    pub region_id: RegionId,

    #[serde(rename = "Bundesland", default)]
    pub region_name: Option<String>,

    #[serde(rename = "Datenstand", default)]
    pub datenstand: Option<RawDate>,

    #[serde(rename = "MeldeDatum", default)]
    pub report_date: Option<RawDate>,

    #[serde(default)]
    pub cases: Option<i64>,

    #[serde(default)]
    pub deaths: Option<i64>,

    #[serde(default)]
    pub recovered: Option<i64>,
}

impl AggregateAttributes {
    /// A row reporting zero events for `metric` as of `datenstand`.
    pub fn zero(metric: Metric, region_id: RegionId, datenstand: RawDate) -> Self {
        let mut attributes = Self {
            region_id,
            region_name: None,
            datenstand: Some(datenstand),
            report_date: None,
            cases: None,
            deaths: None,
            recovered: None,
        };
        *attributes.count_slot(metric) = Some(0);
        attributes
    }

    fn count_slot(&mut self, metric: Metric) -> &mut Option<i64> {
        match metric {
            Metric::Cases => &mut self.cases,
            Metric::Deaths => &mut self.deaths,
            Metric::Recovered => &mut self.recovered,
        }
    }

    /// The aggregated count for `metric`, zero when absent.
    pub fn count(&self, metric: Metric) -> i64 {
        match metric {
            Metric::Cases => self.cases,
            Metric::Deaths => self.deaths,
            Metric::Recovered => self.recovered,
        }
        .unwrap_or_default()
    }

    /// Map to a delta record for `metric`.
    pub fn to_delta(&self, metric: Metric) -> DeltaRecord {
        DeltaRecord {
            id: self.region_id,
            metric,
            count: self.count(metric),
        }
    }
}

/// A row of [`age_groups_query`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgeGroupAttributes {
    /// Absent (or 0) for the nationwide rows.
    #[serde(rename = "BundeslandId", default)]
    pub region_id: Option<i64>,

    #[serde(rename = "Altersgruppe")]
    pub age_group: String,

    #[serde(rename = "AnzFallM", default)]
    pub cases_male: Option<i64>,
    #[serde(rename = "AnzFallW", default)]
    pub cases_female: Option<i64>,
    #[serde(rename = "AnzTodesfallM", default)]
    pub deaths_male: Option<i64>,
    #[serde(rename = "AnzTodesfallW", default)]
    pub deaths_female: Option<i64>,
    #[serde(rename = "AnzFall100kM", default)]
    pub cases_male_per_100k: Option<f64>,
    #[serde(rename = "AnzFall100kW", default)]
    pub cases_female_per_100k: Option<f64>,
    #[serde(rename = "AnzTodesfall100kM", default)]
    pub deaths_male_per_100k: Option<f64>,
    #[serde(rename = "AnzTodesfall100kW", default)]
    pub deaths_female_per_100k: Option<f64>,
}

impl AgeGroupAttributes {
    /// The state this row belongs to, `None` for nationwide rows.
    pub fn state_id(&self) -> Option<RegionId> {
        self.region_id
            .filter(|id| *id != 0)
            .and_then(|id| RegionId::try_from(id).ok())
    }

    /// Map to an output bucket.
    pub fn to_bucket(&self) -> AgeGroupBucket {
        AgeGroupBucket {
            cases_male: self.cases_male.unwrap_or_default(),
            cases_female: self.cases_female.unwrap_or_default(),
            deaths_male: self.deaths_male.unwrap_or_default(),
            deaths_female: self.deaths_female.unwrap_or_default(),
            cases_male_per_100k: self.cases_male_per_100k.unwrap_or_default(),
            cases_female_per_100k: self.cases_female_per_100k.unwrap_or_default(),
            deaths_male_per_100k: self.deaths_male_per_100k.unwrap_or_default(),
            deaths_female_per_100k: self.deaths_female_per_100k.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_events_query_filter_and_grouping() {
        let query = events_query(Metric::Deaths, NEW_EVENT_FLAGS);
        let url = query.url("https://example.test");

        assert_eq!(query.where_clause(), "NeuerTodesfall IN(1,-1)");
        assert!(url.contains("groupByFieldsForStatistics=IdBundesland%2CDatenstand"));
        assert!(url.contains("orderByFields=IdBundesland&"));
    }

    #[test]
    fn test_history_query_optional_filters() {
        let plain = history_query(Metric::Cases, None, None);
        assert_eq!(plain.where_clause(), "NeuerFall IN(1,0)");

        let narrowed = history_query(Metric::Recovered, Some("2021-04-24"), Some(9));
        assert_eq!(
            narrowed.where_clause(),
            "NeuGenesen IN(1,0,-9) AND MeldeDatum >= TIMESTAMP '2021-04-24' AND IdBundesland = 9"
        );
    }

    #[test]
    fn test_state_attributes_mapping() {
        let attributes: StateAttributes = serde_json::from_value(json!({
            "LAN_ew_AGS": "05",
            "LAN_ew_GEN": "Nordrhein-Westfalen",
            "LAN_ew_EWZ": 17947221,
            "Fallzahl": 800000,
            "Death": 16000,
            "cases7_bl": 20000,
            "death7_bl": 150,
            "Aktualisierung": 1619820000000_i64
        }))
        .unwrap();

        assert_eq!(attributes.region_id(), Some(5));
        let record = attributes.into_record(5);
        assert_eq!(record.name, "Nordrhein-Westfalen");
        assert_eq!(record.population, 17_947_221);
        assert_eq!(record.deaths_per_week, 150);
    }

    #[test]
    fn test_zero_row_only_sets_queried_metric() {
        let row = AggregateAttributes::zero(Metric::Recovered, 1, RawDate::from("01.05.2021, 00:00 Uhr"));

        assert_eq!(row.recovered, Some(0));
        assert_eq!(row.cases, None);
        assert_eq!(row.to_delta(Metric::Recovered).count, 0);
        assert_eq!(row.to_delta(Metric::Recovered).id, 1);
    }

    #[test]
    fn test_age_group_state_id() {
        let mut attributes: AgeGroupAttributes = serde_json::from_value(json!({
            "BundeslandId": 0,
            "Altersgruppe": "A00-A04"
        }))
        .unwrap();
        assert_eq!(attributes.state_id(), None);

        attributes.region_id = Some(12);
        assert_eq!(attributes.state_id(), Some(12));
        assert_eq!(attributes.to_bucket(), AgeGroupBucket::default());
    }
}
