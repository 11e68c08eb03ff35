//! ArcGIS FeatureServer query client primitives.
//!
//! Builds `/FeatureServer/0/query` URLs with filter, grouping and
//! `outStatistics` aggregation parameters, and decodes the JSON documents the
//! service returns.
//!
//! # Response shapes
//!
//! A query answers either `{"error": {...}}` or `{"features": [{"attributes": {...}}]}`,
//! usually with HTTP 200 in both cases. [`QueryResponse`] makes that
//! distinction explicit right after the call so nothing downstream inspects
//! untyped fields.
//!
//! # API Reference
//!
//! See: <https://developers.arcgis.com/rest/services-reference/enterprise/query-feature-service-layer/>

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::transport::RawResponse;
use crate::error::FetchError;

/// Public root of the RKI feature services.
pub const DEFAULT_BASE_URL: &str = "https://services7.arcgis.com/mOBPykOjAyBO2ZKk/arcgis/rest/services";

/// Aggregation applied by an `outStatistics` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticType {
    Sum,
    Max,
    Min,
    Count,
    Avg,
}

/// One `outStatistics` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutStatistic {
    /// Aggregation function.
    pub statistic_type: StatisticType,

    /// Source attribute.
    pub on_statistic_field: String,

    /// Name of the aggregated attribute in the response.
    pub out_statistic_field_name: String,
}

/// A read-only query against layer 0 of a feature service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcgisQuery {
    service: String,
    filters: Vec<String>,
    out_fields: Vec<String>,
    order_by: Vec<String>,
    group_by: Vec<String>,
    out_statistics: Vec<OutStatistic>,
}

impl ArcgisQuery {
    /// Start a query against the named feature service.
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            filters: Vec::new(),
            out_fields: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            out_statistics: Vec::new(),
        }
    }

    /// Add a clause to the `where` predicate. Clauses are joined with `AND`.
    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        self.filters.push(clause.into());
        self
    }

    /// Set the requested output fields.
    pub fn out_fields(mut self, fields: &[&str]) -> Self {
        self.out_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Set the ordering fields.
    pub fn order_by(mut self, fields: &[&str]) -> Self {
        self.order_by = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Set the fields statistics are grouped by.
    pub fn group_by(mut self, fields: &[&str]) -> Self {
        self.group_by = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Add an aggregation over `field`, returned as `out_name`.
    pub fn statistic(mut self, statistic_type: StatisticType, field: &str, out_name: &str) -> Self {
        self.out_statistics.push(OutStatistic {
            statistic_type,
            on_statistic_field: field.to_string(),
            out_statistic_field_name: out_name.to_string(),
        });
        self
    }

    /// The `where` predicate, `1=1` when unfiltered.
    pub fn where_clause(&self) -> String {
        if self.filters.is_empty() {
            "1=1".to_string()
        } else {
            self.filters.join(" AND ")
        }
    }

    /// Full request URL below `base_url`.
    pub fn url(&self, base_url: &str) -> String {
        let mut params: Vec<(&str, String)> = vec![("where", self.where_clause())];

        if self.out_fields.is_empty() {
            params.push(("outFields", "*".to_string()));
        } else {
            params.push(("outFields", self.out_fields.join(",")));
        }
        if !self.order_by.is_empty() {
            params.push(("orderByFields", self.order_by.join(",")));
        }
        if !self.group_by.is_empty() {
            params.push(("groupByFieldsForStatistics", self.group_by.join(",")));
        }
        if !self.out_statistics.is_empty() {
            // A Vec of plain structs always serializes.
            let json = serde_json::to_string(&self.out_statistics).unwrap_or_default();
            params.push(("outStatistics", json));
        }
        params.push(("returnGeometry", "false".to_string()));
        params.push(("f", "json".to_string()));

        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!(
            "{}/{}/FeatureServer/0/query?{}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(&self.service),
            query
        )
    }
}

/// A single feature row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature<A> {
    pub attributes: A,
}

impl<A> Feature<A> {
    /// Wrap attributes as a feature.
    pub fn new(attributes: A) -> Self {
        Self { attributes }
    }
}

/// A decoded feature-query document.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse<A> {
    /// The query ran; `features` may legitimately be empty.
    Success(Vec<Feature<A>>),
    /// The service returned a structured error object.
    ProviderError(serde_json::Value),
}

#[derive(Deserialize)]
struct FeatureSet<A> {
    #[serde(default = "Vec::new")]
    features: Vec<Feature<A>>,
}

impl<A: DeserializeOwned> QueryResponse<A> {
    /// Decode a response body.
    ///
    /// A non-null `error` member wins over anything else in the document.
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        let mut value: serde_json::Value = serde_json::from_str(body)?;

        if let Some(error) = value.get_mut("error") {
            if !error.is_null() {
                return Ok(QueryResponse::ProviderError(error.take()));
            }
        }

        let set: FeatureSet<A> = serde_json::from_value(value)?;
        Ok(QueryResponse::Success(set.features))
    }
}

/// Decode `response` into its features, mapping every failure shape to a [`FetchError`].
pub fn decode<A: DeserializeOwned>(response: &RawResponse) -> Result<Vec<Feature<A>>, FetchError> {
    let success = (200..300).contains(&response.status);

    match QueryResponse::<A>::from_body(&response.body) {
        Ok(QueryResponse::ProviderError(payload)) => Err(FetchError::Provider {
            payload,
            url: response.url.clone(),
        }),
        Ok(QueryResponse::Success(features)) if success => Ok(features),
        Ok(QueryResponse::Success(_)) => Err(FetchError::Status {
            url: response.url.clone(),
            status: response.status,
        }),
        Err(_) if !success => Err(FetchError::Status {
            url: response.url.clone(),
            status: response.status,
        }),
        Err(source) => Err(FetchError::Decode {
            url: response.url.clone(),
            source,
        }),
    }
}
