//! Remote data sources for state-level COVID-19 statistics.
//!
//! # Modules
//!
//! - [`arcgis`]: FeatureServer query builder and response decoding
//! - [`rki`]: the RKI services' queries and attribute schemas
//! - [`transport`]: the HTTP seam every request goes through
//! - [`fallback`]: staleness policy and the alternate data source
//!
//! All data is aggregate, state-level statistics.

pub mod arcgis;
pub mod fallback;
pub mod rki;
pub mod transport;

pub use arcgis::{ArcgisQuery, DEFAULT_BASE_URL, Feature, QueryResponse};
pub use fallback::{AlternateSource, DailyCutoff, FreshnessPolicy, MirrorSource, NeverStale, NoAlternate};
pub use transport::{HttpTransport, RawResponse, StaticTransport, Transport};
