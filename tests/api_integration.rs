//! Integration tests for the rki-states API endpoints.
//!
//! These tests verify the full request/response cycle through the HTTP API,
//! with the feature services replaced by canned responses.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use rki_states::api::{AppState, router};
use rki_states::data_sources::rki;
use rki_states::data_sources::{RawResponse, StaticTransport};
use rki_states::dates;
use rki_states::model::Metric;
use rki_states::retriever::StatesRetriever;

const BASE: &str = "https://services.test/arcgis/rest/services";

fn create_test_server(transport: StaticTransport) -> (TestServer, Arc<StaticTransport>) {
    let transport = Arc::new(transport);
    let retriever = StatesRetriever::new(transport.clone()).with_base_url(BASE);
    let app = router(AppState { retriever });

    (TestServer::new(app).unwrap(), transport)
}

fn history_rows(metric: Metric) -> Value {
    let row = |id: u8, name: &str, day: i64, count: i64| {
        let mut attributes = json!({
            "IdBundesland": id,
            "Bundesland": name,
            "Datenstand": "01.05.2021, 00:00 Uhr",
            "MeldeDatum": day
        });
        attributes[metric.output_name()] = json!(count);
        json!({ "attributes": attributes })
    };

    json!({"features": [
        row(9, "Bayern", 1619654400000, 2100),
        row(9, "Bayern", 1619740800000, 1800),
    ]})
}

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _) = create_test_server(StaticTransport::new());

    let response = server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_get_states() {
    let transport = StaticTransport::new().with_json(
        rki::current_states_query().url(BASE),
        json!({"features": [{"attributes": {
            "LAN_ew_AGS": "09",
            "LAN_ew_GEN": "Bayern",
            "LAN_ew_EWZ": 13140183,
            "Fallzahl": 600000,
            "Death": 14000,
            "cases7_bl": 18000,
            "death7_bl": 120,
            "Aktualisierung": 1619820000000_i64
        }}]}),
    );
    let (server, _) = create_test_server(transport);

    let response = server.get("/states").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"][0]["id"], 9);
    assert_eq!(body["data"][0]["casesPerWeek"], 18000);
    assert_eq!(body["lastUpdate"], "2021-04-30T23:00:00Z");
}

#[tokio::test]
async fn test_get_new_deaths() {
    let transport = StaticTransport::new().with_json(
        rki::events_query(Metric::Deaths, rki::NEW_EVENT_FLAGS).url(BASE),
        json!({"features": [
            {"attributes": {"IdBundesland": 1, "Datenstand": "01.05.2021, 00:00 Uhr", "deaths": 3}},
            {"attributes": {"IdBundesland": 2, "Datenstand": "01.05.2021, 00:00 Uhr", "deaths": 0}}
        ]}),
    );
    let (server, _) = create_test_server(transport);

    let response = server.get("/states/new/deaths").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"], json!([{"id": 1, "deaths": 3}, {"id": 2, "deaths": 0}]));
    assert_eq!(body["lastUpdate"], "2021-05-01T00:00:00Z");
}

#[tokio::test]
async fn test_new_events_without_any_uses_zero_record() {
    let transport = StaticTransport::new()
        .with_json(
            rki::events_query(Metric::Recovered, rki::NEW_EVENT_FLAGS).url(BASE),
            json!({"features": []}),
        )
        .with_json(
            rki::events_query(Metric::Recovered, rki::CUMULATIVE_FLAGS).url(BASE),
            json!({"features": [
                {"attributes": {"IdBundesland": 1, "Datenstand": "01.05.2021, 00:00 Uhr", "recovered": 50000}}
            ]}),
        );
    let (server, transport) = create_test_server(transport);

    let response = server.get("/states/new/recovered").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"], json!([{"id": 1, "recovered": 0}]));
    assert_eq!(body["lastUpdate"], "2021-05-01T00:00:00Z");
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_unknown_metric_is_bad_request() {
    let (server, transport) = create_test_server(StaticTransport::new());

    let response = server.get("/states/new/vaccinations").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_get_recovered() {
    let transport = StaticTransport::new().with_json(
        rki::events_query(Metric::Recovered, rki::CUMULATIVE_FLAGS).url(BASE),
        json!({"features": [
            {"attributes": {"IdBundesland": 4, "Datenstand": "01.05.2021, 00:00 Uhr", "recovered": 21000}}
        ]}),
    );
    let (server, _) = create_test_server(transport);

    let response = server.get("/states/recovered").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"], json!([{"id": 4, "recovered": 21000}]));
}

#[tokio::test]
async fn test_get_history_for_one_region_by_abbreviation() {
    let transport = StaticTransport::new().with_json(
        rki::history_query(Metric::Cases, None, Some(9)).url(BASE),
        history_rows(Metric::Cases),
    );
    let (server, _) = create_test_server(transport);

    let response = server.get("/states/history/cases").add_query_param("id", "BY").await;

    response.assert_status_ok();
    let body: Value = response.json();
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["name"], "Bayern");
    assert_eq!(data[0]["cases"], 2100);
    assert_eq!(data[1]["date"], "2021-04-30T00:00:00Z");
}

#[tokio::test]
async fn test_get_history_with_days() {
    let since = dates::date_before(7);
    let transport = StaticTransport::new().with_json(
        rki::history_query(Metric::Deaths, Some(&since), None).url(BASE),
        history_rows(Metric::Deaths),
    );
    let (server, _) = create_test_server(transport);

    let response = server.get("/states/history/deaths/7").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"][1]["deaths"], 1800);
}

#[tokio::test]
async fn test_unknown_region_is_not_found() {
    let (server, transport) = create_test_server(StaticTransport::new());

    let response = server.get("/states/history/cases").add_query_param("id", "17").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_get_age_groups_for_one_region() {
    let transport = StaticTransport::new().with_response(RawResponse {
        url: rki::age_groups_query().url(BASE),
        status: 200,
        last_modified: Some("Sat, 01 May 2021 08:00:00 GMT".to_string()),
        body: json!({"features": [
            {"attributes": {"BundeslandId": 0, "Altersgruppe": "A00-A04", "AnzFallM": 99}},
            {"attributes": {"BundeslandId": 3, "Altersgruppe": "A00-A04", "AnzFallM": 4000, "AnzFallW": 3800}},
            {"attributes": {"BundeslandId": 3, "Altersgruppe": "A80+", "AnzTodesfallW": 900}},
            {"attributes": {"BundeslandId": 4, "Altersgruppe": "A00-A04", "AnzFallM": 700}}
        ]})
        .to_string(),
    });
    let (server, _) = create_test_server(transport);

    let response = server.get("/states/age-groups").add_query_param("id", "ni").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["lastUpdate"], "2021-05-01T08:00:00Z");
    assert_eq!(body["data"].as_object().unwrap().len(), 1);
    assert_eq!(body["data"]["NI"]["A00-A04"]["casesFemale"], 3800);
    assert_eq!(body["data"]["NI"]["A80+"]["deathsFemale"], 900);
}

#[tokio::test]
async fn test_provider_error_is_bad_gateway() {
    let transport = StaticTransport::new().with_json(
        rki::current_states_query().url(BASE),
        json!({"error": {"code": 400, "message": "Invalid or missing input parameters."}}),
    );
    let (server, _) = create_test_server(transport);

    let response = server.get("/states").await;

    response.assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_upstream_not_found_is_bad_gateway() {
    let (server, _) = create_test_server(StaticTransport::new());

    let response = server.get("/states/new/cases").await;

    response.assert_status(StatusCode::BAD_GATEWAY);
}
