//! Export catalogue client against a mock products endpoint

use distribute_engine::catalogue::{ExportCatalogueClient, ExportProducts};
use distribute_engine::config::ExportApiSettings;
use distribute_engine::error::DistributeError;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, max_retries: u32) -> ExportCatalogueClient {
    ExportCatalogueClient::new(&ExportApiSettings {
        host: server.uri(),
        timeout_secs: 5,
        max_retries,
        backoff_ms: 1,
    })
    .unwrap()
}

fn products_document() -> serde_json::Value {
    json!({
        "gebieden": {
            "buurten": {
                "csv_actueel": ["gebieden/CSV_Actueel/GBD_buurt.csv"],
                "shape": ["gebieden/SHP/GBD_buurt.shp", "gebieden/SHP/GBD_buurt.dbf"]
            }
        },
        "meetbouten": {}
    })
}

#[tokio::test]
async fn test_get_products_for_catalogue() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_document()))
        .expect(1)
        .mount(&server)
        .await;

    let products = client(&server, 3).get_products("gebieden").await.unwrap();

    let buurten = &products["buurten"];
    assert_eq!(buurten["csv_actueel"], vec!["gebieden/CSV_Actueel/GBD_buurt.csv"]);
    assert_eq!(buurten["shape"].len(), 2);
}

#[tokio::test]
async fn test_unknown_catalogue_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_document()))
        .mount(&server)
        .await;

    let products = client(&server, 3).get_products("nap").await.unwrap();
    assert!(products.is_empty());
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 3).get_products("gebieden").await.unwrap_err();

    assert!(matches!(err, DistributeError::RemoteService(ref msg) if msg.contains("404")));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_unavailable_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_document()))
        .expect(1)
        .mount(&server)
        .await;

    let products = client(&server, 3).get_products("gebieden").await.unwrap();
    assert!(products.contains_key("buurten"));
}

#[tokio::test]
async fn test_retries_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let err = client(&server, 2).get_products("gebieden").await.unwrap_err();

    match err {
        DistributeError::RemoteService(msg) => assert!(msg.contains("after 2 attempts"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_malformed_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server, 3).get_products("gebieden").await.unwrap_err();
    assert!(matches!(err, DistributeError::RemoteService(_)));
}
