//! Visualization service client tests against a stubbed HTTP service.

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use history_lens::config::VizConfig;
use history_lens::models::{Dataset, HistoryRecord};
use history_lens::viz;

fn test_config(base_url: &str) -> VizConfig {
    VizConfig {
        provider: "lida".to_string(),
        base_url: base_url.to_string(),
        api_key: Some("sk-test".to_string()),
        library: "seaborn".to_string(),
        goal_count: 1,
        chart_count: 2,
        temperature: 0.2,
        max_retries: 2,
        timeout_secs: 5,
    }
}

fn test_dataset() -> Dataset {
    let records = vec![
        HistoryRecord::new("GMAIL - Inbox".into(), "https://mail.google.com/".into(), None),
        HistoryRecord::new("New Tab".into(), "chrome://newtab".into(), None),
        HistoryRecord::new("Netflix - Watch".into(), "https://netflix.com/".into(), None),
    ];
    Dataset::new("history", records, b"source")
}

#[tokio::test]
async fn test_summarize_sends_csv_and_credential() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/summarize"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "name": "history",
            "format": "csv",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "summary": {"name": "history", "fields": ["title", "url", "time", "category"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let provider = viz::create_provider(&config).unwrap();

    let summary = viz::summarize_dataset(provider.as_ref(), &config, &test_dataset())
        .await
        .unwrap();
    assert_eq!(summary.0["name"], "history");

    // The dataset travels as CSV with the unclassified sentinel in place.
    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let data = body["data"].as_str().unwrap();
    assert!(data.starts_with("title,url,time,category\n"));
    assert!(data.contains("New Tab,chrome://newtab,,unclassified"));
    assert!(data.contains("Netflix - Watch,https://netflix.com/,,Entertainment"));
}

#[tokio::test]
async fn test_goals_roundtrip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/goals"))
        .and(body_partial_json(serde_json::json!({"n": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "goals": [
                {"question": "How do categories split?", "visualization": "bar chart"},
                {"question": "When are visits concentrated?"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let provider = viz::create_provider(&config).unwrap();
    let summary = viz::DataSummary(serde_json::json!({"name": "history"}));

    let goals = viz::generate_goals(provider.as_ref(), &config, &summary, 2)
        .await
        .unwrap();
    assert_eq!(goals.len(), 2);
    assert_eq!(goals[0].question, "How do categories split?");
    assert_eq!(goals[0].visualization.as_deref(), Some("bar chart"));
}

#[tokio::test]
async fn test_charts_roundtrip_and_raster_decode() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/visualize"))
        .and(body_partial_json(serde_json::json!({
            "goal": "Visits per category",
            "library": "seaborn",
            "n": 2,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "charts": [
                {"code": "sns.countplot(...)", "raster": "aGVsbG8="},
                {"code": "sns.lineplot(...)"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let provider = viz::create_provider(&config).unwrap();
    let summary = viz::DataSummary(serde_json::json!({"name": "history"}));

    let charts = viz::generate_charts(provider.as_ref(), &config, &summary, "Visits per category")
        .await
        .unwrap();
    assert_eq!(charts.len(), 2);
    assert_eq!(charts[0].library, "seaborn");
    assert_eq!(charts[0].decode_raster().unwrap().unwrap(), b"hello");
    assert!(charts[1].decode_raster().unwrap().is_none());
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;

    // First attempt fails with 500, retry succeeds.
    Mock::given(method("POST"))
        .and(path("/goals"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/goals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "goals": ["What changed week over week?"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let provider = viz::create_provider(&config).unwrap();
    let summary = viz::DataSummary(serde_json::json!({}));

    let goals = viz::generate_goals(provider.as_ref(), &config, &summary, 1)
        .await
        .unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].question, "What changed week over week?");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/goals"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("bad summary"),
        )
        .expect(1) // exactly one request — no retries on 4xx
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let provider = viz::create_provider(&config).unwrap();
    let summary = viz::DataSummary(serde_json::json!({}));

    let err = viz::generate_goals(provider.as_ref(), &config, &summary, 1)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("400"));
}

#[tokio::test]
async fn test_retries_exhausted_reports_last_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/summarize"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3) // initial attempt + max_retries (2)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let provider = viz::create_provider(&config).unwrap();

    let err = viz::summarize_dataset(provider.as_ref(), &config, &test_dataset())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"), "err: {}", err);
}

#[tokio::test]
async fn test_disabled_provider_refuses_calls() {
    let config = VizConfig::default();
    let provider = viz::create_provider(&config).unwrap();
    let summary = viz::DataSummary(serde_json::json!({}));

    let err = viz::generate_goals(provider.as_ref(), &config, &summary, 1)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("disabled"));
}

#[tokio::test]
async fn test_malformed_service_response_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/visualize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "charts": [{"raster": "aGVsbG8="}]
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let provider = viz::create_provider(&config).unwrap();
    let summary = viz::DataSummary(serde_json::json!({}));

    let err = viz::generate_charts(provider.as_ref(), &config, &summary, "anything")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing code"));
}
