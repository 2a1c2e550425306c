use chrono::{DateTime, Duration as TimeDelta, Utc};
use std::time::Duration;
use stream_metrics::export::{CSV_HEADER, file_name, to_csv};
use stream_metrics::{
    AcquisitionChain, Granularity, MetricsRecord, PlatformConfig, RefreshOutcome, Session,
    StreamKey,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> reqwest::Client {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    reqwest::Client::builder()
        .build()
        .expect("Failed to create HTTP client")
}

fn config_for(base: &str) -> PlatformConfig {
    PlatformConfig {
        host: "platform.example".to_string(),
        api_base_url: format!("{base}/v1"),
        page_base_url: base.to_string(),
        ..Default::default()
    }
}

fn at(ts: &str) -> DateTime<Utc> {
    ts.parse().unwrap()
}

fn assert_usable(record: &MetricsRecord) {
    assert!(!record.streamer_name.is_empty());
    // Counters are unsigned; synthetic and scraped values alike start above zero here.
    assert!(record.likes > 0 && record.viewers > 0);
}

#[tokio::test]
async fn test_scraped_page_flows_into_series_and_export() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let page = r#"<html><head><title>Alice - Platform</title></head><body><script>
        window.__INITIAL_STATE__ = {"room": {"streamer": {"name": "Alice"},
            "stats": {"likeCount": 120, "viewerCount": 30, "commentCount": 15, "giftCount": 2}}};
        </script></body></html>"#;
    Mock::given(method("GET"))
        .and(path("/alice/stream42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let config = config_for(&server.uri());
    let chain = AcquisitionChain::new(&config, client());
    let key = config
        .stream_key_parser()
        .parse("https://platform.example/alice/stream42");
    assert_eq!(key.as_str(), "alice/stream42");

    let mut session = Session::new(Duration::from_secs(60));
    session.track(key.clone());

    let start = at("2024-05-01T10:00:10Z");
    for minute in 0..3 {
        let now = start + TimeDelta::minutes(minute);
        assert!(session.is_due(now));
        let outcome = session.refresh_at(&chain, now).await;
        let RefreshOutcome::Updated(record) = outcome else {
            panic!("expected a record, got {outcome:?}");
        };
        assert_eq!(record.streamer_name, "Alice");
        assert_eq!(
            (record.likes, record.viewers, record.comments, record.gifts),
            (120, 30, 15, 2)
        );
        assert_eq!(record.engagement_rate(), 450.0);
    }

    let series = session.series().expect("series for tracked stream");
    assert_eq!(series.len(), 3);
    assert_eq!(series.aggregate(Granularity::Minute).len(), 3);
    assert_eq!(series.aggregate(Granularity::Hour).len(), 1);
    assert_eq!(series.growth_rates().likes, 0.0);

    let csv = to_csv(series.records());
    assert!(csv.starts_with(CSV_HEADER));
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.contains("2024-05-01T10:02:10.000Z,alice/stream42,Alice,120,30,15,2"));
    assert_eq!(
        file_name(&key, at("2024-05-01T10:03:00Z")),
        "stream_alice_stream42_20240501_1003.csv"
    );
}

#[tokio::test]
async fn test_unreachable_platform_always_yields_a_record() {
    let config = config_for("http://127.0.0.1:9");
    let chain = AcquisitionChain::new(&config, client());

    for input in ["alice/stream42", "bob", "https://platform.example/carol/x"] {
        let key = config.stream_key_parser().parse(input);
        let record = chain
            .acquire_record(&key)
            .await
            .expect("non-empty key yields a record");
        assert_usable(&record);
    }

    assert!(chain.acquire_record(&StreamKey::from("")).await.is_none());
}

#[tokio::test]
async fn test_synthetic_series_never_decreases() {
    let chain = AcquisitionChain::new(&config_for("http://127.0.0.1:9"), client());
    let mut session = Session::new(Duration::from_secs(10));
    session.track(StreamKey::from("dana/s1"));

    let start = at("2024-05-01T10:00:00Z");
    for i in 0..3 {
        session
            .refresh_at(&chain, start + TimeDelta::seconds(10 * i))
            .await;
    }

    let series = session.series().expect("series for tracked stream");
    for delta in series.deltas() {
        assert!(delta.likes >= 0 && delta.viewers >= 0);
        assert!(delta.comments >= 0 && delta.gifts >= 0);
    }
    let summary = series.summary().expect("summary of non-empty series");
    assert_eq!(summary.duration_minutes, 20.0 / 60.0);
}
