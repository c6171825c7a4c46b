//! End-to-end tests for the fetch-merge pipeline against mock HTTP servers.
//!
//! Each test starts its own `wiremock` server so feeds, failures and delays
//! are isolated. Item dates are generated relative to the run's `now`.

use chrono::{DateTime, Duration, Utc};
use feed_digest::cancel::Cancellation;
use feed_digest::config::{Category, Config};
use feed_digest::digest::{run_all, run_category, MergeOptions, PipelineConfig};
use feed_digest::feed::{FetchConfig, FetchError};
use feed_digest::output::{failure_records, render_atom};
use pretty_assertions::assert_eq;
use std::time::Duration as StdDuration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss(title: &str, items: &[(&str, DateTime<Utc>)]) -> String {
    let items: String = items
        .iter()
        .map(|(link, published)| {
            format!(
                "<item><title>{link}</title><link>{link}</link><pubDate>{}</pubDate></item>",
                published.to_rfc2822()
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>{title}</title>{items}</channel></rss>"#
    )
}

async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/rss+xml"),
        )
        .mount(server)
        .await;
}

fn fast_pipeline(schedule: &str, feed_limit: usize) -> PipelineConfig {
    PipelineConfig {
        fetch: FetchConfig {
            max_tries: 3,
            timeout: StdDuration::from_secs(5),
            initial_backoff: StdDuration::from_millis(10),
            max_concurrency: None,
        },
        merge: MergeOptions {
            schedule: schedule.to_string(),
            feed_limit,
            ..MergeOptions::default()
        },
    }
}

// ============================================================================
// Merge semantics over real fetches
// ============================================================================

#[tokio::test]
async fn test_example_scenario_first_seen_and_window() {
    let server = MockServer::start().await;
    let now = Utc::now();
    let x = "https://example.com/x";
    let y = "https://example.com/y";

    serve(&server, "/a", rss("Feed A", &[(x, now), (y, now - Duration::days(10))])).await;
    serve(&server, "/b", rss("Feed B", &[(x, now)])).await;

    let category = Category {
        kind: "blog".to_string(),
        urls: vec![
            format!("{}/a", server.uri()),
            format!("{}/b", server.uri()),
        ],
    };

    let digest = run_category(
        &reqwest::Client::new(),
        &category,
        now,
        &fast_pipeline("daily", 10),
        &Cancellation::new(),
    )
    .await
    .unwrap();

    assert!(digest.failures.is_empty());
    assert_eq!(digest.feed.items.len(), 1);
    assert_eq!(digest.feed.items[0].link, x);
    assert_eq!(digest.feed.items[0].author, "Feed A");
    assert_eq!(digest.feed.description, "Merged feeds from blog");
}

#[tokio::test]
async fn test_feed_limit_applies_per_source() {
    let server = MockServer::start().await;
    let now = Utc::now();
    let links: Vec<String> = (0..8).map(|i| format!("https://example.com/{i}")).collect();
    let items: Vec<(&str, DateTime<Utc>)> = links.iter().map(|l| (l.as_str(), now)).collect();
    serve(&server, "/many", rss("Many", &items)).await;

    let category = Category {
        kind: "limited".to_string(),
        urls: vec![format!("{}/many", server.uri())],
    };
    let digest = run_category(
        &reqwest::Client::new(),
        &category,
        now,
        &fast_pipeline("weekly", 3),
        &Cancellation::new(),
    )
    .await
    .unwrap();

    let merged: Vec<_> = digest.feed.items.iter().map(|i| i.link.clone()).collect();
    assert_eq!(merged, links[..3].to_vec());
}

// ============================================================================
// Failure tolerance
// ============================================================================

#[tokio::test]
async fn test_partial_failure_still_produces_digest() {
    let server = MockServer::start().await;
    let now = Utc::now();
    serve(&server, "/one", rss("One", &[("https://one.example.com/1", now)])).await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    serve(&server, "/three", rss("Three", &[("https://three.example.com/1", now)])).await;

    let category = Category {
        kind: "mixed".to_string(),
        urls: ["/one", "/two", "/three"]
            .iter()
            .map(|p| format!("{}{}", server.uri(), p))
            .collect(),
    };

    let digest = run_category(
        &reqwest::Client::new(),
        &category,
        now,
        &fast_pipeline("daily", 10),
        &Cancellation::new(),
    )
    .await
    .unwrap();

    let authors: Vec<_> = digest.feed.items.iter().map(|i| i.author.as_str()).collect();
    assert_eq!(authors, vec!["One", "Three"]);
    assert_eq!(digest.failures.len(), 1);
    assert_eq!(digest.failures[0].url, category.urls[1]);
    assert_eq!(digest.failures[0].attempts, 3);
    assert!(matches!(digest.failures[0].cause, FetchError::HttpStatus(503)));
}

#[tokio::test]
async fn test_run_all_keeps_category_order_and_failures() {
    let server = MockServer::start().await;
    let now = Utc::now();
    serve(&server, "/tech", rss("Tech", &[("https://tech.example.com/1", now)])).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let categories = vec![
        Category {
            kind: "tech".to_string(),
            urls: vec![format!("{}/tech", server.uri())],
        },
        Category {
            kind: "dead".to_string(),
            urls: vec![format!("{}/gone", server.uri()), String::new()],
        },
    ];

    let digests = run_all(
        &reqwest::Client::new(),
        &categories,
        now,
        &fast_pipeline("daily", 10),
        &Cancellation::new(),
    )
    .await
    .unwrap();

    assert_eq!(digests.len(), 2);
    assert_eq!(digests[0].feed.kind, "tech");
    assert_eq!(digests[0].feed.items.len(), 1);
    assert_eq!(digests[1].feed.kind, "dead");
    assert!(digests[1].feed.is_empty());

    let records = failure_records(&digests);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].category, "dead");
    assert_eq!(records[0].attempts, 1);
    assert_eq!(records[1].url, "");
    assert_eq!(records[1].attempts, 0);
}

#[tokio::test]
async fn test_deadline_cancels_slow_sources_and_keeps_the_rest() {
    let server = MockServer::start().await;
    let now = Utc::now();
    serve(&server, "/fast", rss("Fast", &[("https://fast.example.com/1", now)])).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss("Slow", &[("https://slow.example.com/1", now)]))
                .set_delay(StdDuration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let category = Category {
        kind: "deadline".to_string(),
        urls: vec![
            format!("{}/slow", server.uri()),
            format!("{}/fast", server.uri()),
        ],
    };
    let mut config = fast_pipeline("daily", 10);
    config.fetch.timeout = StdDuration::from_secs(60);

    let cancel = Cancellation::new();
    let timer = cancel.cancel_after(StdDuration::from_millis(300));

    let digest = tokio::time::timeout(
        StdDuration::from_secs(10),
        run_category(&reqwest::Client::new(), &category, now, &config, &cancel),
    )
    .await
    .expect("cancellation should bound the run")
    .unwrap();
    timer.await.unwrap();

    assert_eq!(digest.feed.items.len(), 1);
    assert_eq!(digest.feed.items[0].author, "Fast");
    assert_eq!(digest.failures.len(), 1);
    assert!(digest.failures[0].is_cancelled());
}

// ============================================================================
// Config to output
// ============================================================================

#[tokio::test]
async fn test_config_driven_run_renders_atom() {
    let server = MockServer::start().await;
    let now = Utc::now();
    serve(
        &server,
        "/feed",
        rss("Config Feed", &[("https://config.example.com/post", now)]),
    )
    .await;

    let toml = format!(
        r#"
[fetch]
max_tries = 1
initial_backoff_ms = 10

[newsletter]
schedule = "weekly"
hide_author_in_title = true

[[categories]]
type = "configured"
urls = ["{}/feed"]
"#,
        server.uri()
    );
    let config = Config::from_toml(&toml).unwrap();

    let digests = run_all(
        &reqwest::Client::new(),
        &config.categories,
        now,
        &config.pipeline_config(),
        &Cancellation::new(),
    )
    .await
    .unwrap();

    let xml = render_atom(&digests[0].feed, config.newsletter.hide_author_in_title).unwrap();
    assert!(xml.contains("<title>configured</title>"));
    assert!(xml.contains("<title>https://config.example.com/post</title>"));
    assert!(xml.contains("<name>Config Feed</name>"));
}
