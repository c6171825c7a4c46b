use crate::cancel::Cancellation;
use crate::feed::fetcher::{fetch_feed, FetchConfig, FetchError};
use crate::feed::types::{FetchFailure, FetchResult, SourceFeed};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Fetches every URL of a category concurrently and partitions the outcomes.
///
/// Spawns one task per URL. With `config.max_concurrency` set, a semaphore
/// bounds how many of those tasks fetch at once; otherwise all run together.
///
/// # Returns
///
/// `(successes, failures)`, both in the order of `urls`, regardless of the
/// order in which fetches completed. Every URL appears in exactly one of the
/// two vectors. All URLs failing is not an error.
///
/// # Behavior
///
/// - Waits for every task before returning
/// - A panicking task becomes a [`FetchError::TaskFailed`] failure for its URL
/// - Dropping the returned future aborts all outstanding tasks; tasks also
///   observe `cancel` and stop retrying once it fires
pub async fn fetch_all(
    client: &reqwest::Client,
    urls: &[String],
    config: &FetchConfig,
    cancel: &Cancellation,
) -> (Vec<SourceFeed>, Vec<FetchFailure>) {
    if urls.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let limiter = config
        .max_concurrency
        .map(|permits| Arc::new(Semaphore::new(permits.max(1))));

    let mut tasks = JoinSet::new();
    let mut task_index = HashMap::with_capacity(urls.len());

    for (index, url) in urls.iter().enumerate() {
        let client = client.clone();
        let url = url.clone();
        let config = config.clone();
        let cancel = cancel.clone();
        let limiter = limiter.clone();

        let handle = tasks.spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return (index, Err(FetchFailure::new(&url, FetchError::Cancelled, 0)));
                        }
                        permit = semaphore.acquire_owned() => permit.ok(),
                    }
                }
                None => None,
            };
            (index, fetch_feed(&client, &url, &config, &cancel).await)
        });
        task_index.insert(handle.id(), index);
    }

    let mut slots: Vec<Option<FetchResult>> = (0..urls.len()).map(|_| None).collect();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(join_err) => {
                let Some(&index) = task_index.get(&join_err.id()) else {
                    tracing::error!(error = %join_err, "Fetch task failed with unknown id");
                    continue;
                };
                tracing::error!(url = %urls[index], error = %join_err, "Fetch task panicked");
                slots[index] = Some(Err(FetchFailure::new(
                    &urls[index],
                    FetchError::TaskFailed(join_err.to_string()),
                    0,
                )));
            }
        }
    }

    let mut feeds = Vec::new();
    let mut failures = Vec::new();
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(Ok(feed)) => feeds.push(feed),
            Some(Err(failure)) => failures.push(failure),
            None => failures.push(FetchFailure::new(
                &urls[index],
                FetchError::TaskFailed("task did not report a result".to_string()),
                0,
            )),
        }
    }

    tracing::debug!(
        total = urls.len(),
        fetched = feeds.len(),
        failed = failures.len(),
        "Batch fetch complete"
    );

    (feeds, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss(title: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>{title}</title>
    <item><title>Item</title><link>https://example.com/{title}</link></item>
</channel></rss>"#
        )
    }

    fn fast_config() -> FetchConfig {
        FetchConfig {
            max_tries: 2,
            timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(10),
            max_concurrency: None,
        }
    }

    async fn mount_feed(server: &MockServer, route: &str, title: &str, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss(title))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_empty_url_list() {
        let client = reqwest::Client::new();
        let (feeds, failures) =
            fetch_all(&client, &[], &fast_config(), &Cancellation::new()).await;
        assert!(feeds.is_empty());
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_tolerated() {
        let server = MockServer::start().await;
        mount_feed(&server, "/a", "a", Duration::ZERO).await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_feed(&server, "/c", "c", Duration::ZERO).await;

        let urls: Vec<String> = ["/a", "/b", "/c"]
            .iter()
            .map(|p| format!("{}{}", server.uri(), p))
            .collect();
        let client = reqwest::Client::new();

        let (feeds, failures) =
            fetch_all(&client, &urls, &fast_config(), &Cancellation::new()).await;

        assert_eq!(feeds.len(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].url, urls[1]);
        assert_eq!(failures[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_results_follow_url_order_not_completion_order() {
        let server = MockServer::start().await;
        mount_feed(&server, "/slow", "slow", Duration::from_millis(300)).await;
        mount_feed(&server, "/fast", "fast", Duration::ZERO).await;

        let urls = vec![
            format!("{}/slow", server.uri()),
            format!("{}/fast", server.uri()),
        ];
        let client = reqwest::Client::new();

        let (feeds, failures) =
            fetch_all(&client, &urls, &fast_config(), &Cancellation::new()).await;

        assert!(failures.is_empty());
        let titles: Vec<_> = feeds.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_all_failures_is_not_an_error() {
        let client = reqwest::Client::new();
        let urls = vec![String::new(), "ftp://example.com/feed".to_string()];

        let (feeds, failures) =
            fetch_all(&client, &urls, &fast_config(), &Cancellation::new()).await;

        assert!(feeds.is_empty());
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].url, "");
        assert_eq!(failures[1].url, "ftp://example.com/feed");
    }

    #[tokio::test]
    async fn test_bounded_concurrency_fetches_everything() {
        let server = MockServer::start().await;
        for i in 0..6 {
            mount_feed(
                &server,
                &format!("/f{i}"),
                &format!("f{i}"),
                Duration::from_millis(20),
            )
            .await;
        }
        let urls: Vec<String> = (0..6).map(|i| format!("{}/f{i}", server.uri())).collect();
        let config = FetchConfig {
            max_concurrency: Some(2),
            ..fast_config()
        };
        let client = reqwest::Client::new();

        let (feeds, failures) = fetch_all(&client, &urls, &config, &Cancellation::new()).await;

        assert!(failures.is_empty());
        let titles: Vec<_> = feeds.iter().map(|f| f.title.clone()).collect();
        let expected: Vec<_> = (0..6).map(|i| format!("f{i}")).collect();
        assert_eq!(titles, expected);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_collected_successes() {
        let server = MockServer::start().await;
        mount_feed(&server, "/quick", "quick", Duration::ZERO).await;
        mount_feed(&server, "/stuck", "stuck", Duration::from_secs(30)).await;

        let urls = vec![
            format!("{}/quick", server.uri()),
            format!("{}/stuck", server.uri()),
        ];
        let config = FetchConfig {
            timeout: Duration::from_secs(60),
            ..fast_config()
        };
        let client = reqwest::Client::new();
        let cancel = Cancellation::new();
        let timer = cancel.cancel_after(Duration::from_millis(300));

        let (feeds, failures) = tokio::time::timeout(
            Duration::from_secs(10),
            fetch_all(&client, &urls, &config, &cancel),
        )
        .await
        .expect("cancellation should end the batch");
        timer.await.unwrap();

        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title, "quick");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_releases_tasks_waiting_for_a_permit() {
        let server = MockServer::start().await;
        for i in 0..4 {
            mount_feed(
                &server,
                &format!("/s{i}"),
                &format!("s{i}"),
                Duration::from_secs(30),
            )
            .await;
        }
        let urls: Vec<String> = (0..4).map(|i| format!("{}/s{i}", server.uri())).collect();
        let config = FetchConfig {
            timeout: Duration::from_secs(60),
            max_concurrency: Some(1),
            ..fast_config()
        };
        let client = reqwest::Client::new();
        let cancel = Cancellation::new();
        let timer = cancel.cancel_after(Duration::from_millis(200));

        let (feeds, failures) = tokio::time::timeout(
            Duration::from_secs(10),
            fetch_all(&client, &urls, &config, &cancel),
        )
        .await
        .expect("queued tasks should not wait for a permit after cancellation");
        timer.await.unwrap();

        assert!(feeds.is_empty());
        assert!(failures.iter().all(|f| f.is_cancelled()));
        let failed_urls: Vec<_> = failures.iter().map(|f| f.url.clone()).collect();
        assert_eq!(failed_urls, urls);
        // Only the permit holder got as far as sending a request
        let attempts: Vec<_> = failures.iter().map(|f| f.attempts).collect();
        assert_eq!(attempts, vec![1, 0, 0, 0]);
    }
}
