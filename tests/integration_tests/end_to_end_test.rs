//! End-to-end worker loop tests
//!
//! Seed → drain → take → fetch → store → submit, with scripted fetchers

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use swarmcrawl::config::CrawlerConfig;
use swarmcrawl::crawler::HttpFetcher;
use swarmcrawl::models::WorkerId;
use swarmcrawl::status::TaskStatus;
use swarmcrawl::storage::{MockPageStore, PageStore, StoredPage, UpsertOutcome};
use swarmcrawl::worker::{TickOutcome, Worker, WorkerSettings};

use super::fixtures::{
    cluster, cluster_on, url, worker, RecordingStore, ScriptedFetcher, SAMPLE_WIKI_HTML,
};

/// Tick until the worker reports idle, returning every outcome
async fn run_until_idle(worker: &Worker) -> Vec<TickOutcome> {
    let mut outcomes = Vec::new();
    for _ in 0..100 {
        let outcome = worker.tick().await.unwrap();
        if outcome.is_idle() {
            return outcomes;
        }
        outcomes.push(outcome);
    }
    panic!("worker never went idle");
}

#[tokio::test]
async fn test_crawl_follows_links_once() {
    for strategy in ["fifo", "priority", "round_robin"] {
        let cluster = cluster(strategy);
        let (a, b, c) = (url("A"), url("B"), url("C"));

        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .page(&a, "page a", &[b.as_str(), c.as_str()])
                .page(&b, "page b", &[a.as_str()])
                .page(&c, "page c", &[]),
        );
        let pages = Arc::new(MockPageStore::new());
        // Round-robin: a single worker only serves its own shard, so use one per shard
        let workers: Vec<Worker> = (0..2)
            .map(|n| worker(cluster.clone(), fetcher.clone(), pages.clone(), n))
            .collect();

        cluster.frontier.submit(&a).await.unwrap();
        loop {
            let mut progressed = false;
            for w in &workers {
                progressed |= !run_until_idle(w).await.is_empty();
            }
            if !progressed {
                break;
            }
        }

        assert_eq!(pages.urls(), vec![a.clone(), b.clone(), c.clone()], "strategy {strategy}");
        assert_eq!(cluster.frontier.dedup().visited_count().await.unwrap(), 3);
        for u in [&a, &b, &c] {
            assert_eq!(
                cluster.status.get_status(u).await.unwrap(),
                Some(TaskStatus::Done)
            );
        }
        assert!(cluster.failures.is_empty().await.unwrap());

        let mut calls = fetcher.calls();
        calls.sort();
        assert_eq!(calls, vec![a, b, c], "each page fetched once ({strategy})");
    }
}

#[tokio::test]
async fn test_timeout_goes_to_failure_queue() {
    let cluster = cluster("fifo");
    let d = url("D");
    let fetcher = Arc::new(ScriptedFetcher::new().timeout(&d));
    let pages = Arc::new(MockPageStore::new());
    let w = worker(cluster.clone(), fetcher, pages.clone(), 1);

    cluster.frontier.submit(&d).await.unwrap();
    let outcome = w.tick().await.unwrap();

    assert!(matches!(outcome, TickOutcome::Failed { ref url, .. } if url == &d));
    assert_eq!(cluster.failures.list_failures().await.unwrap(), vec![d.clone()]);
    assert_eq!(
        cluster.status.get_status(&d).await.unwrap(),
        Some(TaskStatus::Failed)
    );
    assert!(!cluster.frontier.dedup().is_visited(&d).await.unwrap());
    assert!(pages.is_empty());
}

#[tokio::test]
async fn test_http_error_status_is_failure() {
    let cluster = cluster("fifo");
    let gone = url("Removed_Page");
    let fetcher = Arc::new(ScriptedFetcher::new().status(&gone, 503));
    let w = worker(cluster.clone(), fetcher, Arc::new(MockPageStore::new()), 1);

    cluster.frontier.submit(&gone).await.unwrap();
    assert_eq!(w.tick().await.unwrap().label(), "failed");
    assert_eq!(cluster.failures.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_requeued_failure_can_succeed() {
    let cluster = cluster("fifo");
    let d = url("D");
    let flaky = Arc::new(ScriptedFetcher::new().timeout(&d));
    let pages = Arc::new(MockPageStore::new());

    cluster.frontier.submit(&d).await.unwrap();
    worker(cluster.clone(), flaky, pages.clone(), 1)
        .tick()
        .await
        .unwrap();

    let report = cluster.failures.requeue_all(&cluster.frontier).await.unwrap();
    assert_eq!(report.requeued, 1);

    let healthy = Arc::new(ScriptedFetcher::new().page(&d, "page d", &[]));
    let outcome = worker(cluster.clone(), healthy, pages.clone(), 1)
        .tick()
        .await
        .unwrap();
    assert_eq!(outcome.label(), "done");
    assert_eq!(
        cluster.status.get_status(&d).await.unwrap(),
        Some(TaskStatus::Done)
    );
}

#[tokio::test]
async fn test_visited_url_taken_again_is_skipped() {
    let cluster = cluster("fifo");
    let a = url("A");
    let fetcher = Arc::new(ScriptedFetcher::new().page(&a, "page a", &[]));
    let w = worker(cluster.clone(), fetcher.clone(), Arc::new(MockPageStore::new()), 1);

    // A stale second copy sitting behind the first one
    cluster.frontier.submit(&a).await.unwrap();
    cluster
        .store
        .lpush(&cluster.keys.master_queue(), &a)
        .await
        .unwrap();

    assert_eq!(w.tick().await.unwrap().label(), "done");
    assert_eq!(
        w.tick().await.unwrap(),
        TickOutcome::Skipped { url: a.clone() }
    );
    assert_eq!(fetcher.calls(), vec![a]);
}

#[tokio::test]
async fn test_empty_page_is_visited_but_not_stored() {
    let cluster = cluster("fifo");
    let blank = url("Blank");
    let fetcher = Arc::new(ScriptedFetcher::new().page(&blank, "   ", &[]));
    let pages = Arc::new(MockPageStore::new());
    let w = worker(cluster.clone(), fetcher, pages.clone(), 1);

    cluster.frontier.submit(&blank).await.unwrap();
    let outcome = w.tick().await.unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Done {
            url: blank.clone(),
            links_submitted: 0,
            stored: false
        }
    );
    assert!(pages.is_empty());
    assert!(cluster.frontier.dedup().is_visited(&blank).await.unwrap());
}

/// Page store whose writes always fail
struct BrokenPageStore;

#[async_trait]
impl PageStore for BrokenPageStore {
    async fn upsert(&self, _url: &str, _text: &str) -> anyhow::Result<UpsertOutcome> {
        Err(anyhow!("disk full"))
    }

    async fn count(&self) -> anyhow::Result<usize> {
        Ok(0)
    }

    async fn get(&self, _url: &str) -> anyhow::Result<Option<StoredPage>> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_page_store_error_is_task_failure() {
    let cluster = cluster("fifo");
    let a = url("A");
    let fetcher = Arc::new(ScriptedFetcher::new().page(&a, "page a", &[url("B").as_str()]));
    let w = Worker::new(
        WorkerId::new("broken", 1),
        cluster.clone(),
        fetcher,
        Arc::new(BrokenPageStore),
        WorkerSettings::default(),
    );

    cluster.frontier.submit(&a).await.unwrap();
    match w.tick().await.unwrap() {
        TickOutcome::Failed { reason, .. } => assert!(reason.contains("disk full")),
        other => panic!("unexpected outcome {other:?}"),
    }

    assert!(!cluster.frontier.dedup().is_visited(&a).await.unwrap());
    assert_eq!(cluster.failures.list_failures().await.unwrap(), vec![a]);
    // Links of an unstored page are not followed
    assert_eq!(cluster.frontier.pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_interrupted_tick_returns_url() {
    let cluster = cluster("fifo");
    let a = url("A");
    let fetcher = Arc::new(ScriptedFetcher::new().page(&a, "page a", &[]));
    let pages = Arc::new(MockPageStore::new());
    let w = worker(cluster.clone(), fetcher.clone(), pages.clone(), 1);

    cluster.frontier.submit(&a).await.unwrap();
    // The visited set briefly holds a string, so the dispatch-time check fails
    cluster
        .store
        .set_with_ttl(&cluster.keys.visited(), "oops", Duration::from_millis(50))
        .await
        .unwrap();

    assert!(w.tick().await.is_err());
    assert!(cluster.failures.is_empty().await.unwrap());
    assert_eq!(cluster.status.get_status(&a).await.unwrap(), None);
    assert!(fetcher.calls().is_empty());
    assert_eq!(cluster.frontier.pending().await.unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(w.tick().await.unwrap().label(), "done");
    assert_eq!(pages.urls(), vec![a.clone()]);
    assert_eq!(
        cluster.status.get_status(&a).await.unwrap(),
        Some(TaskStatus::Done)
    );
}

#[tokio::test]
async fn test_lost_visited_mark_redoes_crawl() {
    let store = RecordingStore::new();
    let cluster = cluster_on(store.clone(), "fifo");
    let (a, b) = (url("A"), url("B"));
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(&a, "page a", &[b.as_str()])
            .page(&b, "page b", &[]),
    );
    let pages = Arc::new(MockPageStore::new());
    let w = worker(cluster.clone(), fetcher.clone(), pages.clone(), 1);

    cluster.frontier.submit(&a).await.unwrap();
    store.break_writes(&cluster.keys.visited());

    // Page stored and links submitted, but the visited mark is rejected
    assert!(w.tick().await.is_err());
    assert_eq!(pages.urls(), vec![a.clone()]);
    assert!(cluster.failures.is_empty().await.unwrap());
    assert_eq!(cluster.frontier.pending().await.unwrap(), 2);

    store.repair();
    let outcomes = run_until_idle(&w).await;
    assert_eq!(outcomes.len(), 2);

    for u in [&a, &b] {
        assert!(cluster.frontier.dedup().is_visited(u).await.unwrap());
        assert_eq!(
            cluster.status.get_status(u).await.unwrap(),
            Some(TaskStatus::Done)
        );
    }
    assert_eq!(pages.urls(), vec![a, b]);
}

#[tokio::test]
async fn test_worker_writes_legal_status_sequences() {
    let store = RecordingStore::new();
    let cluster = cluster_on(store.clone(), "fifo");
    let (a, d) = (url("A"), url("D"));
    let fetcher = Arc::new(ScriptedFetcher::new().page(&a, "page a", &[]).timeout(&d));
    let w = worker(cluster.clone(), fetcher, Arc::new(MockPageStore::new()), 1);

    cluster.frontier.submit_all([&a, &d]).await.unwrap();
    run_until_idle(&w).await;

    // Requeue the failure and let it fail again; resubmitting A is a no-op
    cluster.failures.requeue_all(&cluster.frontier).await.unwrap();
    assert!(!cluster.frontier.submit(&a).await.unwrap());
    run_until_idle(&w).await;

    let status_key = cluster.keys.url_status();
    let written = |u: &str| -> Vec<TaskStatus> {
        store
            .hash_writes(&status_key, u)
            .iter()
            .map(|s| s.parse().unwrap())
            .collect()
    };

    assert_eq!(written(a.as_str()), vec![TaskStatus::Crawling, TaskStatus::Done]);
    assert_eq!(
        written(d.as_str()),
        vec![
            TaskStatus::Crawling,
            TaskStatus::Failed,
            TaskStatus::Crawling,
            TaskStatus::Failed
        ]
    );

    for u in [&a, &d] {
        let mut previous = None;
        for status in written(u.as_str()) {
            assert!(status.can_follow(previous), "{u}: {previous:?} -> {status}");
            previous = Some(status);
        }
    }
}

#[test]
fn test_http_fetcher_parses_wiki_page() {
    let fetcher = HttpFetcher::new(&CrawlerConfig::default()).unwrap();
    let page = fetcher.parse(SAMPLE_WIKI_HTML).unwrap();

    assert_eq!(
        page.text,
        "Emily is a villager who lives in Pelican Town.\n\
         Birthday: Spring 27\n\
         Loves: Amethyst\n\
         Her sister is Haley.\n\
         External"
    );
    assert_eq!(
        page.links.into_iter().collect::<Vec<_>>(),
        vec![url("Amethyst"), url("Haley")]
    );
}
