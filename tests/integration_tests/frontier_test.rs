//! Frontier integration tests
//!
//! Dedup at every gate, one queued copy per URL and no silent loss while
//! draining

use super::fixtures::{cluster, url};
use swarmcrawl::models::WorkerId;

#[tokio::test]
async fn test_visited_url_is_never_enqueued() {
    for strategy in ["fifo", "priority", "round_robin"] {
        let cluster = cluster(strategy);
        let done = url("Emily");
        cluster.frontier.dedup().mark_visited(&done).await.unwrap();

        assert!(!cluster.frontier.submit(&done).await.unwrap());
        cluster.frontier.drain_all().await.unwrap();

        let total: usize = cluster
            .frontier
            .policy()
            .ready_depth()
            .await
            .unwrap()
            .iter()
            .map(|q| q.depth)
            .sum();
        assert_eq!(total, 0, "strategy {strategy}");
        assert_eq!(cluster.frontier.pending().await.unwrap(), 0);
    }
}

#[tokio::test]
async fn test_drain_loses_nothing() {
    for strategy in ["priority", "round_robin"] {
        let cluster = cluster(strategy);
        let urls: Vec<String> = (0..50).map(|i| url(&format!("Page_{i}"))).collect();
        assert_eq!(cluster.frontier.submit_all(&urls).await.unwrap(), 50);

        assert_eq!(cluster.frontier.drain_all().await.unwrap(), 50);
        assert_eq!(cluster.frontier.pending().await.unwrap(), 0);

        let ready: usize = cluster
            .frontier
            .policy()
            .ready_depth()
            .await
            .unwrap()
            .iter()
            .map(|q| q.depth)
            .sum();
        assert_eq!(ready, 50, "strategy {strategy}");
    }
}

#[tokio::test]
async fn test_every_routed_url_is_taken_exactly_once() {
    let cluster = cluster("round_robin");
    let urls: Vec<String> = (0..40).map(|i| url(&format!("Item_{i}"))).collect();
    cluster.frontier.submit_all(&urls).await.unwrap();
    cluster.frontier.drain_all().await.unwrap();

    // One worker per shard
    let workers = [WorkerId::new("w0", 0), WorkerId::new("w1", 1)];
    let mut taken = Vec::new();
    for worker in &workers {
        while let Some(url) = cluster.frontier.take(worker).await.unwrap() {
            taken.push(url);
        }
    }

    taken.sort();
    let mut expected = urls.clone();
    expected.sort();
    assert_eq!(taken, expected);
}

#[tokio::test]
async fn test_repeated_submit_queues_url_once() {
    for strategy in ["fifo", "priority", "round_robin"] {
        let cluster = cluster(strategy);
        let page = url("Parsnip");

        assert!(cluster.frontier.submit(&page).await.unwrap());
        assert!(!cluster.frontier.submit(&page).await.unwrap());
        assert!(!cluster.frontier.submit(&page).await.unwrap());
        cluster.frontier.drain_all().await.unwrap();

        let ready: usize = cluster
            .frontier
            .policy()
            .ready_depth()
            .await
            .unwrap()
            .iter()
            .map(|q| q.depth)
            .sum();
        assert_eq!(ready, 1, "strategy {strategy}");
    }
}

#[tokio::test]
async fn test_taken_url_can_be_submitted_again() {
    let cluster = cluster("fifo");
    let page = url("D");
    let worker = WorkerId::new("w", 1);

    cluster.frontier.submit(&page).await.unwrap();
    assert_eq!(cluster.frontier.take(&worker).await.unwrap(), Some(page.clone()));

    // Still unvisited (for example after a failure), so it may come back once
    assert!(cluster.frontier.submit(&page).await.unwrap());
    assert!(!cluster.frontier.submit(&page).await.unwrap());
    assert_eq!(cluster.frontier.pending().await.unwrap(), 1);
}
