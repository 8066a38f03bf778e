//! Distribution strategy integration tests

use std::collections::HashSet;

use super::fixtures::{cluster, cluster_on, distribution, url};
use swarmcrawl::distribution::{shard_for, DistributionPolicy, MachinePartition, Strategy};
use swarmcrawl::models::WorkerId;
use swarmcrawl::store::{create_memory_store, Keyspace};

#[tokio::test]
async fn test_priority_order_across_drain() {
    let cluster = cluster("priority");
    let worker = WorkerId::new("w", 1);

    // Submitted lowest priority first
    for page in ["Crops", "Emily", "User_talk:Lewis"] {
        cluster.frontier.submit(&url(page)).await.unwrap();
    }
    cluster.frontier.drain_all().await.unwrap();

    let mut order = Vec::new();
    while let Some(u) = cluster.frontier.take(&worker).await.unwrap() {
        order.push(u);
    }
    assert_eq!(
        order,
        vec![url("User_talk:Lewis"), url("Emily"), url("Crops")]
    );
}

#[tokio::test]
async fn test_machine_partition_splits_bands() {
    let store = create_memory_store();
    let keys = Keyspace::default();
    let rules = match Strategy::from_config(&distribution("priority")).unwrap() {
        Strategy::Priority { rules, .. } => rules,
        other => panic!("unexpected strategy {}", other.name()),
    };

    let policy_for = |index| {
        DistributionPolicy::new(
            store.clone(),
            keys.clone(),
            Strategy::Priority {
                rules: rules.clone(),
                partition: MachinePartition::new(2, index, 4).unwrap(),
            },
        )
    };
    let upper_scores = policy_for(0);
    let lower_scores = policy_for(1);
    let worker = WorkerId::new("w", 1);

    upper_scores.route(&url("User_talk:A")).await.unwrap();
    upper_scores.route(&url("Crops")).await.unwrap();

    // Machine 0 serves scores >= 4, machine 1 serves scores < 4
    assert_eq!(upper_scores.take(&worker).await.unwrap(), Some(url("Crops")));
    assert_eq!(upper_scores.take(&worker).await.unwrap(), None);
    assert_eq!(lower_scores.take(&worker).await.unwrap(), Some(url("User_talk:A")));
}

#[tokio::test]
async fn test_concurrent_priority_takes_have_one_winner() {
    let store = create_memory_store();
    let cluster = cluster_on(store.clone(), "priority");
    let urls: Vec<String> = (0..30).map(|i| url(&format!("Fish_{i}"))).collect();
    cluster.frontier.submit_all(&urls).await.unwrap();
    cluster.frontier.drain_all().await.unwrap();

    let mut handles = Vec::new();
    for n in 0..4u64 {
        let cluster = cluster_on(store.clone(), "priority");
        handles.push(tokio::spawn(async move {
            let worker = WorkerId::new(format!("w{n}"), n);
            let mut mine = Vec::new();
            while let Some(u) = cluster.frontier.take(&worker).await.unwrap() {
                mine.push(u);
                tokio::task::yield_now().await;
            }
            mine
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let unique: HashSet<_> = all.iter().cloned().collect();
    assert_eq!(all.len(), unique.len(), "a URL was taken twice");
    assert_eq!(unique.len(), urls.len());
}

#[tokio::test]
async fn test_round_robin_matches_shard_function() {
    let cluster = cluster("round_robin");
    let pages: Vec<String> = (0..20).map(|i| url(&format!("Villager_{i}"))).collect();
    cluster.frontier.submit_all(&pages).await.unwrap();
    cluster.frontier.drain_all().await.unwrap();

    for shard in 0..2u32 {
        let worker = WorkerId::new(format!("w{shard}"), u64::from(shard));
        while let Some(u) = cluster.frontier.take(&worker).await.unwrap() {
            assert_eq!(shard_for(&u, 2), shard);
        }
    }
}

#[tokio::test]
async fn test_ready_depth_reports_each_queue() {
    let cluster = cluster("round_robin");
    cluster.frontier.submit(&url("A")).await.unwrap();
    cluster.frontier.drain_all().await.unwrap();

    let depths = cluster.frontier.policy().ready_depth().await.unwrap();
    let names: Vec<_> = depths.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["url_queue_round_robin:0", "url_queue_round_robin:1"]);
    assert_eq!(depths.iter().map(|d| d.depth).sum::<usize>(), 1);
}
