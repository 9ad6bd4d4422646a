//! Integration test: key routing across cluster flavors.
//!
//! Ring routing must be deterministic and move few keys on growth; sticky
//! routing must keep affinity while a backend is healthy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ringlet_cluster::{ActorConfig, Cluster, ModuloCluster, RingCluster, StickyCluster};
use ringlet_integration_tests::{MockDialer, addresses, wait_for};
use ringlet_sharding::{KetamaSharding, ShardServer, Sharding};

fn sample_keys(n: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| format!("key:{}", rng.random_range(0..u64::MAX)))
        .collect()
}

async fn ring_with(dialer: &Arc<MockDialer>, addrs: &[String]) -> RingCluster {
    let ring = RingCluster::new(dialer.clone());
    for addr in addrs {
        ring.add(addr, "").await.unwrap();
    }
    ring
}

fn owners(ring: &RingCluster, keys: &[String]) -> HashMap<String, String> {
    keys.iter()
        .map(|k| (k.clone(), ring.get(k).unwrap().address().to_string()))
        .collect()
}

/// Growing a ring from 4 to 5 servers moves roughly a fifth of the keys,
/// and every moved key lands on the new server.
#[tokio::test]
async fn test_ring_growth_moves_few_keys() {
    let dialer = MockDialer::new();
    let addrs = addresses(5);
    let keys = sample_keys(10_000, 7);

    let ring = ring_with(&dialer, &addrs[..4]).await;
    let before = owners(&ring, &keys);
    ring.add(&addrs[4], "").await.unwrap();
    let after = owners(&ring, &keys);

    let moved: Vec<&String> = keys.iter().filter(|k| before[*k] != after[*k]).collect();
    let ratio = moved.len() as f64 / keys.len() as f64;
    assert!(
        (0.1..0.3).contains(&ratio),
        "expected about 1/5 of keys to move, got {ratio:.3}"
    );
    for key in moved {
        assert_eq!(after[key], addrs[4], "{key} moved between old servers");
    }
}

/// Shrinking the ring only moves keys owned by the removed server.
#[tokio::test]
async fn test_ring_removal_moves_only_orphaned_keys() {
    let dialer = MockDialer::new();
    let addrs = addresses(4);
    let keys = sample_keys(5_000, 11);

    let ring = ring_with(&dialer, &addrs).await;
    let before = owners(&ring, &keys);
    ring.del(&addrs[1]).await.unwrap();
    let after = owners(&ring, &keys);

    for key in &keys {
        if before[key] != addrs[1] {
            assert_eq!(before[key], after[key], "{key} moved without cause");
        } else {
            assert_ne!(after[key], addrs[1]);
        }
    }
    assert_eq!(dialer.latest(&addrs[1]).unwrap().close_count(), 1);
}

/// Two independently built rings agree on every key.
#[tokio::test]
async fn test_ring_routing_is_reproducible() {
    let keys = sample_keys(1_000, 3);
    let addrs = addresses(3);

    let first = ring_with(&MockDialer::new(), &addrs).await;
    let second = ring_with(&MockDialer::new(), &addrs).await;

    assert_eq!(owners(&first, &keys), owners(&second, &keys));
}

/// The cluster ring and a bare sharding table agree on placement.
#[tokio::test]
async fn test_ring_cluster_matches_sharding() {
    let addrs = addresses(3);
    let keys = sample_keys(500, 5);
    let ring = ring_with(&MockDialer::new(), &addrs).await;
    let table = KetamaSharding::new(addrs.iter().map(ShardServer::new).collect());

    for key in &keys {
        let (index, server) = table.shard_server(key).unwrap();
        assert_eq!(ring.locate(key), Some((index, server.address.clone())));
    }
}

/// Weights skew the ring in proportion.
#[test]
fn test_weighted_ring_distribution() {
    let table = KetamaSharding::new(vec![
        ShardServer::weighted("10.0.0.1:11211", 3),
        ShardServer::weighted("10.0.0.2:11211", 1),
    ]);
    let keys = sample_keys(20_000, 13);
    let heavy = keys
        .iter()
        .filter(|k| table.shard_index(k) == Some(0))
        .count();
    let share = heavy as f64 / keys.len() as f64;
    assert!((0.6..0.9).contains(&share), "heavy share {share:.3}");
}

/// Modulo routing keeps its placement as long as nothing is appended.
#[tokio::test]
async fn test_modulo_cluster_is_stable() {
    let dialer = MockDialer::new();
    let modulo = ModuloCluster::new(dialer.clone());
    for addr in addresses(3) {
        modulo.add(&addr, "").await.unwrap();
    }
    let keys = sample_keys(200, 17);

    let first: Vec<String> = keys
        .iter()
        .map(|k| modulo.get(k).unwrap().address().to_string())
        .collect();
    modulo.del("10.0.0.1:11211").await.unwrap();
    let second: Vec<String> = keys
        .iter()
        .map(|k| modulo.get(k).unwrap().address().to_string())
        .collect();

    assert_eq!(first, second);
}

/// Sticky routing keeps each key on its connector until that backend
/// fails, then moves it and sticks again.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn test_sticky_affinity_survives_until_failure() {
    let dialer = MockDialer::new();
    let sticky = StickyCluster::start(dialer.clone(), ActorConfig::test_config());
    let addrs = addresses(3);
    for addr in &addrs {
        sticky.add(addr, "").await.unwrap();
    }
    wait_for(Duration::from_secs(5), || async {
        sticky.all_conns().len() == 3
    })
    .await;

    let keys = sample_keys(30, 19);
    let pinned: HashMap<String, String> = keys
        .iter()
        .map(|k| (k.clone(), sticky.get(k).unwrap().address().to_string()))
        .collect();
    for _ in 0..5 {
        for key in &keys {
            assert_eq!(sticky.get(key).unwrap().address(), pinned[key]);
        }
    }

    // Take one backend down for good.
    let victim = &addrs[0];
    dialer.kill(victim);
    dialer.latest(victim).unwrap().set_ready(false);

    for key in &keys {
        let conn = sticky.get(key).unwrap();
        assert_ne!(conn.address(), victim);
        if pinned[key] != *victim {
            assert_eq!(conn.address(), pinned[key], "healthy affinity must hold");
        }
    }

    sticky.stop();
    sticky.pool().join().await;
}
