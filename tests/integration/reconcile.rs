//! Integration test: static reconciliation over live clusters.
//!
//! A `StaticList` drives a round-robin pool or a ring; the routable set
//! must converge to the desired list without touching unchanged servers.

use std::sync::Arc;
use std::time::Duration;

use ringlet_cluster::{Cluster, RingCluster, StaticList};
use ringlet_integration_tests::{MockDialer, routed_addresses, start_pool, wait_for};

const A: &str = "10.0.0.1:11211";
const B: &str = "10.0.0.2:11211";
const C: &str = "10.0.0.3:11211";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn test_update_converges_round_robin_pool() {
    let dialer = MockDialer::new();
    let pool = Arc::new(start_pool(&dialer));
    let list = StaticList::new(&[A, B], pool.clone()).await.unwrap();
    wait_for(Duration::from_secs(5), || async {
        pool.all_conns().len() == 2
    })
    .await;
    let b_before = dialer.latest(B).unwrap();

    let summary = list.update(&[B, C]).await;
    assert_eq!(
        summary,
        format!("delete address [{A}], add address [{C}]")
    );

    wait_for(Duration::from_secs(5), || async {
        routed_addresses(&pool.all_conns()) == vec![B.to_string(), C.to_string()]
    })
    .await;

    assert_eq!(dialer.latest(A).unwrap().close_count(), 1);
    assert_eq!(dialer.dialed(B).len(), 1, "B must not be redialed");
    assert_eq!(b_before.close_count(), 0);
    assert_eq!(list.tracked().await, vec![B, C]);

    pool.stop();
    pool.join().await;
}

#[tokio::test]
async fn test_update_converges_ring() {
    let dialer = MockDialer::new();
    let ring = Arc::new(RingCluster::new(dialer.clone()));
    let list = StaticList::new(&[A, B], ring.clone()).await.unwrap();

    list.update(&[B, C]).await;

    assert_eq!(
        routed_addresses(&ring.all_conns()),
        vec![B.to_string(), C.to_string()]
    );
    assert_eq!(dialer.latest(A).unwrap().close_count(), 1);
    assert_eq!(ring.point_count(), 320);
}

#[tokio::test]
async fn test_repeated_update_is_idempotent() {
    let dialer = MockDialer::new();
    let ring = Arc::new(RingCluster::new(dialer.clone()));
    let list = StaticList::new(&[A], ring.clone()).await.unwrap();

    list.update(&[A, B, C]).await;
    let summary = list.update(&[C, B, A]).await;

    assert_eq!(summary, "delete address [], add address []");
    assert_eq!(dialer.all_dialed().len(), 3);
}

#[tokio::test]
async fn test_update_retries_unreachable_server() {
    let dialer = MockDialer::new();
    let ring = Arc::new(RingCluster::new(dialer.clone()));
    let list = StaticList::new(&[A], ring.clone()).await.unwrap();

    dialer.kill(B);
    list.update(&[A, B]).await;
    assert_eq!(list.tracked().await, vec![A]);

    dialer.revive(B);
    let summary = list.update(&[A, B]).await;
    assert_eq!(summary, format!("delete address [], add address [{B}]"));
    assert_eq!(routed_addresses(&ring.all_conns()), vec![A, B]);
}
