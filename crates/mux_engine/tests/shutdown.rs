use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mux_core::ShutdownState;
use mux_engine::{DrainOutcome, ShutdownCoordinator};

#[tokio::test]
async fn idle_shutdown_drains_immediately() {
    let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
    assert_eq!(coordinator.state(), ShutdownState::Running);

    let outcome = coordinator.shutdown().await;

    assert_eq!(outcome, DrainOutcome::Drained);
    assert_eq!(coordinator.state(), ShutdownState::Stopped);
    assert!(coordinator.draining_signal().is_cancelled());
    assert!(!coordinator.force_signal().is_cancelled());
}

#[tokio::test]
async fn in_flight_work_finishes_inside_grace() {
    let coordinator = ShutdownCoordinator::new(Duration::from_secs(2));
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    coordinator.spawn_tracked(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        flag.store(true, Ordering::SeqCst);
    });
    assert_eq!(coordinator.in_flight(), 1);

    let outcome = coordinator.shutdown().await;

    assert_eq!(outcome, DrainOutcome::Drained);
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(coordinator.in_flight(), 0);
}

#[tokio::test]
async fn slow_work_is_forced_after_grace() {
    let coordinator = ShutdownCoordinator::new(Duration::from_millis(200));
    let fast_done = Arc::new(AtomicBool::new(false));
    let slow_forced = Arc::new(AtomicBool::new(false));

    let flag = fast_done.clone();
    coordinator.spawn_tracked(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        flag.store(true, Ordering::SeqCst);
    });
    let force = coordinator.force_signal();
    let flag = slow_forced.clone();
    let slow = coordinator.spawn_tracked(async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(30)) => {}
            _ = force.cancelled() => flag.store(true, Ordering::SeqCst),
        }
    });

    let started = Instant::now();
    let outcome = coordinator.shutdown().await;

    assert_eq!(outcome, DrainOutcome::DeadlineElapsed { abandoned: 1 });
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(fast_done.load(Ordering::SeqCst));
    assert_eq!(coordinator.state(), ShutdownState::Stopped);
    assert!(coordinator.force_signal().is_cancelled());

    slow.await.unwrap();
    assert!(slow_forced.load(Ordering::SeqCst));
}

#[tokio::test]
async fn concurrent_shutdowns_share_one_drain() {
    let coordinator = ShutdownCoordinator::new(Duration::from_secs(2));
    coordinator.spawn_tracked(tokio::time::sleep(Duration::from_millis(200)));

    let started = Instant::now();
    let (first, second) = tokio::join!(coordinator.shutdown(), coordinator.shutdown());

    assert_eq!(first, DrainOutcome::Drained);
    assert_eq!(second, DrainOutcome::Drained);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(coordinator.state(), ShutdownState::Stopped);
}

#[tokio::test]
async fn second_caller_waits_on_the_same_deadline() {
    let coordinator = ShutdownCoordinator::new(Duration::from_millis(600));
    let force = coordinator.force_signal();
    coordinator.spawn_tracked(async move { force.cancelled().await });

    let leader = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.shutdown().await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(coordinator.state(), ShutdownState::Draining);

    let started = Instant::now();
    let follower = coordinator.shutdown().await;
    let waited = started.elapsed();

    assert_eq!(follower, DrainOutcome::DeadlineElapsed { abandoned: 1 });
    assert_eq!(leader.await.unwrap(), follower);
    // The follower did not restart the 600ms grace.
    assert!(waited < Duration::from_millis(550), "waited {waited:?}");
}

#[tokio::test]
async fn shutdown_after_stop_returns_recorded_outcome() {
    let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
    assert_eq!(coordinator.shutdown().await, DrainOutcome::Drained);
    assert_eq!(coordinator.shutdown().await, DrainOutcome::Drained);
    assert_eq!(coordinator.stopped().await, DrainOutcome::Drained);
}

#[tokio::test]
async fn dropping_the_first_caller_does_not_stall_the_drain() {
    let coordinator = ShutdownCoordinator::new(Duration::from_millis(200));
    coordinator.spawn_tracked(std::future::pending::<()>());

    // The first caller gives up long before the grace period ends.
    let abandoned = tokio::time::timeout(Duration::from_millis(20), coordinator.shutdown()).await;
    assert!(abandoned.is_err());
    assert_eq!(coordinator.state(), ShutdownState::Draining);

    let outcome = tokio::time::timeout(Duration::from_secs(2), coordinator.shutdown())
        .await
        .expect("drain reaches Stopped without the first caller");

    assert_eq!(outcome, DrainOutcome::DeadlineElapsed { abandoned: 1 });
    assert_eq!(coordinator.state(), ShutdownState::Stopped);
    assert!(coordinator.force_signal().is_cancelled());
}
