//! Control loop behavior against an in-memory store and scripted methods.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use signalmice::config::{AgentConfig, MethodKind};
use signalmice::lifecycle::startup::build_control_loop;
use signalmice::lifecycle::{Shutdown, TerminationSignal};
use signalmice::monitor::{ControlLoop, CycleOutcome};
use signalmice::shutdown::{MethodError, ShutdownAction, ShutdownMethod, ShutdownOrchestrator};
use signalmice::trigger::{MemoryStore, SignalStore, SignalWatcher, StoreError};
use tokio_util::sync::CancellationToken;

mod common;

const KEY: &str = "signalmice:00000000-0000-0000-0000-000000000000";

fn control_loop(
    store: Arc<dyn SignalStore>,
    outcomes: &[bool],
    interval: Duration,
) -> (ControlLoop, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let methods = outcomes
        .iter()
        .enumerate()
        .map(|(i, ok)| {
            let name = format!("method-{i}");
            ShutdownMethod::new(name.clone(), common::ScriptedAction::new(&name, *ok, log.clone()))
        })
        .collect();
    let control = ControlLoop::new(
        SignalWatcher::new(store, KEY),
        ShutdownOrchestrator::new(methods),
        interval,
    );
    (control, log)
}

#[tokio::test(start_paused = true)]
async fn test_first_cycle_runs_before_first_interval() {
    let store = Arc::new(MemoryStore::new());
    let (control, _) = control_loop(store.clone(), &[true], Duration::from_secs(3600));
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(control.run(shutdown.subscribe()));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.reads(), 1);

    shutdown.trigger(TerminationSignal::Terminate);
    let summary = handle.await.unwrap();
    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.signal, Some(TerminationSignal::Terminate));
}

#[tokio::test(start_paused = true)]
async fn test_one_cycle_per_tick() {
    let store = Arc::new(MemoryStore::new());
    let (control, _) = control_loop(store.clone(), &[true], Duration::from_secs(10));
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(control.run(shutdown.subscribe()));

    // Startup cycle plus ticks at 10s and 20s.
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(store.reads(), 3);

    shutdown.trigger(TerminationSignal::Interrupt);
    assert_eq!(handle.await.unwrap().cycles, 3);
}

#[tokio::test(start_paused = true)]
async fn test_termination_while_idle_stops_detection() {
    let store = Arc::new(MemoryStore::new());
    let (control, _) = control_loop(store.clone(), &[true], Duration::from_secs(10));
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(control.run(shutdown.subscribe()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown.trigger(TerminationSignal::Terminate);

    let summary = tokio::time::timeout(Duration::from_millis(1), handle)
        .await
        .expect("loop did not exit promptly")
        .unwrap();
    assert_eq!(summary.cycles, 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(store.reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_key_absent_never_orchestrates() {
    let store = Arc::new(MemoryStore::new());
    let (control, log) = control_loop(store.clone(), &[true], Duration::from_secs(10));
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(control.run(shutdown.subscribe()));

    tokio::time::sleep(Duration::from_secs(35)).await;
    shutdown.trigger(TerminationSignal::Terminate);
    let summary = handle.await.unwrap();

    assert_eq!(summary.cycles, 4);
    assert_eq!(summary.shutdowns_initiated, 0);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(store.deletes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_key_present_orchestrates_exactly_once() {
    let store = Arc::new(MemoryStore::new());
    store.set(KEY, "any payload");
    let (control, log) = control_loop(store.clone(), &[true], Duration::from_secs(10));
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(control.run(shutdown.subscribe()));

    tokio::time::sleep(Duration::from_secs(35)).await;
    shutdown.trigger(TerminationSignal::Terminate);
    let summary = handle.await.unwrap();

    assert!(!store.contains(KEY));
    assert_eq!(summary.shutdowns_initiated, 1);
    assert_eq!(*log.lock().unwrap(), vec!["method-0"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_chain_does_not_stop_loop_or_retry() {
    let store = Arc::new(MemoryStore::new());
    store.set(KEY, "1");
    let (control, log) = control_loop(store.clone(), &[false, false], Duration::from_secs(10));
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(control.run(shutdown.subscribe()));

    tokio::time::sleep(Duration::from_secs(15)).await;
    // A fresh trigger is picked up on the next tick.
    store.set(KEY, "2");
    tokio::time::sleep(Duration::from_secs(10)).await;

    shutdown.trigger(TerminationSignal::Terminate);
    let summary = handle.await.unwrap();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.shutdowns_failed, 2);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["method-0", "method-1", "method-0", "method-1"]
    );
}

/// Store whose reads always fail.
struct UnreachableStore;

impl SignalStore for UnreachableStore {
    fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, StoreError>> {
        async { Err(StoreError::Timeout { op: "GET", secs: 5 }) }.boxed()
    }

    fn delete<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        async { Ok(()) }.boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn test_detection_errors_keep_loop_running() {
    let (control, log) = control_loop(Arc::new(UnreachableStore), &[true], Duration::from_secs(10));
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(control.run(shutdown.subscribe()));

    tokio::time::sleep(Duration::from_secs(25)).await;
    shutdown.trigger(TerminationSignal::Terminate);
    let summary = handle.await.unwrap();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.shutdowns_initiated + summary.shutdowns_failed, 0);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_configured_loop_falls_through_builtin_methods() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AgentConfig::default();
    config.monitor.check_interval_secs = 10;
    config.host.proc_path = dir.path().join("missing").display().to_string();
    config.host.methods = vec![
        MethodKind::Nsenter,
        MethodKind::SysrqTrigger,
        MethodKind::DirectCommand,
    ];

    let store = Arc::new(MemoryStore::new());
    store.set(config.monitor.key.clone(), "1");
    let runner = Arc::new(common::ScriptedRunner::failing(&["nsenter", "poweroff"]));
    let control = build_control_loop(&config, store.clone(), runner.clone());

    let outcome = control.run_cycle().await;

    assert_eq!(
        outcome,
        CycleOutcome::ShutdownInitiated {
            method: "direct-command".to_string()
        }
    );
    assert_eq!(runner.programs(), vec!["nsenter", "poweroff", "shutdown"]);
}

/// Takes five seconds to be accepted, then records that it finished.
struct SlowAction {
    finished: Arc<AtomicBool>,
}

impl ShutdownAction for SlowAction {
    fn attempt<'a>(
        &'a self,
        _ctx: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), MethodError>> {
        async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn test_termination_waits_for_running_shutdown() {
    let store = Arc::new(MemoryStore::new());
    store.set(KEY, "1");
    let finished = Arc::new(AtomicBool::new(false));
    let method = ShutdownMethod::new(
        "slow",
        SlowAction {
            finished: finished.clone(),
        },
    );
    let control = ControlLoop::new(
        SignalWatcher::new(store.clone(), KEY),
        ShutdownOrchestrator::new(vec![method]),
        Duration::from_secs(60),
    );
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(control.run(shutdown.subscribe()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!finished.load(Ordering::SeqCst));
    shutdown.trigger(TerminationSignal::Terminate);

    let summary = handle.await.unwrap();
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.shutdowns_initiated, 1);
    assert_eq!(summary.signal, Some(TerminationSignal::Terminate));
}

#[tokio::test(start_paused = true)]
async fn test_signal_sent_before_run_is_not_lost() {
    let store = Arc::new(MemoryStore::new());
    let (control, _) = control_loop(store.clone(), &[true], Duration::from_secs(10));
    let shutdown = Shutdown::new();
    let termination = shutdown.subscribe();

    shutdown.trigger(TerminationSignal::Interrupt);
    let summary = tokio::time::timeout(Duration::from_secs(1), control.run(termination))
        .await
        .expect("loop ignored a signal delivered before it started");

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.signal, Some(TerminationSignal::Interrupt));
}
