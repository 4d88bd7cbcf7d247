use super::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
struct ScoreChanged {
    score: u32,
}

impl Event for ScoreChanged {}

#[derive(Debug)]
struct LevelLoaded;

impl Event for LevelLoaded {}

fn recorder(log: &Arc<Mutex<Vec<usize>>>, id: usize) -> EventHandler<ScoreChanged> {
    let log = log.clone();
    EventHandler::new(move |_: &ScoreChanged| {
        log.lock().push(id);
        Ok(())
    })
}

#[test]
fn test_publish_without_subscribers() {
    let bus = EventBus::new();
    bus.publish(ScoreChanged { score: 1 });
    assert_eq!(bus.subscriber_count::<ScoreChanged>(), 0);
}

#[test]
fn test_publish_in_subscription_order() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for id in 0..4 {
        bus.subscribe(recorder(&log, id));
    }

    bus.publish(ScoreChanged { score: 10 });
    assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
}

#[test]
fn test_handler_receives_payload() {
    let bus = EventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let sink = seen.clone();
    bus.subscribe_fn(move |event: &ScoreChanged| {
        sink.store(event.score as usize, Ordering::SeqCst);
        Ok(())
    });

    bus.publish(ScoreChanged { score: 42 });
    assert_eq!(seen.load(Ordering::SeqCst), 42);
}

#[test]
fn test_failing_handlers_do_not_stop_delivery() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    bus.subscribe(recorder(&log, 0));
    bus.subscribe_fn(|_: &ScoreChanged| Err(HandlerError::custom("rejected")));
    bus.subscribe_fn(|_: &ScoreChanged| -> Result<(), HandlerError> { panic!("handler blew up") });
    bus.subscribe(recorder(&log, 3));

    bus.publish(ScoreChanged { score: 1 });
    assert_eq!(*log.lock(), vec![0, 3]);
}

#[test]
fn test_events_are_keyed_by_type() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe(recorder(&log, 0));

    bus.publish(LevelLoaded);
    assert!(log.lock().is_empty());
    assert_eq!(bus.subscriber_count::<LevelLoaded>(), 0);
}

#[test]
fn test_unsubscribe_removes_exactly_one() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = recorder(&log, 0);
    let second = recorder(&log, 1);
    let third = recorder(&log, 2);
    bus.subscribe(first.clone());
    bus.subscribe(second.clone());
    bus.subscribe(third.clone());

    bus.unsubscribe(&second);
    assert_eq!(bus.subscriber_count::<ScoreChanged>(), 2);

    bus.publish(ScoreChanged { score: 0 });
    assert_eq!(*log.lock(), vec![0, 2]);
}

#[test]
fn test_unsubscribe_missing_is_noop() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.unsubscribe(&recorder(&log, 0));

    bus.subscribe(recorder(&log, 1));
    bus.unsubscribe(&recorder(&log, 1));
    assert_eq!(bus.subscriber_count::<ScoreChanged>(), 1);
}

#[test]
fn test_duplicate_subscriptions_invoked_twice() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let handler = recorder(&log, 7);
    bus.subscribe(handler.clone());
    bus.subscribe(handler.clone());

    bus.publish(ScoreChanged { score: 0 });
    assert_eq!(*log.lock(), vec![7, 7]);

    bus.unsubscribe(&handler);
    log.lock().clear();
    bus.publish(ScoreChanged { score: 0 });
    assert_eq!(*log.lock(), vec![7]);

    bus.unsubscribe(&handler);
    assert_eq!(bus.subscriber_count::<ScoreChanged>(), 0);
}

#[test]
fn test_handler_ptr_eq() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let a = recorder(&log, 0);
    let b = recorder(&log, 0);
    assert!(a.ptr_eq(&a.clone()));
    assert!(!a.ptr_eq(&b));
}

#[test]
fn test_publish_inline_when_host_not_running() {
    let dispatcher = MainThreadDispatcher::new();
    let bus = EventBus::with_dispatcher(dispatcher.clone());
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe(recorder(&log, 0));

    bus.publish(ScoreChanged { score: 0 });
    assert_eq!(*log.lock(), vec![0]);
    assert_eq!(dispatcher.pending(), 0);
}

#[test]
fn test_publish_marshalled_when_host_running() {
    let dispatcher = MainThreadDispatcher::new();
    dispatcher.set_host_running(true);
    let bus = EventBus::with_dispatcher(dispatcher.clone());
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe(recorder(&log, 0));
    bus.subscribe(recorder(&log, 1));

    bus.publish(ScoreChanged { score: 0 });
    assert!(log.lock().is_empty());
    assert_eq!(dispatcher.pending(), 1);

    dispatcher.drain();
    assert_eq!(*log.lock(), vec![0, 1]);
}

#[test]
fn test_marshalled_delivery_uses_snapshot() {
    let dispatcher = MainThreadDispatcher::new();
    dispatcher.set_host_running(true);
    let bus = EventBus::with_dispatcher(dispatcher.clone());
    let log = Arc::new(Mutex::new(Vec::new()));
    let handler = recorder(&log, 0);
    bus.subscribe(handler.clone());

    bus.publish(ScoreChanged { score: 0 });
    bus.unsubscribe(&handler);
    dispatcher.drain();

    assert_eq!(*log.lock(), vec![0]);
}

#[test]
fn test_with_parallelism_clamps_to_one() {
    let bus = EventBus::new().with_parallelism(0);
    assert_eq!(bus.parallelism(), 1);
    assert!(EventBus::new().parallelism() >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publish_async_reaches_every_handler() {
    let bus = EventBus::new().with_parallelism(4);
    let calls = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let calls = calls.clone();
        bus.subscribe_fn(move |_: &ScoreChanged| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    bus.publish_async(ScoreChanged { score: 1 }, &CancellationToken::new())
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publish_async_contains_failures() {
    let bus = EventBus::new();
    let calls = Arc::new(AtomicUsize::new(0));

    bus.subscribe_fn(|_: &ScoreChanged| Err(HandlerError::custom("nope")));
    bus.subscribe_fn(|_: &ScoreChanged| -> Result<(), HandlerError> { panic!("fan-out panic") });
    let counter = calls.clone();
    bus.subscribe_fn(move |_: &ScoreChanged| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    bus.publish_async(ScoreChanged { score: 1 }, &CancellationToken::new())
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publish_async_respects_parallelism_bound() {
    let bus = EventBus::new().with_parallelism(2);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for _ in 0..6 {
        let active = active.clone();
        let peak = peak.clone();
        bus.subscribe_fn(move |_: &ScoreChanged| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });
    }

    bus.publish_async(ScoreChanged { score: 1 }, &CancellationToken::new())
        .await;
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_publish_async_precancelled_skips_handlers() {
    let bus = EventBus::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    bus.subscribe_fn(move |_: &ScoreChanged| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let cancel = CancellationToken::new();
    cancel.cancel();
    bus.publish_async(ScoreChanged { score: 1 }, &cancel).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publish_async_cancel_stops_further_dispatch() {
    let bus = Arc::new(EventBus::new().with_parallelism(1));
    let calls = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();

    for _ in 0..5 {
        let calls = calls.clone();
        let cancel = cancel.clone();
        bus.subscribe_fn(move |_: &ScoreChanged| {
            calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            Ok(())
        });
    }

    tokio::time::timeout(
        Duration::from_secs(5),
        bus.publish_async(ScoreChanged { score: 1 }, &cancel),
    )
    .await
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispose_aborts_fan_out() {
    let bus = Arc::new(EventBus::new().with_parallelism(1));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let calls = calls.clone();
        bus.subscribe_fn(move |_: &ScoreChanged| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(())
        });
    }

    let publisher = bus.clone();
    let fan_out = tokio::spawn(async move {
        publisher
            .publish_async(ScoreChanged { score: 1 }, &CancellationToken::new())
            .await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    bus.dispose();

    tokio::time::timeout(Duration::from_secs(5), fan_out)
        .await
        .unwrap()
        .unwrap();
    assert!(calls.load(Ordering::SeqCst) < 5);
    assert_eq!(bus.subscriber_count::<ScoreChanged>(), 0);
}
