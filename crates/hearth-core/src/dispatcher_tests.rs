use super::*;
use std::sync::atomic::AtomicUsize;

#[test]
fn test_drain_empty_returns_zero() {
    let dispatcher = MainThreadDispatcher::new();
    assert_eq!(dispatcher.drain(), 0);
    assert_eq!(dispatcher.pending(), 0);
}

#[test]
fn test_drain_preserves_fifo_order() {
    let dispatcher = MainThreadDispatcher::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for n in 0..5 {
        let seen = seen.clone();
        dispatcher.enqueue(move || seen.lock().push(n));
    }
    assert_eq!(dispatcher.pending(), 5);

    assert_eq!(dispatcher.drain(), 5);
    assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    assert_eq!(dispatcher.pending(), 0);
}

#[test]
fn test_callback_runs_exactly_once() {
    let dispatcher = MainThreadDispatcher::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    dispatcher.enqueue(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    dispatcher.drain();
    dispatcher.drain();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_enqueue_during_drain_waits_for_next_drain() {
    let dispatcher = MainThreadDispatcher::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let inner_dispatcher = dispatcher.clone();
    let inner_runs = runs.clone();
    dispatcher.enqueue(move || {
        let runs = inner_runs.clone();
        inner_dispatcher.enqueue(move || {
            runs.fetch_add(1, Ordering::SeqCst);
        });
    });

    assert_eq!(dispatcher.drain(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(dispatcher.pending(), 1);

    assert_eq!(dispatcher.drain(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_callback_does_not_stop_batch() {
    let dispatcher = MainThreadDispatcher::new();
    let runs = Arc::new(AtomicUsize::new(0));

    dispatcher.enqueue(|| panic!("boom"));
    let counter = runs.clone();
    dispatcher.enqueue(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(dispatcher.drain(), 2);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_enqueue_from_other_threads() {
    let dispatcher = MainThreadDispatcher::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let runs = runs.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    let runs = runs.clone();
                    dispatcher.enqueue(move || {
                        runs.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(dispatcher.drain(), 100);
    assert_eq!(runs.load(Ordering::SeqCst), 100);
}

#[test]
fn test_host_running_flag() {
    let dispatcher = MainThreadDispatcher::new();
    assert!(!dispatcher.is_host_running());

    let clone = dispatcher.clone();
    clone.set_host_running(true);
    assert!(dispatcher.is_host_running());

    dispatcher.set_host_running(false);
    assert!(!clone.is_host_running());
}
