use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Default)]
struct Tracker {
    executed: Arc<Mutex<Vec<usize>>>,
    failures: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

struct RecordingCommand {
    seq: usize,
    tracker: Tracker,
    delay: Duration,
    outcome: Result<(), CommandError>,
    runnable: bool,
}

impl RecordingCommand {
    fn new(seq: usize, tracker: &Tracker) -> Self {
        Self {
            seq,
            tracker: tracker.clone(),
            delay: Duration::from_millis(5),
            outcome: Ok(()),
            runnable: true,
        }
    }

    fn failing(mut self, message: &str) -> Self {
        self.outcome = Err(CommandError::ExecutionFailed(message.to_string()));
        self
    }

    fn not_runnable(mut self) -> Self {
        self.runnable = false;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Command for RecordingCommand {
    fn can_execute(&self) -> bool {
        self.runnable
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<(), CommandError> {
        let now = self.tracker.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.peak.fetch_max(now, Ordering::SeqCst);

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(CommandError::Cancelled),
            _ = tokio::time::sleep(self.delay) => self.outcome.clone(),
        };

        self.tracker.executed.lock().push(self.seq);
        self.tracker.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn on_failure(&self, error: CommandError) {
        self.tracker.failures.lock().push(error.to_string());
    }
}

struct PanickingCommand {
    failures: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Command for PanickingCommand {
    async fn execute(&self, _cancel: &CancellationToken) -> Result<(), CommandError> {
        panic!("command exploded");
    }

    fn on_failure(&self, error: CommandError) {
        self.failures.lock().push(error.to_string());
    }
}

async fn wait_idle(processor: &CommandProcessor) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while processor.is_processing() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap();
}

fn processor() -> CommandProcessor {
    CommandProcessor::new(Duration::from_millis(5))
}

#[tokio::test]
async fn test_single_command_executes() {
    let processor = processor();
    let tracker = Tracker::default();

    processor.enqueue(RecordingCommand::new(0, &tracker));
    wait_idle(&processor).await;

    assert_eq!(*tracker.executed.lock(), vec![0]);
    assert!(tracker.failures.lock().is_empty());
}

#[tokio::test]
async fn test_commands_run_in_fifo_order() {
    let processor = processor();
    let tracker = Tracker::default();

    for seq in 0..5 {
        processor.enqueue(RecordingCommand::new(seq, &tracker));
    }
    wait_idle(&processor).await;

    assert_eq!(*tracker.executed.lock(), vec![0, 1, 2, 3, 4]);
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
    assert_eq!(processor.pending(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_serialized() {
    let processor = Arc::new(processor());
    let tracker = Tracker::default();
    let sequencer = Arc::new(Mutex::new(0usize));

    let callers: Vec<_> = [2usize, 2, 1]
        .into_iter()
        .map(|count| {
            let processor = processor.clone();
            let tracker = tracker.clone();
            let sequencer = sequencer.clone();
            tokio::spawn(async move {
                for _ in 0..count {
                    {
                        let mut next = sequencer.lock();
                        processor.enqueue(RecordingCommand::new(*next, &tracker));
                        *next += 1;
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for caller in callers {
        caller.await.unwrap();
    }
    wait_idle(&processor).await;

    assert_eq!(*tracker.executed.lock(), vec![0, 1, 2, 3, 4]);
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failure_routed_to_on_failure() {
    let processor = processor();
    let tracker = Tracker::default();

    processor.enqueue(RecordingCommand::new(0, &tracker).failing("disk full"));
    processor.enqueue(RecordingCommand::new(1, &tracker));
    wait_idle(&processor).await;

    assert_eq!(*tracker.executed.lock(), vec![0, 1]);
    let failures = tracker.failures.lock();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("disk full"));
}

#[tokio::test]
async fn test_panic_routed_to_on_failure() {
    let processor = processor();
    let tracker = Tracker::default();

    processor.enqueue(PanickingCommand {
        failures: tracker.failures.clone(),
    });
    processor.enqueue(RecordingCommand::new(1, &tracker));
    wait_idle(&processor).await;

    assert_eq!(*tracker.executed.lock(), vec![1]);
    let failures = tracker.failures.lock();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("command exploded"));
}

#[tokio::test]
async fn test_not_runnable_command_dropped_silently() {
    let processor = processor();
    let tracker = Tracker::default();

    processor.enqueue(RecordingCommand::new(0, &tracker).not_runnable());
    processor.enqueue(RecordingCommand::new(1, &tracker));
    wait_idle(&processor).await;

    assert_eq!(*tracker.executed.lock(), vec![1]);
    assert!(tracker.failures.lock().is_empty());
    assert_eq!(processor.pending(), 0);
}

#[tokio::test]
async fn test_enqueue_after_idle_starts_new_drain() {
    let processor = processor();
    let tracker = Tracker::default();

    processor.enqueue(RecordingCommand::new(0, &tracker));
    wait_idle(&processor).await;
    assert!(!processor.is_processing());

    processor.enqueue(RecordingCommand::new(1, &tracker));
    wait_idle(&processor).await;
    assert_eq!(*tracker.executed.lock(), vec![0, 1]);
}

#[tokio::test]
async fn test_stop_cancels_in_flight_and_keeps_rest_queued() {
    let processor = processor();
    let tracker = Tracker::default();

    processor.enqueue(RecordingCommand::new(0, &tracker).slow(Duration::from_secs(30)));
    processor.enqueue(RecordingCommand::new(1, &tracker));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(processor.is_processing());

    tokio::time::timeout(Duration::from_secs(5), processor.stop())
        .await
        .unwrap();

    assert!(!processor.is_processing());
    assert_eq!(*tracker.executed.lock(), vec![0]);
    assert_eq!(processor.pending(), 1);
    assert!(tracker.failures.lock()[0].contains("cancelled"));
}

#[tokio::test]
async fn test_stop_when_idle_returns_immediately() {
    let processor = processor();
    tokio::time::timeout(Duration::from_secs(1), processor.stop())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_game_service_contract() {
    let processor = processor();
    assert_eq!(processor.priority(), priority::COMMANDS);
    assert_eq!(GameService::name(&processor), "CommandProcessor");

    let cancel = CancellationToken::new();
    processor.initialize(&cancel).await.unwrap();
    processor.shutdown(&cancel).await.unwrap();
}

#[tokio::test]
async fn test_with_settings_uses_poll_interval() {
    let settings = CommandSettings {
        shutdown_poll_interval_ms: 1,
    };
    let processor = CommandProcessor::with_settings(&settings);
    assert_eq!(processor.inner.poll_interval, Duration::from_millis(1));
}

#[test]
fn test_enqueue_outside_runtime_waits_for_one() {
    let processor = processor();
    let tracker = Tracker::default();

    processor.enqueue(RecordingCommand::new(0, &tracker));
    assert_eq!(processor.pending(), 1);
    assert!(!processor.is_processing());

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        processor.enqueue(RecordingCommand::new(1, &tracker));
        wait_idle(&processor).await;
    });

    assert_eq!(*tracker.executed.lock(), vec![0, 1]);
    assert_eq!(processor.pending(), 0);
}
