pub mod worker;

use crate::config::FfmpegConfig;
use crate::conversion::{Conversion, ConversionResult};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, Weak, mpsc};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Worker count selection for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// One worker, items run strictly one after another.
    Serial,
    /// One worker per available processing unit.
    Parallel,
}

/// Completion notification for one queue item.
///
/// `number` is the completion sequence (1-based, completion order, not
/// submission order); `total` is how many items had been submitted when the
/// item finished.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Converted {
        number: u64,
        total: u64,
        result: Arc<ConversionResult>,
    },
    Failed {
        number: u64,
        total: u64,
        error: Arc<Error>,
    },
}

/// A worker pool that drives many conversions to completion.
///
/// Workers are spawned at construction and block until [`start`] opens the
/// gate. [`pause`] is soft: it only withholds future dequeues, an item a
/// worker already took runs to completion. One item's failure is caught at
/// the worker boundary and turned into a [`QueueEvent::Failed`]; it never
/// stops the queue.
///
/// [`start`]: ConversionQueue::start
/// [`pause`]: ConversionQueue::pause
pub struct ConversionQueue {
    shared: Arc<QueueShared>,
    workers: Vec<JoinHandle<()>>,
}

pub(crate) struct QueueShared {
    pub(crate) config: FfmpegConfig,
    state: Mutex<QueueState>,
    signal: Condvar,
    pub(crate) completed: AtomicU64,
    pub(crate) submitted: AtomicU64,
    observers: Mutex<Vec<Sender<QueueEvent>>>,
}

struct QueueState {
    items: VecDeque<Conversion>,
    gate_open: bool,
    shutdown: bool,
    cancel: Arc<AtomicBool>,
}

impl ConversionQueue {
    /// Create the queue and spawn its workers; they idle until `start`.
    pub fn new(config: FfmpegConfig, mode: QueueMode) -> Self {
        let worker_count = match mode {
            QueueMode::Serial => 1,
            QueueMode::Parallel => num_cpus::get().max(1),
        };

        let shared = Arc::new(QueueShared {
            config,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                gate_open: false,
                shutdown: false,
                cancel: Arc::new(AtomicBool::new(false)),
            }),
            signal: Condvar::new(),
            completed: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            observers: Mutex::new(Vec::new()),
        });

        let workers = (0..worker_count)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || worker::run_worker(shared))
            })
            .collect();

        info!("conversion queue started with {} worker(s)", worker_count);
        Self { shared, workers }
    }

    /// Register an observer; every completion event is cloned to every
    /// registered receiver.
    pub fn subscribe(&self) -> Receiver<QueueEvent> {
        let (tx, rx) = mpsc::channel();
        self.shared
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Enqueue a conversion and bump the submitted counter.
    pub fn add(&self, conversion: Conversion) {
        self.shared.add_item(conversion);
    }

    /// Enqueue a conversion that is still being built, without blocking the
    /// caller. A builder error is logged and nothing is enqueued.
    pub fn add_deferred<F>(&self, build: F)
    where
        F: FnOnce() -> Result<Conversion> + Send + 'static,
    {
        let shared = Arc::downgrade(&self.shared);
        std::thread::spawn(move || match build() {
            Ok(conversion) => {
                if let Some(shared) = Weak::upgrade(&shared) {
                    shared.add_item(conversion);
                }
            }
            Err(e) => warn!("deferred conversion was not enqueued: {}", e),
        });
    }

    /// Open the gate with a fresh cancellation scope.
    pub fn start(&self) {
        self.start_with(Arc::new(AtomicBool::new(false)));
    }

    /// Open the gate, installing the given cancellation flag for every item
    /// dequeued from now on.
    pub fn start_with(&self, cancel: Arc<AtomicBool>) {
        let mut state = self.shared.lock_state();
        state.cancel = cancel;
        state.gate_open = true;
        drop(state);
        self.shared.signal.notify_all();
    }

    /// Close the gate. Items already taken by a worker finish; nothing new
    /// is dequeued until the next `start`.
    pub fn pause(&self) {
        self.shared.lock_state().gate_open = false;
        debug!("conversion queue paused");
    }

    /// Items submitted so far.
    pub fn submitted(&self) -> u64 {
        self.shared.submitted.load(Ordering::SeqCst)
    }

    /// Items completed so far, successes and failures combined.
    pub fn completed(&self) -> u64 {
        self.shared.completed.load(Ordering::SeqCst)
    }
}

impl Drop for ConversionQueue {
    /// Cancel the workers, kill in-flight children via the cancellation
    /// flag, and join every worker before returning.
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock_state();
            state.shutdown = true;
            state.cancel.store(true, Ordering::SeqCst);
        }
        self.shared.signal.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        info!("conversion queue shut down");
    }
}

impl QueueShared {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn add_item(&self, conversion: Conversion) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.lock_state().items.push_back(conversion);
        self.signal.notify_all();
    }

    /// Block until the gate is open and an item is available; None on
    /// shutdown.
    pub(crate) fn take_next(&self) -> Option<(Conversion, Arc<AtomicBool>)> {
        let mut state = self.lock_state();
        loop {
            if state.shutdown {
                return None;
            }
            if state.gate_open
                && let Some(conversion) = state.items.pop_front()
            {
                return Some((conversion, Arc::clone(&state.cancel)));
            }
            state = self
                .signal
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Fan an event out to every observer; a gone receiver is ignored.
    pub(crate) fn emit(&self, event: QueueEvent) {
        let observers = self.observers.lock().unwrap_or_else(|e| e.into_inner());
        for observer in observers.iter() {
            let _ = observer.send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::VideoStream;
    use std::time::Duration;

    /// Conversions pointed at a nonexistent binary fail fast, which still
    /// counts as a completion; the suite needs no ffmpeg install.
    fn test_config() -> FfmpegConfig {
        FfmpegConfig::with_paths(
            "/nonexistent/mediaconverter-test/ffmpeg",
            "/nonexistent/mediaconverter-test/ffprobe",
        )
    }

    fn test_conversion(n: usize) -> Conversion {
        Conversion::new()
            .add_stream(VideoStream::new(format!("input-{}.mkv", n), 0))
            .set_output(format!("output-{}.mp4", n))
    }

    #[test]
    fn processes_every_item_exactly_once() {
        let queue = ConversionQueue::new(test_config(), QueueMode::Serial);
        let events = queue.subscribe();

        for n in 0..3 {
            queue.add(test_conversion(n));
        }
        assert_eq!(queue.submitted(), 3);
        queue.start();

        let mut numbers = Vec::new();
        for _ in 0..3 {
            match events.recv_timeout(Duration::from_secs(10)).unwrap() {
                QueueEvent::Failed { number, total, .. } => {
                    numbers.push(number);
                    assert_eq!(total, 3);
                }
                QueueEvent::Converted { .. } => panic!("no ffmpeg, nothing can succeed"),
            }
        }
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(queue.completed(), 3);
        assert!(
            events.recv_timeout(Duration::from_millis(200)).is_err(),
            "exactly K events for K items"
        );
    }

    #[test]
    fn nothing_runs_before_start() {
        let queue = ConversionQueue::new(test_config(), QueueMode::Serial);
        let events = queue.subscribe();
        queue.add(test_conversion(0));
        queue.add(test_conversion(1));

        assert!(events.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(queue.completed(), 0);
    }

    #[test]
    fn pause_withholds_future_dequeues_only() {
        let queue = ConversionQueue::new(test_config(), QueueMode::Serial);
        let events = queue.subscribe();

        queue.add(test_conversion(0));
        queue.start();
        assert!(events.recv_timeout(Duration::from_secs(10)).is_ok());

        queue.pause();
        queue.add(test_conversion(1));
        assert!(
            events.recv_timeout(Duration::from_millis(300)).is_err(),
            "gate is closed, nothing may be dequeued"
        );

        queue.start();
        assert!(events.recv_timeout(Duration::from_secs(10)).is_ok());
        assert_eq!(queue.completed(), 2);
    }

    #[test]
    fn one_failure_never_halts_the_queue() {
        let queue = ConversionQueue::new(test_config(), QueueMode::Serial);
        let events = queue.subscribe();
        queue.start();

        // A conversion with no output fails at render time, the rest of the
        // queue keeps draining.
        queue.add(Conversion::new().add_stream(VideoStream::new("in.mkv", 0)));
        queue.add(test_conversion(1));

        let mut failures = 0;
        for _ in 0..2 {
            match events.recv_timeout(Duration::from_secs(10)).unwrap() {
                QueueEvent::Failed { .. } => failures += 1,
                QueueEvent::Converted { .. } => {}
            }
        }
        assert_eq!(failures, 2);
    }

    #[test]
    fn parallel_mode_drains_the_queue_too() {
        let queue = ConversionQueue::new(test_config(), QueueMode::Parallel);
        let events = queue.subscribe();
        for n in 0..4 {
            queue.add(test_conversion(n));
        }
        queue.start();
        for _ in 0..4 {
            assert!(events.recv_timeout(Duration::from_secs(10)).is_ok());
        }
        assert_eq!(queue.completed(), 4);
    }

    #[test]
    fn deferred_additions_do_not_block_and_get_processed() {
        let queue = ConversionQueue::new(test_config(), QueueMode::Serial);
        let events = queue.subscribe();
        queue.start();

        queue.add_deferred(|| Ok(test_conversion(0)));
        assert!(events.recv_timeout(Duration::from_secs(10)).is_ok());
        assert_eq!(queue.submitted(), 1);

        // A failing builder enqueues nothing and moves no counter.
        queue.add_deferred(|| Err(Error::argument("builder went wrong")));
        assert!(events.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(queue.submitted(), 1);
    }

    #[test]
    fn shutdown_joins_workers_with_items_still_pending() {
        let queue = ConversionQueue::new(test_config(), QueueMode::Serial);
        queue.add(test_conversion(0));
        // Never started; drop must still return promptly.
        drop(queue);
    }
}
