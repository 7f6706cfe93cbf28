use super::{QueueEvent, QueueShared};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, warn};

/// Long-running worker loop: block on the shared queue, execute, notify.
///
/// Errors are absorbed here and re-emitted as `Failed` events; nothing a
/// single item does can take the worker down.
pub(crate) fn run_worker(shared: Arc<QueueShared>) {
    while let Some((mut conversion, cancel)) = shared.take_next() {
        debug!(output = ?conversion.output(), "worker picked up a conversion");

        let outcome = conversion.execute_with(&shared.config, None, Some(cancel));

        let number = shared.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let total = shared.submitted.load(Ordering::SeqCst);
        match outcome {
            Ok(result) => {
                shared.emit(QueueEvent::Converted {
                    number,
                    total,
                    result: Arc::new(result),
                });
            }
            Err(error) => {
                warn!("queue item {} failed: {}", number, error);
                shared.emit(QueueEvent::Failed {
                    number,
                    total,
                    error: Arc::new(error),
                });
            }
        }
    }
}
