use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Emits only the last value pushed within a quiet period.
///
/// Used for search-as-you-type: each keystroke is pushed, and a query runs
/// only once input settles. Dropping the debouncer flushes any pending value.
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
    _task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn spawn(quiet: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, mut input) = mpsc::unbounded_channel::<T>();
        let (out, output) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Some(first) = input.recv().await {
                let mut latest = first;
                loop {
                    tokio::select! {
                        next = input.recv() => match next {
                            Some(value) => latest = value,
                            None => {
                                let _ = out.send(latest);
                                return;
                            }
                        },
                        _ = tokio::time::sleep(quiet) => {
                            if out.send(latest).is_err() {
                                return;
                            }
                            break;
                        }
                    }
                }
            }
        });

        (Self { tx, _task: task }, output)
    }

    /// Returns false once the output side is gone
    pub fn push(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_emits_last_value() {
        let (debouncer, mut rx) = Debouncer::spawn(Duration::from_millis(300));
        debouncer.push("r");
        debouncer.push("ru");
        debouncer.push("rus");

        assert_eq!(rx.recv().await, Some("rus"));

        debouncer.push("rust");
        assert_eq!(rx.recv().await, Some("rust"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_flushes_pending() {
        let (debouncer, mut rx) = Debouncer::spawn(Duration::from_secs(10));
        debouncer.push(1);
        drop(debouncer);

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, None);
    }
}
