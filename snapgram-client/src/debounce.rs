//! Delays a changing value until it has stopped changing.

use std::time::Duration;
use tokio::{
    sync::watch,
    time::{Instant, sleep_until},
};

/// Creates a linked input and output pair.
///
/// The output yields the input's value once it has gone `delay` without
/// changing. `initial` is the starting value and is never yielded itself.
#[must_use]
pub fn debounce<T: Clone>(initial: T, delay: Duration) -> (DebounceInput<T>, Debounced<T>) {
    let (sender, receiver) = watch::channel(initial);

    (
        DebounceInput(sender),
        Debounced {
            receiver,
            delay,
            closed: false,
        },
    )
}

#[derive(Debug)]
pub struct DebounceInput<T>(watch::Sender<T>);

impl<T> DebounceInput<T> {
    pub fn set(&self, value: T) {
        self.0.send_replace(value);
    }
}

#[derive(Debug)]
pub struct Debounced<T> {
    receiver: watch::Receiver<T>,
    delay: Duration,
    closed: bool,
}

impl<T: Clone> Debounced<T> {
    /// Waits for the next settled value.
    ///
    /// A value set right before the input is dropped still settles after the
    /// delay. Returns `None` once the input is gone and nothing is pending.
    pub async fn next(&mut self) -> Option<T> {
        if self.closed || self.receiver.changed().await.is_err() {
            self.closed = true;
            return None;
        }

        let mut deadline = Instant::now() + self.delay;
        loop {
            tokio::select! {
                changed = self.receiver.changed(), if !self.closed => {
                    if changed.is_ok() {
                        deadline = Instant::now() + self.delay;
                    } else {
                        self.closed = true;
                    }
                }
                () = sleep_until(deadline) => {
                    return Some(self.receiver.borrow_and_update().clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::debounce::debounce;
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    const DELAY: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn only_the_settled_value_is_emitted() {
        let (input, mut output) = debounce(String::new(), DELAY);
        let start = Instant::now();

        let typing = tokio::spawn(async move {
            input.set("c".to_owned());
            sleep(Duration::from_millis(200)).await;
            input.set("ca".to_owned());
            sleep(Duration::from_millis(200)).await;
            input.set("cat".to_owned());
            sleep(Duration::from_secs(2)).await;
        });

        assert_eq!(output.next().await.as_deref(), Some("cat"));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1000), "{elapsed:?}");

        typing.await.unwrap();
        assert_eq!(output.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_value_survives_dropped_input() {
        let (input, mut output) = debounce(0, DELAY);
        let start = Instant::now();

        input.set(1);
        input.set(2);
        drop(input);

        assert_eq!(output.next().await, Some(2));
        assert!(start.elapsed() >= DELAY);
        assert_eq!(output.next().await, None);
        assert_eq!(output.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_pauses_emit_separately() {
        let (input, mut output) = debounce(0, DELAY);

        input.set(1);
        assert_eq!(output.next().await, Some(1));
        input.set(2);
        assert_eq!(output.next().await, Some(2));
    }
}
