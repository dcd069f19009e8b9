//! A repeating command task with a single cancellation handle.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Runs `tick` once immediately and then once per `period` until cancelled,
/// until `tick` breaks, or until the stream is dropped.
///
/// Ticks never overlap: the next one is not started before the previous
/// future resolved. `missed` decides what happens to ticks that came due
/// meanwhile.
pub struct CommandStream {
    name: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CommandStream {
    pub fn spawn<F, Fut>(
        name: &'static str,
        token: CancellationToken,
        period: Duration,
        missed: MissedTickBehavior,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(missed);
            loop {
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if loop_token.is_cancelled() || tick().await.is_break() {
                    break;
                }
            }
            tracing::debug!("{} stream finished", name);
        });
        tracing::debug!("{} stream started, period {:?}", name, period);
        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    /// Synchronous: no further tick starts after this returns.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    /// Cancels and waits until the task is gone, so that nothing it started
    /// can still be running afterwards.
    pub async fn stop(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::error!("{} stream failed: {:?}", self.name, err);
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for CommandStream {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    mod success {
        use super::super::*;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        fn counting_stream(token: CancellationToken, count: Arc<AtomicUsize>) -> CommandStream {
            CommandStream::spawn(
                "test",
                token,
                Duration::from_millis(100),
                MissedTickBehavior::Delay,
                move || {
                    let count = count.clone();
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                        ControlFlow::Continue(())
                    }
                },
            )
        }

        #[tokio::test(start_paused = true)]
        async fn ticks_immediately_then_periodically() {
            let count = Arc::new(AtomicUsize::new(0));
            let stream = counting_stream(CancellationToken::new(), count.clone());

            tokio::time::sleep(Duration::from_millis(250)).await;
            stream.stop().await;

            assert_eq!(count.load(Ordering::SeqCst), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn cancelled_token_ends_stream() {
            let count = Arc::new(AtomicUsize::new(0));
            let token = CancellationToken::new();
            let stream = counting_stream(token.clone(), count.clone());

            tokio::time::sleep(Duration::from_millis(150)).await;
            token.cancel();
            tokio::time::sleep(Duration::from_secs(5)).await;

            assert_eq!(count.load(Ordering::SeqCst), 2);
            assert!(stream.is_finished());
        }

        #[tokio::test(start_paused = true)]
        async fn break_ends_stream() {
            let stream = CommandStream::spawn(
                "test",
                CancellationToken::new(),
                Duration::from_millis(100),
                MissedTickBehavior::Skip,
                || async { ControlFlow::Break(()) },
            );

            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(stream.is_finished());
        }

        #[tokio::test(start_paused = true)]
        async fn drop_aborts_stream() {
            let count = Arc::new(AtomicUsize::new(0));
            let stream = counting_stream(CancellationToken::new(), count.clone());

            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(stream);
            tokio::time::sleep(Duration::from_secs(1)).await;

            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }
}
