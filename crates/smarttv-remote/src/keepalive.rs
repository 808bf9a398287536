//! # Keep-Alive
//!
//! Background task that pings the TV over the control channel once right
//! after the transport opens and then at a fixed interval, so idle sessions
//! are not dropped by the TV. Pings go through the session's outbound queue
//! and are therefore ordered with regular writes.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::session::Frame;

/// Periodic liveness probe bound to one control-channel link.
pub struct KeepAlive {
    handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl KeepAlive {
    /// Start pinging. The task ends when `cancel` fires, when [`stop`](Self::stop)
    /// is called, or when the outbound queue closes.
    pub fn start(
        outbound: mpsc::UnboundedSender<Frame>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let cancel = cancel.child_token();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                let mut sent: u64 = 0;

                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    if outbound.send(Frame::Ping).is_err() {
                        tracing::debug!("Outbound queue closed, keep-alive exiting");
                        break;
                    }
                    sent += 1;
                    tracing::trace!(sent, "Keep-alive ping queued");
                }

                tracing::debug!(sent, "Keep-alive stopped");
            })
        };

        Self {
            handle: Some(handle),
            cancel,
        }
    }

    /// Stop pinging and wait briefly for the task to finish.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pings_immediately_then_on_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut keepalive = KeepAlive::start(tx, Duration::from_secs(30), cancel.clone());

        assert_eq!(rx.recv().await, Some(Frame::Ping));
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(rx.recv().await, Some(Frame::Ping));

        keepalive.stop().await;
        assert!(!keepalive.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_stops_pinging() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let keepalive = KeepAlive::start(tx, Duration::from_secs(1), cancel.clone());
        assert_eq!(rx.recv().await, Some(Frame::Ping));

        cancel.cancel();
        drop(keepalive);
        // Sender is dropped with the task, so the queue drains to None.
        while let Some(frame) = rx.recv().await {
            assert_eq!(frame, Frame::Ping);
        }
    }
}
