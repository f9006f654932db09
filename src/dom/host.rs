//! Scheduling primitives of the browser context.
//!
//! The settle waiter only ever suspends at the points exposed here: the next
//! paint frame, the next macrotask, the idle callback and the pending-request
//! queue. [`TokioHost`] maps them onto the tokio timer.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config;

/// Cooperative scheduling capabilities of a page
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Resolve on the next paint frame
    async fn next_frame(&self);

    /// Resolve after one macrotask turn
    async fn next_task(&self);

    /// Wait for the browser to go idle. Returns `false` when the page has no
    /// idle-callback facility.
    async fn idle(&self) -> bool {
        false
    }

    /// The page's in-flight request queue, if it exposes one
    fn request_queue(&self) -> Option<&dyn RequestQueue> {
        None
    }
}

/// Queue of in-flight asynchronous requests
#[async_trait]
pub trait RequestQueue: Send + Sync {
    /// Number of requests currently in flight
    fn pending(&self) -> usize;

    /// Resolve once no request is in flight
    async fn drained(&self);
}

/// Counter-backed [`RequestQueue`]
#[derive(Debug)]
pub struct PendingRequests {
    count: watch::Sender<usize>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            count: watch::Sender::new(0),
        }
    }

    /// Record a request going out
    pub fn begin(&self) {
        self.count.send_modify(|n| *n += 1);
    }

    /// Record a request completing
    pub fn finish(&self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestQueue for PendingRequests {
    fn pending(&self) -> usize {
        *self.count.borrow()
    }

    async fn drained(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// [`BrowserHost`] driven by the tokio timer
#[derive(Clone)]
pub struct TokioHost {
    frame_interval: Duration,
    queue: Option<Arc<dyn RequestQueue>>,
}

impl TokioHost {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            queue: None,
        }
    }

    /// Attach a pending-request queue
    pub fn with_queue(mut self, queue: Arc<dyn RequestQueue>) -> Self {
        self.queue = Some(queue);
        self
    }
}

impl Default for TokioHost {
    fn default() -> Self {
        Self::new(config::get().settle.frame_interval)
    }
}

#[async_trait]
impl BrowserHost for TokioHost {
    async fn next_frame(&self) {
        tokio::time::sleep(self.frame_interval).await;
    }

    async fn next_task(&self) {
        tokio::task::yield_now().await;
    }

    fn request_queue(&self) -> Option<&dyn RequestQueue> {
        self.queue.as_deref()
    }
}
