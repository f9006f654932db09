//! Settled-DOM waiting.
//!
//! A single "is it done?" check can pass mid-render: a component resolves its
//! own update and only then schedules one for a child. The waiter therefore
//! loops over frame, task, idle, request queue and render signals, and only
//! returns once two consecutive passes produced identical markup for the whole
//! composed tree. Any sign of pending work restarts the loop from scratch.

use futures::future::{BoxFuture, join_all};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::host::BrowserHost;
use super::tree::ComposedTree;
use super::types::{ElementRef, SettleError, SettleResult};
use crate::config::SettleSettings;

/// Extra readiness check re-run every pass; resolving `true` forces another pass.
pub type CustomAwaiter = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Options for [`wait_until_settled`]
#[derive(Clone)]
pub struct SettleOptions {
    /// Upper bound on waiting; `Duration::ZERO` waits indefinitely
    pub timeout: Duration,
    /// Return an error on timeout instead of the element as-is
    pub fail_on_timeout: bool,
    /// Also wait for the page's pending-request queue to drain
    pub await_hypermedia: bool,
    pub custom_awaiter: Option<CustomAwaiter>,
}

impl Default for SettleOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            fail_on_timeout: true,
            await_hypermedia: true,
            custom_awaiter: None,
        }
    }
}

impl std::fmt::Debug for SettleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettleOptions")
            .field("timeout", &self.timeout)
            .field("fail_on_timeout", &self.fail_on_timeout)
            .field("await_hypermedia", &self.await_hypermedia)
            .field("custom_awaiter", &self.custom_awaiter.is_some())
            .finish()
    }
}

impl SettleOptions {
    pub fn from_settings(settings: &SettleSettings) -> Self {
        Self {
            timeout: settings.timeout,
            ..Default::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn fail_on_timeout(mut self, fail: bool) -> Self {
        self.fail_on_timeout = fail;
        self
    }

    pub fn await_hypermedia(mut self, await_hypermedia: bool) -> Self {
        self.await_hypermedia = await_hypermedia;
        self
    }

    pub fn custom_awaiter<F>(mut self, awaiter: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        self.custom_awaiter = Some(Arc::new(awaiter));
        self
    }
}

/// Wait until `element` and its composed tree stop changing.
///
/// Resolves with the element. On timeout, fails with [`SettleError::Timeout`]
/// or returns the element unsettled, depending on `fail_on_timeout`.
pub async fn wait_until_settled(
    host: &dyn BrowserHost,
    element: &ElementRef,
    options: &SettleOptions,
) -> SettleResult<ElementRef> {
    if options.timeout.is_zero() {
        let passes = settle_loop(host, element, options).await;
        debug!(tag = %element.tag_name(), passes, "element settled");
        return Ok(element.clone());
    }

    match tokio::time::timeout(options.timeout, settle_loop(host, element, options)).await {
        Ok(passes) => {
            debug!(tag = %element.tag_name(), passes, "element settled");
            Ok(element.clone())
        }
        Err(_) if options.fail_on_timeout => Err(SettleError::Timeout(options.timeout)),
        Err(_) => {
            warn!(
                tag = %element.tag_name(),
                timeout = ?options.timeout,
                "element did not settle, continuing with current state"
            );
            Ok(element.clone())
        }
    }
}

/// Runs passes until two consecutive snapshots agree; returns the pass count.
async fn settle_loop(host: &dyn BrowserHost, element: &ElementRef, options: &SettleOptions) -> usize {
    let mut confirmed: Option<Vec<String>> = None;
    let mut passes = 0;

    loop {
        passes += 1;
        host.next_frame().await;
        host.next_task().await;
        host.idle().await;

        if options.await_hypermedia {
            if let Some(queue) = host.request_queue() {
                if queue.pending() > 0 {
                    trace!(pending = queue.pending(), "waiting for request queue");
                    queue.drained().await;
                    confirmed = None;
                    continue;
                }
            }
        }

        if await_updates(element).await {
            trace!("update still pending, restarting");
            confirmed = None;
            continue;
        }

        if let Some(awaiter) = &options.custom_awaiter {
            if awaiter().await {
                trace!("custom awaiter requested another pass");
                confirmed = None;
                continue;
            }
        }

        let snapshot = structural_snapshot(element);
        match &confirmed {
            None => confirmed = Some(snapshot),
            Some(previous) if *previous != snapshot => {
                trace!("markup changed between passes, restarting");
                confirmed = None;
            }
            Some(_) => return passes,
        }
    }
}

/// Await every update signal in the tree; `true` if any reported more work.
async fn await_updates(element: &ElementRef) -> bool {
    let nodes: Vec<ElementRef> = ComposedTree::including_root(element).collect();
    let signals = nodes
        .iter()
        .filter_map(|node| node.updatable())
        .map(|updatable| updatable.update_complete());
    join_all(signals).await.into_iter().any(|pending| pending)
}

/// Outer markup of the element followed by the inner markup of every
/// reachable shadow root, in tree order.
pub fn structural_snapshot(element: &ElementRef) -> Vec<String> {
    let mut snapshot = vec![element.outer_html()];
    snapshot.extend(
        ComposedTree::including_root(element)
            .filter_map(|node| node.shadow_root())
            .map(|shadow| shadow.inner_html),
    );
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryElement, PendingRequests, TokioHost};
    use crate::dom::host::RequestQueue;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn host() -> TokioHost {
        TokioHost::new(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_static_element_settles_in_two_passes() {
        let el = MemoryElement::new("div").into_ref();
        let passes = settle_loop(&host(), &el, &SettleOptions::default()).await;
        assert_eq!(passes, 2);
    }

    #[tokio::test]
    async fn test_pending_update_forces_two_more_passes() {
        let el = Arc::new(MemoryElement::new("x-button").with_updates([true]));
        let el_ref: ElementRef = el.clone();

        let passes = settle_loop(&host(), &el_ref, &SettleOptions::default()).await;

        // one pass reporting pending work, then record + confirm
        assert_eq!(passes, 3);
        assert_eq!(el.update_calls(), 3);
    }

    #[tokio::test]
    async fn test_nested_shadow_updates_awaited() {
        let child = Arc::new(MemoryElement::new("x-icon").with_updates([true, true]));
        let root: ElementRef = MemoryElement::new("x-card")
            .with_shadow(vec![child.clone() as ElementRef])
            .into_ref();

        let passes = settle_loop(&host(), &root, &SettleOptions::default()).await;
        assert_eq!(passes, 4);
        assert_eq!(child.update_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_by_default() {
        let el = MemoryElement::new("div").restless().into_ref();
        let options = SettleOptions::default().timeout(Duration::from_millis(10));

        let result = wait_until_settled(&host(), &el, &options).await;
        assert_eq!(result.err(), Some(SettleError::Timeout(Duration::from_millis(10))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_can_return_element() {
        let el = MemoryElement::new("div").restless().into_ref();
        let options = SettleOptions::default()
            .timeout(Duration::from_millis(10))
            .fail_on_timeout(false);

        let settled = wait_until_settled(&host(), &el, &options).await.unwrap();
        assert!(Arc::ptr_eq(&settled, &el));
    }

    #[tokio::test]
    async fn test_custom_awaiter_restarts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let options = SettleOptions::default().custom_awaiter(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { n == 0 }.boxed()
        });
        let el = MemoryElement::new("div").into_ref();

        let passes = settle_loop(&host(), &el, &options).await;
        assert_eq!(passes, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_request_queue_drained_first() {
        let queue = Arc::new(PendingRequests::new());
        queue.begin();
        let host = host().with_queue(queue.clone());
        let el = MemoryElement::new("div").into_ref();

        let finisher = {
            let queue = queue.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                queue.finish();
            })
        };
        let passes = settle_loop(&host, &el, &SettleOptions::default()).await;
        finisher.await.unwrap();

        assert_eq!(queue.pending(), 0);
        assert_eq!(passes, 3);
    }

    #[tokio::test]
    async fn test_request_queue_ignored_when_disabled() {
        let queue = Arc::new(PendingRequests::new());
        queue.begin();
        let host = host().with_queue(queue.clone());
        let el = MemoryElement::new("div").into_ref();

        let options = SettleOptions::default().await_hypermedia(false);
        let passes = settle_loop(&host, &el, &options).await;
        assert_eq!(passes, 2);
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_structural_snapshot_includes_shadow_roots() {
        let inner = MemoryElement::new("x-inner")
            .with_shadow(vec![MemoryElement::new("b").into_ref()])
            .into_ref();
        let root = MemoryElement::new("x-outer").with_shadow(vec![inner]).into_ref();

        let snapshot = structural_snapshot(&root);
        assert_eq!(
            snapshot,
            vec![
                "<x-outer></x-outer>".to_string(),
                "<x-inner></x-inner>".to_string(),
                "<b></b>".to_string(),
            ]
        );
    }
}
