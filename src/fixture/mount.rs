use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use std::sync::Arc;
use tracing::debug;

use super::page::Page;
use super::state::{Direction, FixtureOptions, FixtureResult, PageState};
use crate::dom::{BrowserHost, ElementRef, composed_children, wait_until_settled};

impl PageState {
    /// Apply `options` to the page, touching only settings that differ from
    /// `self`, and return the state now in effect.
    ///
    /// Scroll position and focus are reset on every call. A paint frame is
    /// awaited only when the document was actually modified.
    pub async fn reset(
        &self,
        page: &dyn Page,
        host: &dyn BrowserHost,
        options: &FixtureOptions,
    ) -> FixtureResult<PageState> {
        let mut next = self.clone();
        let mut changed = false;

        if self.lang.as_deref() != Some(options.lang.as_str()) {
            page.set_document_attribute("lang", Some(&options.lang));
            next.lang = Some(options.lang.clone());
            changed = true;
        }

        if self.direction != Some(options.direction) {
            let dir = match options.direction {
                Direction::Rtl => Some(Direction::Rtl.as_str()),
                Direction::Ltr => None,
            };
            page.set_document_attribute("dir", dir);
            next.direction = Some(options.direction);
            changed = true;
        }

        if self.theme.as_deref() != Some(options.theme.as_str()) {
            page.set_document_attribute("data-theme", Some(&options.theme));
            next.theme = Some(options.theme.clone());
            changed = true;
        }

        if self.math != Some(options.math) {
            page.set_document_attribute("data-math", options.math.then_some("true"));
            next.math = Some(options.math);
            changed = true;
        }

        if self.page_padding != Some(options.page_padding) {
            page.set_page_padding(options.page_padding);
            next.page_padding = Some(options.page_padding);
            changed = true;
        }

        if self.viewport != Some(options.viewport) {
            page.set_viewport(options.viewport).await?;
            next.viewport = Some(options.viewport);
            changed = true;
        }

        if self.media != Some(options.media) {
            page.emulate_media(options.media).await?;
            next.media = Some(options.media);
            changed = true;
        }

        page.reset_scroll();
        page.blur_active_element();

        if self.mouse_reset_pending {
            page.reset_mouse().await?;
            next.mouse_reset_pending = false;
        }

        if changed {
            host.next_frame().await;
        }

        Ok(next)
    }
}

/// Mounts elements under test on a page with a deterministic setup.
///
/// The page-wide settings persist between calls; each call only changes what
/// its options ask for.
pub struct Fixture {
    page: Arc<dyn Page>,
    host: Arc<dyn BrowserHost>,
    state: PageState,
}

impl Fixture {
    pub fn new(page: Arc<dyn Page>, host: Arc<dyn BrowserHost>) -> Self {
        Self {
            page,
            host,
            state: PageState::default(),
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    /// Ask the next fixture call to move the mouse back to the origin
    pub fn request_mouse_reset(&mut self) {
        self.state.mouse_reset_pending = true;
    }

    /// Reset the page, mount `element` and wait until its whole tree has
    /// finished updating (and loading, unless disabled).
    pub async fn mount(
        &mut self,
        element: ElementRef,
        options: &FixtureOptions,
    ) -> FixtureResult<ElementRef> {
        self.state = self
            .state
            .reset(self.page.as_ref(), self.host.as_ref(), options)
            .await?;

        self.page.fonts_ready().await;
        self.page.mount(element.clone())?;

        wait_for_elem(self.host.as_ref(), element.clone(), options.await_loading_complete).await;
        let element = wait_until_settled(self.host.as_ref(), &element, &options.settle).await?;

        debug!(tag = %element.tag_name(), "fixture mounted");
        Ok(element)
    }
}

/// Wait depth-first for `elem` and its composed children to finish updating
/// and, when `await_loading` is set, loading.
///
/// An element removed from the document while loading stops being waited on.
pub fn wait_for_elem(
    host: &dyn BrowserHost,
    elem: ElementRef,
    await_loading: bool,
) -> BoxFuture<'_, ()> {
    async move {
        if let Some(updatable) = elem.updatable() {
            updatable.update_complete().await;
        }

        if await_loading {
            if let Some(loadable) = elem.loadable() {
                tokio::select! {
                    _ = loadable.loading_complete() => {}
                    _ = until_disconnected(host, &elem) => {
                        debug!(tag = %elem.tag_name(), "element removed while loading");
                    }
                }
            }
        }

        let children = composed_children(&elem);
        join_all(
            children
                .into_iter()
                .map(|child| wait_for_elem(host, child, await_loading)),
        )
        .await;
    }
    .boxed()
}

async fn until_disconnected(host: &dyn BrowserHost, elem: &ElementRef) {
    while elem.is_connected() {
        host.next_frame().await;
    }
}
