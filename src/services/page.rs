use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::site::Locator;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PageError {
    /// The element handle no longer points into the live DOM.
    #[error("stale element reference")]
    StaleReference,
    #[error("timed out waiting for {what}")]
    Timeout { what: String },
    #[error("no element matches {what}")]
    NotFound { what: String },
    #[error("webdriver error: {0}")]
    Driver(String),
}

/// A live, navigable browser page.
///
/// Exactly one window is active at a time; callers that open a second
/// window are responsible for switching back before the next step.
#[async_trait]
pub trait Page: Send + Sync {
    type Element: Send + Sync;
    type Window: Clone + Debug + PartialEq + Send + Sync;

    async fn goto(&self, url: &str) -> Result<(), PageError>;
    async fn page_source(&self) -> Result<String, PageError>;
    async fn scroll_to_bottom(&self) -> Result<(), PageError>;

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self::Element>, PageError>;
    async fn find_within(
        &self,
        parent: &Self::Element,
        locator: &Locator,
    ) -> Result<Self::Element, PageError>;
    async fn outer_html(&self, element: &Self::Element) -> Result<String, PageError>;
    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, PageError>;

    /// Waits until an element matching `locator` is in the DOM.
    async fn wait_for_present(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Self::Element, PageError>;
    /// Waits until an element matching `locator` is displayed.
    async fn wait_for_visible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Self::Element, PageError>;

    async fn scroll_into_view(&self, element: &Self::Element) -> Result<(), PageError>;
    /// Clicks through script so overlays can't intercept the click.
    async fn script_click(&self, element: &Self::Element) -> Result<(), PageError>;

    async fn current_window(&self) -> Result<Self::Window, PageError>;
    /// Opens `url` in a new tab and makes that tab active.
    async fn open_tab(&self, url: &str) -> Result<Self::Window, PageError>;
    /// Closes the active tab. Focus must be switched explicitly afterwards.
    async fn close_window(&self) -> Result<(), PageError>;
    async fn switch_to(&self, window: &Self::Window) -> Result<(), PageError>;

    /// Ends the browsing session.
    async fn quit(self) -> Result<(), PageError>
    where
        Self: Sized;
}
