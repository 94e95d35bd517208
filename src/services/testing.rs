//! In-memory stand-ins for the browser and the model service.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::site::Locator;

use super::{
    CompletionRequest, ExtractionError, Page, PageError, StructuredCompletion, Tokenizer,
    TokenizerError,
};

pub const LISTINGS: &str = ".special-offer.card";
pub const DETAIL_LINK_TEXT: &str = "More Details";
pub const DETAIL_REGION: &str = "div.border.rounded.bg-slate-50";
pub const TRIGGER: &str = "button.offer-details";
pub const MODAL: &str = ".modal-dialog";
pub const DISMISS: &str = "button.close";
pub const MAIN_WINDOW: u32 = 1;

/// One character per token.
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.chars().map(u32::from).collect()
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        tokens
            .iter()
            .map(|&t| char::from_u32(t).ok_or_else(|| TokenizerError::Decode(t.to_string())))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub schema_name: String,
    pub schema: Value,
}

pub struct FakeCompletion {
    reply: Option<String>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeCompletion {
    pub fn replying(reply: &str) -> Self {
        FakeCompletion {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with an empty response.
    pub fn failing() -> Self {
        FakeCompletion {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StructuredCompletion for FakeCompletion {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ExtractionError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            model: request.model.to_string(),
            system: request.system.to_string(),
            user: request.user.to_string(),
            schema_name: request.schema_name.to_string(),
            schema: request.schema,
        });
        self.reply.clone().ok_or(ExtractionError::EmptyResponse)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeListing {
    html: String,
    href: Option<String>,
    detail_html: Option<String>,
    modal_html: Option<String>,
}

impl FakeListing {
    pub fn card(html: &str) -> Self {
        FakeListing {
            html: html.to_string(),
            ..Default::default()
        }
    }

    /// A listing with a detail link. `None` detail never renders its region.
    pub fn with_detail(html: &str, href: &str, detail: Option<&str>) -> Self {
        FakeListing {
            html: html.to_string(),
            href: Some(href.to_string()),
            detail_html: detail.map(str::to_string),
            ..Default::default()
        }
    }

    /// A listing with a disclosure trigger. `None` modal never opens.
    pub fn with_modal(html: &str, modal: Option<&str>) -> Self {
        FakeListing {
            html: html.to_string(),
            modal_html: modal.map(str::to_string),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FakeElement {
    Listing { index: usize, generation: usize },
    Link(usize),
    Detail(usize),
    Trigger(usize),
    Modal(usize),
    Dismiss,
}

/// Everything the fake browser observed.
#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub visited: Vec<String>,
    pub listing_queries: usize,
    pub captures: usize,
    pub generation: usize,
    pub active_at_listing: Vec<u32>,
    pub modal_open_at_listing: Vec<bool>,
    pub active: Option<u32>,
    pub open_windows: Vec<u32>,
    pub window_urls: HashMap<u32, String>,
    pub next_window: u32,
    pub opened_tabs: Vec<String>,
    pub modal_open: Option<usize>,
    pub scrolled_into_view: usize,
    pub scrolled_to_bottom: bool,
    pub quit: bool,
}

pub struct FakePage {
    listings: Vec<FakeListing>,
    source: String,
    invalidate_after: Option<usize>,
    stale_from: Option<usize>,
    navigation_fails: bool,
    tab_close_fails: bool,
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    pub fn new(listings: Vec<FakeListing>) -> Self {
        let state = FakeState {
            active: Some(MAIN_WINDOW),
            open_windows: vec![MAIN_WINDOW],
            next_window: MAIN_WINDOW + 1,
            ..Default::default()
        };
        FakePage {
            listings,
            source: String::new(),
            invalidate_after: None,
            stale_from: None,
            navigation_fails: false,
            tab_close_fails: false,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Every listing handle goes stale once `n` listings have been captured.
    pub fn invalidate_after_captures(mut self, n: usize) -> Self {
        self.invalidate_after = Some(n);
        self
    }

    /// Listings at `index` and beyond are stale however often they are queried.
    pub fn always_stale_from(mut self, index: usize) -> Self {
        self.stale_from = Some(index);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn fail_navigation(mut self) -> Self {
        self.navigation_fails = true;
        self
    }

    pub fn fail_tab_close(mut self) -> Self {
        self.tab_close_fails = true;
        self
    }

    pub fn state(&self) -> FakeState {
        self.state.lock().unwrap().clone()
    }

    /// Shared view of the state that outlives the page itself.
    pub fn handle(&self) -> Arc<Mutex<FakeState>> {
        Arc::clone(&self.state)
    }

    fn listing(&self, index: usize) -> Result<&FakeListing, PageError> {
        self.listings.get(index).ok_or_else(|| PageError::NotFound {
            what: format!("listing {}", index),
        })
    }

    fn check_fresh(&self, index: usize, generation: usize) -> Result<(), PageError> {
        let stale_for_good = self.stale_from.is_some_and(|from| index >= from);
        if stale_for_good || generation < self.state.lock().unwrap().generation {
            return Err(PageError::StaleReference);
        }
        Ok(())
    }

    fn is_css(locator: &Locator, selector: &str) -> bool {
        matches!(locator, Locator::Css(s) if s == selector)
    }
}

#[async_trait]
impl Page for FakePage {
    type Element = FakeElement;
    type Window = u32;

    async fn goto(&self, url: &str) -> Result<(), PageError> {
        if self.navigation_fails {
            return Err(PageError::Driver("net::ERR_NAME_NOT_RESOLVED".to_string()));
        }
        self.state.lock().unwrap().visited.push(url.to_string());
        Ok(())
    }

    async fn page_source(&self) -> Result<String, PageError> {
        Ok(self.source.clone())
    }

    async fn scroll_to_bottom(&self) -> Result<(), PageError> {
        self.state.lock().unwrap().scrolled_to_bottom = true;
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<FakeElement>, PageError> {
        let mut state = self.state.lock().unwrap();
        if Self::is_css(locator, LISTINGS) {
            state.listing_queries += 1;
            let generation = state.generation;
            return Ok((0..self.listings.len())
                .map(|index| FakeElement::Listing { index, generation })
                .collect());
        }
        if Self::is_css(locator, DISMISS) {
            return Ok(state.modal_open.map(|_| FakeElement::Dismiss).into_iter().collect());
        }
        Ok(Vec::new())
    }

    async fn find_within(
        &self,
        parent: &FakeElement,
        locator: &Locator,
    ) -> Result<FakeElement, PageError> {
        let FakeElement::Listing { index, generation } = parent else {
            return Err(PageError::NotFound {
                what: locator.to_string(),
            });
        };
        self.check_fresh(*index, *generation)?;
        let listing = self.listing(*index)?;

        match locator {
            Locator::LinkText(text) if text == DETAIL_LINK_TEXT && listing.href.is_some() => {
                Ok(FakeElement::Link(*index))
            }
            Locator::Css(s) if s == TRIGGER => Ok(FakeElement::Trigger(*index)),
            _ => Err(PageError::NotFound {
                what: locator.to_string(),
            }),
        }
    }

    async fn outer_html(&self, element: &FakeElement) -> Result<String, PageError> {
        match element {
            FakeElement::Listing { index, generation } => {
                self.check_fresh(*index, *generation)?;
                let html = self.listing(*index)?.html.clone();

                let mut state = self.state.lock().unwrap();
                let active = state.active.unwrap_or_default();
                state.active_at_listing.push(active);
                let modal_open = state.modal_open.is_some();
                state.modal_open_at_listing.push(modal_open);
                state.captures += 1;
                if Some(state.captures) == self.invalidate_after {
                    state.generation += 1;
                }
                Ok(html)
            }
            FakeElement::Detail(index) => self.listing(*index)?.detail_html.clone().ok_or_else(
                || PageError::NotFound {
                    what: DETAIL_REGION.to_string(),
                },
            ),
            FakeElement::Modal(index) => {
                self.listing(*index)?
                    .modal_html
                    .clone()
                    .ok_or_else(|| PageError::NotFound {
                        what: MODAL.to_string(),
                    })
            }
            other => Ok(format!("<{:?}>", other)),
        }
    }

    async fn attribute(
        &self,
        element: &FakeElement,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        match (element, name) {
            (FakeElement::Link(index), "href") => Ok(self.listing(*index)?.href.clone()),
            _ => Ok(None),
        }
    }

    async fn wait_for_present(
        &self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<FakeElement, PageError> {
        let timeout = || PageError::Timeout {
            what: locator.to_string(),
        };
        if !Self::is_css(locator, DETAIL_REGION) {
            return Err(timeout());
        }

        let state = self.state.lock().unwrap();
        let url = state
            .active
            .and_then(|w| state.window_urls.get(&w))
            .ok_or_else(timeout)?;

        self.listings
            .iter()
            .position(|l| {
                l.detail_html.is_some() && l.href.as_deref().is_some_and(|h| url.ends_with(h))
            })
            .map(FakeElement::Detail)
            .ok_or_else(timeout)
    }

    async fn wait_for_visible(
        &self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<FakeElement, PageError> {
        let state = self.state.lock().unwrap();
        match state.modal_open {
            Some(index) if Self::is_css(locator, MODAL) => Ok(FakeElement::Modal(index)),
            _ => Err(PageError::Timeout {
                what: locator.to_string(),
            }),
        }
    }

    async fn scroll_into_view(&self, _element: &FakeElement) -> Result<(), PageError> {
        self.state.lock().unwrap().scrolled_into_view += 1;
        Ok(())
    }

    async fn script_click(&self, element: &FakeElement) -> Result<(), PageError> {
        match element {
            FakeElement::Trigger(index) => {
                if self.listing(*index)?.modal_html.is_some() {
                    self.state.lock().unwrap().modal_open = Some(*index);
                }
            }
            FakeElement::Dismiss => self.state.lock().unwrap().modal_open = None,
            _ => {}
        }
        Ok(())
    }

    async fn current_window(&self) -> Result<u32, PageError> {
        self.state
            .lock()
            .unwrap()
            .active
            .ok_or_else(|| PageError::Driver("no active window".to_string()))
    }

    async fn open_tab(&self, url: &str) -> Result<u32, PageError> {
        let mut state = self.state.lock().unwrap();
        let window = state.next_window;
        state.next_window += 1;
        state.open_windows.push(window);
        state.window_urls.insert(window, url.to_string());
        state.opened_tabs.push(url.to_string());
        state.active = Some(window);
        Ok(window)
    }

    async fn close_window(&self) -> Result<(), PageError> {
        if self.tab_close_fails {
            return Err(PageError::Driver("no such window".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let active = state
            .active
            .take()
            .ok_or_else(|| PageError::Driver("no active window".to_string()))?;
        state.open_windows.retain(|&w| w != active);
        state.window_urls.remove(&active);
        Ok(())
    }

    async fn switch_to(&self, window: &u32) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        if !state.open_windows.contains(window) {
            return Err(PageError::Driver(format!("no such window {}", window)));
        }
        state.active = Some(*window);
        Ok(())
    }

    async fn quit(self) -> Result<(), PageError> {
        self.state.lock().unwrap().quit = true;
        Ok(())
    }
}
