use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

use crate::domain::{
    listing::{HarvestBatch, ListingFragment},
    site::{AdapterSpec, Locator, Pacing},
};

use super::{Page, PageError};

/// Re-queries allowed for a single listing before the traversal is abandoned.
pub const MAX_STALE_RECOVERIES: usize = 3;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("failed to load {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: PageError,
    },
    #[error("failed to locate listings with {locator}: {source}")]
    ListingQuery {
        locator: String,
        #[source]
        source: PageError,
    },
    #[error("browser failed during harvest: {0}")]
    Page(#[from] PageError),
}

/// Harvests every listing block from a live page.
#[async_trait]
pub trait Harvest {
    async fn harvest<P: Page>(&self, page: &P, url: &Url) -> Result<HarvestBatch, HarvestError>;
}

/// Captures one located listing, including any secondary markup.
#[async_trait]
trait ListingCapture: Sync {
    async fn capture<P: Page>(
        &self,
        page: &P,
        base: &Url,
        listing: &P::Element,
    ) -> Result<ListingFragment, PageError>;
}

pub struct StaticCardAdapter {
    listings: Locator,
    pacing: Pacing,
}

pub struct DrillDownAdapter {
    listings: Locator,
    detail_link: Locator,
    detail_region: Locator,
    wait: Duration,
    pacing: Pacing,
}

pub struct DisclosureModalAdapter {
    listings: Locator,
    trigger: Locator,
    modal: Locator,
    dismiss: Locator,
    wait: Duration,
    pacing: Pacing,
}

pub struct FullPageAdapter {
    pacing: Pacing,
}

pub enum SiteAdapter {
    StaticCard(StaticCardAdapter),
    DrillDown(DrillDownAdapter),
    DisclosureModal(DisclosureModalAdapter),
    FullPage(FullPageAdapter),
}

impl SiteAdapter {
    pub fn from_spec(spec: &AdapterSpec, pacing: Pacing) -> Self {
        match spec {
            AdapterSpec::StaticCard { listings } => SiteAdapter::StaticCard(StaticCardAdapter {
                listings: Locator::css(listings),
                pacing,
            }),
            AdapterSpec::DrillDown {
                listings,
                detail_link,
                detail_region,
                wait_secs,
            } => SiteAdapter::DrillDown(DrillDownAdapter {
                listings: Locator::css(listings),
                detail_link: detail_link.clone(),
                detail_region: Locator::css(detail_region),
                wait: Duration::from_secs(*wait_secs),
                pacing,
            }),
            AdapterSpec::DisclosureModal {
                listings,
                trigger,
                modal,
                dismiss,
                wait_secs,
            } => SiteAdapter::DisclosureModal(DisclosureModalAdapter {
                listings: Locator::css(listings),
                trigger: Locator::css(trigger),
                modal: Locator::css(modal),
                dismiss: Locator::css(dismiss),
                wait: Duration::from_secs(*wait_secs),
                pacing,
            }),
            AdapterSpec::FullPage => SiteAdapter::FullPage(FullPageAdapter { pacing }),
        }
    }
}

#[async_trait]
impl Harvest for SiteAdapter {
    async fn harvest<P: Page>(&self, page: &P, url: &Url) -> Result<HarvestBatch, HarvestError> {
        match self {
            SiteAdapter::StaticCard(adapter) => adapter.harvest(page, url).await,
            SiteAdapter::DrillDown(adapter) => adapter.harvest(page, url).await,
            SiteAdapter::DisclosureModal(adapter) => adapter.harvest(page, url).await,
            SiteAdapter::FullPage(adapter) => adapter.harvest(page, url).await,
        }
    }
}

async fn load<P: Page>(page: &P, url: &Url, pacing: &Pacing) -> Result<(), HarvestError> {
    log::info!("Loading {}", url);
    page.goto(url.as_str())
        .await
        .map_err(|source| HarvestError::Navigation {
            url: url.to_string(),
            source,
        })?;
    sleep(pacing.after_load()).await;
    Ok(())
}

async fn locate<P: Page>(page: &P, locator: &Locator) -> Result<Vec<P::Element>, HarvestError> {
    page.find_all(locator)
        .await
        .map_err(|source| HarvestError::ListingQuery {
            locator: locator.to_string(),
            source,
        })
}

/// Walks the listing set by position. A stale handle triggers a fresh query and
/// a retry of the same position, so nothing is captured twice.
async fn traverse<P, C>(
    page: &P,
    base: &Url,
    listings_locator: &Locator,
    capture: &C,
    pacing: &Pacing,
) -> Result<HarvestBatch, HarvestError>
where
    P: Page,
    C: ListingCapture,
{
    let mut listings = locate(page, listings_locator).await?;
    log::info!("Located {} listings with {}", listings.len(), listings_locator);

    let mut batch = HarvestBatch::default();
    let mut index = 0;
    let mut recoveries = 0;

    while index < listings.len() {
        match capture.capture(page, base, &listings[index]).await {
            Ok(fragment) => {
                batch.push(fragment);
                index += 1;
                recoveries = 0;
                sleep(pacing.between_listings()).await;
            }
            Err(PageError::StaleReference) => {
                if recoveries >= MAX_STALE_RECOVERIES {
                    log::error!(
                        "Listing {} stayed stale after {} re-queries, abandoning harvest",
                        index,
                        recoveries
                    );
                    batch.abandon();
                    break;
                }
                recoveries += 1;
                log::warn!(
                    "Listing {} went stale, re-querying {} (attempt {})",
                    index,
                    listings_locator,
                    recoveries
                );
                listings = locate(page, listings_locator).await?;
            }
            Err(e @ (PageError::Timeout { .. } | PageError::NotFound { .. })) => {
                log::warn!("Skipping listing {}: {}", index, e);
                batch.skip(index, e.to_string());
                index += 1;
                recoveries = 0;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let summary = batch.summary();
    log::info!(
        "Harvest finished: {} captured, {} skipped, complete: {}",
        summary.captured,
        summary.skipped,
        summary.complete
    );
    Ok(batch)
}

#[async_trait]
impl Harvest for StaticCardAdapter {
    async fn harvest<P: Page>(&self, page: &P, url: &Url) -> Result<HarvestBatch, HarvestError> {
        load(page, url, &self.pacing).await?;
        traverse(page, url, &self.listings, self, &self.pacing).await
    }
}

#[async_trait]
impl ListingCapture for StaticCardAdapter {
    async fn capture<P: Page>(
        &self,
        page: &P,
        _base: &Url,
        listing: &P::Element,
    ) -> Result<ListingFragment, PageError> {
        page.outer_html(listing).await.map(ListingFragment::new)
    }
}

#[async_trait]
impl Harvest for DrillDownAdapter {
    async fn harvest<P: Page>(&self, page: &P, url: &Url) -> Result<HarvestBatch, HarvestError> {
        load(page, url, &self.pacing).await?;
        traverse(page, url, &self.listings, self, &self.pacing).await
    }
}

impl DrillDownAdapter {
    async fn read_detail<P: Page>(&self, page: &P) -> Result<String, PageError> {
        sleep(self.pacing.after_tab_open()).await;
        let region = page.wait_for_present(&self.detail_region, self.wait).await?;
        page.outer_html(&region).await
    }
}

#[async_trait]
impl ListingCapture for DrillDownAdapter {
    async fn capture<P: Page>(
        &self,
        page: &P,
        base: &Url,
        listing: &P::Element,
    ) -> Result<ListingFragment, PageError> {
        let listing_html = page.outer_html(listing).await?;
        let link = page.find_within(listing, &self.detail_link).await?;
        let href = page
            .attribute(&link, "href")
            .await?
            .ok_or_else(|| PageError::NotFound {
                what: format!("href on {}", self.detail_link),
            })?;
        let target = resolve_link(base, &href)?;

        let origin = page.current_window().await?;
        let (detail, closed) = match page.open_tab(target.as_str()).await {
            Ok(_) => {
                let detail = self.read_detail(page).await;
                (detail, page.close_window().await)
            }
            Err(e) => (Err(e), Ok(())),
        };
        let returned = page.switch_to(&origin).await;
        sleep(self.pacing.after_tab_close()).await;

        // Window errors come first: a listing can only be skipped once the
        // origin window is active again.
        returned?;
        closed?;
        Ok(ListingFragment::with_secondary(listing_html, &detail?))
    }
}

fn resolve_link(base: &Url, href: &str) -> Result<Url, PageError> {
    base.join(href).map_err(|e| PageError::NotFound {
        what: format!("usable detail link `{}` ({})", href, e),
    })
}

#[async_trait]
impl Harvest for DisclosureModalAdapter {
    async fn harvest<P: Page>(&self, page: &P, url: &Url) -> Result<HarvestBatch, HarvestError> {
        load(page, url, &self.pacing).await?;
        traverse(page, url, &self.listings, self, &self.pacing).await
    }
}

impl DisclosureModalAdapter {
    async fn read_modal<P: Page>(&self, page: &P) -> Result<String, PageError> {
        let modal = page.wait_for_visible(&self.modal, self.wait).await?;
        page.outer_html(&modal).await
    }

    async fn dismiss<P: Page>(&self, page: &P) -> Result<(), PageError> {
        let close = page
            .find_all(&self.dismiss)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PageError::NotFound {
                what: self.dismiss.to_string(),
            })?;
        page.script_click(&close).await
    }
}

#[async_trait]
impl ListingCapture for DisclosureModalAdapter {
    async fn capture<P: Page>(
        &self,
        page: &P,
        _base: &Url,
        listing: &P::Element,
    ) -> Result<ListingFragment, PageError> {
        let listing_html = page.outer_html(listing).await?;
        let trigger = page.find_within(listing, &self.trigger).await?;
        page.scroll_into_view(&trigger).await?;
        sleep(self.pacing.after_scroll()).await;
        page.script_click(&trigger).await?;

        let modal = self.read_modal(page).await;
        let dismissed = self.dismiss(page).await;
        let modal_html = modal?;
        dismissed?;

        Ok(ListingFragment::with_secondary(listing_html, &modal_html))
    }
}

#[async_trait]
impl Harvest for FullPageAdapter {
    async fn harvest<P: Page>(&self, page: &P, url: &Url) -> Result<HarvestBatch, HarvestError> {
        load(page, url, &self.pacing).await?;
        page.scroll_to_bottom().await?;
        sleep(self.pacing.after_scroll()).await;

        let mut batch = HarvestBatch::default();
        batch.push(ListingFragment::new(page.page_source().await?));
        Ok(batch)
    }
}
