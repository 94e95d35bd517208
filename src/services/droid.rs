use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::{
    error::WebDriverError, prelude::*, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver,
    WindowHandle,
};

use crate::{configuration::WebDriverSettings, domain::site::Locator};

use super::{Page, PageError};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A Chrome session driven over WebDriver.
pub struct Droid {
    pub driver: WebDriver,
}

impl Droid {
    pub async fn new(settings: &WebDriverSettings) -> Result<Self, PageError> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--disable-gpu").map_err(driver_error)?;
        caps.add_arg("--disable-dev-shm-usage").map_err(driver_error)?;
        caps.add_arg(&format!(
            "--window-size={},{}",
            settings.window_width, settings.window_height
        ))
        .map_err(driver_error)?;
        caps.add_arg(&format!(
            "--user-agent={}",
            fake_user_agent::get_chrome_rua()
        ))
        .map_err(driver_error)?;
        if settings.headless {
            caps.add_arg("--headless=new").map_err(driver_error)?;
        }

        let driver = WebDriver::new(settings.url.as_str(), caps)
            .await
            .map_err(driver_error)?;

        log::info!("Started browser session at {}", settings.url);
        Ok(Droid { driver })
    }
}

fn by(locator: &Locator) -> By {
    match locator {
        Locator::Css(selector) => By::Css(selector.as_str()),
        Locator::LinkText(text) => By::LinkText(text.as_str()),
    }
}

fn driver_error(e: WebDriverError) -> PageError {
    match e {
        WebDriverError::StaleElementReference(_) => PageError::StaleReference,
        other => PageError::Driver(other.to_string()),
    }
}

fn lookup_error(locator: &Locator) -> impl Fn(WebDriverError) -> PageError + '_ {
    move |e| match e {
        WebDriverError::NoSuchElement(_) => PageError::NotFound {
            what: locator.to_string(),
        },
        other => driver_error(other),
    }
}

fn wait_error(locator: &Locator) -> impl Fn(WebDriverError) -> PageError + '_ {
    move |e| match e {
        WebDriverError::NoSuchElement(_) | WebDriverError::Timeout(_) => PageError::Timeout {
            what: locator.to_string(),
        },
        other => driver_error(other),
    }
}

#[async_trait]
impl Page for Droid {
    type Element = WebElement;
    type Window = WindowHandle;

    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.driver.goto(url).await.map_err(driver_error)
    }

    async fn page_source(&self) -> Result<String, PageError> {
        self.driver.source().await.map_err(driver_error)
    }

    async fn scroll_to_bottom(&self) -> Result<(), PageError> {
        self.driver
            .execute("window.scrollTo(0, document.body.scrollHeight);", vec![])
            .await
            .map(|_| ())
            .map_err(driver_error)
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<WebElement>, PageError> {
        self.driver
            .find_all(by(locator))
            .await
            .map_err(lookup_error(locator))
    }

    async fn find_within(
        &self,
        parent: &WebElement,
        locator: &Locator,
    ) -> Result<WebElement, PageError> {
        parent.find(by(locator)).await.map_err(lookup_error(locator))
    }

    async fn outer_html(&self, element: &WebElement) -> Result<String, PageError> {
        element.outer_html().await.map_err(driver_error)
    }

    async fn attribute(
        &self,
        element: &WebElement,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        element.attr(name).await.map_err(driver_error)
    }

    async fn wait_for_present(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<WebElement, PageError> {
        self.driver
            .query(by(locator))
            .wait(timeout, POLL_INTERVAL)
            .first()
            .await
            .map_err(wait_error(locator))
    }

    async fn wait_for_visible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<WebElement, PageError> {
        self.driver
            .query(by(locator))
            .and_displayed()
            .wait(timeout, POLL_INTERVAL)
            .first()
            .await
            .map_err(wait_error(locator))
    }

    async fn scroll_into_view(&self, element: &WebElement) -> Result<(), PageError> {
        let arg = element.to_json().map_err(driver_error)?;
        self.driver
            .execute("arguments[0].scrollIntoView();", vec![arg])
            .await
            .map(|_| ())
            .map_err(driver_error)
    }

    async fn script_click(&self, element: &WebElement) -> Result<(), PageError> {
        let arg = element.to_json().map_err(driver_error)?;
        self.driver
            .execute("arguments[0].click();", vec![arg])
            .await
            .map(|_| ())
            .map_err(driver_error)
    }

    async fn current_window(&self) -> Result<WindowHandle, PageError> {
        self.driver.window().await.map_err(driver_error)
    }

    async fn open_tab(&self, url: &str) -> Result<WindowHandle, PageError> {
        let handle = self.driver.new_tab().await.map_err(driver_error)?;
        self.driver
            .switch_to_window(handle.clone())
            .await
            .map_err(driver_error)?;
        if let Err(e) = self.driver.goto(url).await {
            if let Err(close) = self.driver.close_window().await {
                log::warn!("Failed to close tab after navigation error: {}", close);
            }
            return Err(driver_error(e));
        }
        Ok(handle)
    }

    async fn close_window(&self) -> Result<(), PageError> {
        self.driver.close_window().await.map_err(driver_error)
    }

    async fn switch_to(&self, window: &WindowHandle) -> Result<(), PageError> {
        self.driver
            .switch_to_window(window.clone())
            .await
            .map_err(driver_error)
    }

    async fn quit(self) -> Result<(), PageError> {
        log::info!("Closing browser session");
        self.driver.quit().await.map_err(driver_error)
    }
}
