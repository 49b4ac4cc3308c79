use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use thirtyfour::{prelude::*, CapabilitiesHelper, Proxy};

use crate::{configuration::BrowserSettings, domain::proxy::ProxySpec};

use super::PageSession;

const SCROLL_BY_SCRIPT: &str = "window.scrollBy(0, arguments[0]);";
const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, Math.max(document.body.scrollHeight, document.documentElement.scrollHeight));";
const HEIGHT_SCRIPT: &str = "return Math.max(document.body.scrollHeight, document.documentElement.scrollHeight);";
const COUNT_SCRIPT: &str = "return document.querySelectorAll(arguments[0]).length;";

pub struct Droid {
    pub driver: WebDriver,
}

impl Droid {
    pub async fn new(settings: &BrowserSettings, proxy: Option<&ProxySpec>) -> anyhow::Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        if settings.headless {
            caps.set_headless()?;
        }
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        caps.add_arg("--disable-blink-features=AutomationControlled")?;

        let user_agent = match &settings.user_agent {
            Some(ua) => ua.clone(),
            None => fake_user_agent::get_chrome_rua().to_string(),
        };
        caps.add_arg(&format!("--user-agent={}", user_agent))?;

        if let Some(proxy) = proxy {
            log::info!("Using proxy: {}", proxy.endpoint());
            let proxy_url = proxy.to_url()?;
            caps.set_proxy(Proxy::Manual {
                ftp_proxy: None,
                http_proxy: Some(proxy_url.clone()),
                ssl_proxy: Some(proxy_url),
                socks_proxy: None,
                socks_version: None,
                socks_username: None,
                socks_password: None,
                no_proxy: None,
            })?;
        }

        let driver = WebDriver::new(settings.webdriver_url.as_str(), caps)
            .await
            .with_context(|| format!("WebDriver unreachable at {}", settings.webdriver_url))?;

        if let Err(e) = driver
            .set_page_load_timeout(settings.page_load_timeout())
            .await
        {
            log::warn!("Could not set page load timeout: {:?}", e);
        }

        Ok(Droid { driver })
    }

    pub async fn quit(self) {
        match self.driver.quit().await {
            Ok(_) => log::info!("Browser session closed"),
            Err(e) => log::error!("Failed to close browser session: {:?}", e),
        }
    }
}

#[async_trait]
impl PageSession for Droid {
    async fn open(&self, url: &str) -> anyhow::Result<()> {
        self.driver
            .goto(url)
            .await
            .with_context(|| format!("Failed to load {}", url))
    }

    async fn current_url(&self) -> anyhow::Result<String> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn page_source(&self) -> anyhow::Result<String> {
        Ok(self.driver.source().await?)
    }

    async fn scroll_by(&self, pixels: u32) -> anyhow::Result<()> {
        self.driver
            .execute(SCROLL_BY_SCRIPT, vec![json!(pixels)])
            .await?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> anyhow::Result<()> {
        self.driver.execute(SCROLL_TO_BOTTOM_SCRIPT, vec![]).await?;
        Ok(())
    }

    async fn document_height(&self) -> anyhow::Result<u64> {
        let ret = self.driver.execute(HEIGHT_SCRIPT, vec![]).await?;
        Ok(ret.convert::<u64>()?)
    }

    async fn count_elements(&self, selector: &str) -> anyhow::Result<usize> {
        let ret = self
            .driver
            .execute(COUNT_SCRIPT, vec![json!(selector)])
            .await?;
        Ok(ret.convert::<usize>()?)
    }

    async fn click_link(
        &self,
        partial_text: &str,
        wait: Duration,
        poll: Duration,
    ) -> anyhow::Result<bool> {
        let found = self
            .driver
            .query(By::PartialLinkText(partial_text.to_string()))
            .wait(wait, poll)
            .and_clickable()
            .first()
            .await;

        match found {
            Ok(link) => {
                link.click().await?;
                Ok(true)
            }
            Err(e) => {
                log::debug!("No `{}` link: {:?}", partial_text, e);
                Ok(false)
            }
        }
    }
}
