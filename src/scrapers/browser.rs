use crate::models::Listing;
use crate::scrapers::error::ScrapeError;
use crate::scrapers::extractor::ListingExtractor;
use crate::scrapers::loader::{materialize, with_deadline};
use crate::scrapers::rules::ExtractionRules;
use crate::scrapers::traits::{PageDriver, ScraperTrait};
use crate::scrapers::types::{LoaderConfig, Quiescence, ScrapeParams};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::protocol::cdp::Runtime::RemoteObject;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Chrome drops its connection when no events arrive for this long
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound for a single script evaluation or HTML snapshot
const PAGE_CALL_TIMEOUT: Duration = Duration::from_secs(20);

/// Requests the page has started and not yet finished, as reported by
/// DevTools network events.
#[derive(Debug)]
pub struct NetworkActivity {
    open: HashSet<String>,
    /// When the last open request finished; `None` while any is open
    quiet_since: Option<Instant>,
}

impl NetworkActivity {
    pub fn new(now: Instant) -> Self {
        Self {
            open: HashSet::new(),
            quiet_since: Some(now),
        }
    }

    /// Redirects reuse the request id, so a request is counted once
    pub fn request_started(&mut self, request_id: &str) {
        self.open.insert(request_id.to_string());
        self.quiet_since = None;
    }

    /// Finished or failed. Ids never seen as started are ignored.
    pub fn request_finished(&mut self, request_id: &str, now: Instant) {
        if self.open.remove(request_id) && self.open.is_empty() {
            self.quiet_since = Some(now);
        }
    }

    pub fn in_flight(&self) -> usize {
        self.open.len()
    }

    /// No request open, and none for at least `window`
    pub fn is_idle(&self, now: Instant, window: Duration) -> bool {
        self.quiet_since
            .is_some_and(|since| now.saturating_duration_since(since) >= window)
    }
}

/// A single Chrome tab. Chrome shuts down when this is dropped.
pub struct ChromePage {
    tab: Arc<Tab>,
    _browser: Browser,
    activity: Arc<Mutex<NetworkActivity>>,
    idle_window: Duration,
    poll_interval: Duration,
}

impl ChromePage {
    /// Launch Chrome and open one tab with network tracking enabled
    pub fn launch(headless: bool, config: &LoaderConfig) -> Result<Self, ScrapeError> {
        info!(
            "Launching {} Chrome...",
            if headless { "headless" } else { "visible" }
        );

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .idle_browser_timeout(BROWSER_IDLE_TIMEOUT.max(config.navigation_timeout))
            .build()
            .context("Failed to build launch options")
            .map_err(ScrapeError::Launch)?;

        let browser = Browser::new(options)
            .context("Failed to launch Chrome browser")
            .map_err(ScrapeError::Launch)?;

        let tab = browser
            .new_tab()
            .context("Failed to open a browser tab")
            .map_err(ScrapeError::Launch)?;

        let activity = Arc::new(Mutex::new(NetworkActivity::new(Instant::now())));
        track_network(&tab, Arc::clone(&activity))
            .context("Failed to enable network tracking")
            .map_err(ScrapeError::Launch)?;

        Ok(Self {
            tab,
            _browser: browser,
            activity,
            idle_window: config.idle_window,
            poll_interval: config.poll_interval,
        })
    }

    fn evaluate(&self, expression: &'static str) -> Result<RemoteObject> {
        let tab = Arc::clone(&self.tab);
        with_deadline(PAGE_CALL_TIMEOUT, move || tab.evaluate(expression, false))
            .with_context(|| format!("Evaluating `{}`", expression))
    }
}

/// Feed the tab's request lifecycle events into `activity`
fn track_network(tab: &Arc<Tab>, activity: Arc<Mutex<NetworkActivity>>) -> Result<()> {
    tab.call_method(Network::Enable {
        max_total_buffer_size: None,
        max_resource_buffer_size: None,
        max_post_data_size: None,
        report_direct_socket_traffic: None,
        enable_durable_messages: None,
    })?;

    tab.add_event_listener(Arc::new(move |event: &Event| {
        let Ok(mut activity) = activity.lock() else {
            return;
        };
        match event {
            Event::NetworkRequestWillBeSent(e) => activity.request_started(&e.params.request_id),
            Event::NetworkLoadingFinished(e) => {
                activity.request_finished(&e.params.request_id, Instant::now())
            }
            Event::NetworkLoadingFailed(e) => {
                activity.request_finished(&e.params.request_id, Instant::now())
            }
            _ => {}
        }
    }))?;
    Ok(())
}

impl PageDriver for ChromePage {
    fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        self.tab.set_default_timeout(timeout);
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        with_deadline(timeout, move || {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
    }

    fn wait_for_quiescence(&self, timeout: Duration) -> Result<Quiescence> {
        let started = Instant::now();

        loop {
            let (idle, in_flight) = {
                let activity = self
                    .activity
                    .lock()
                    .map_err(|_| anyhow!("Network tracker lock poisoned"))?;
                (
                    activity.is_idle(Instant::now(), self.idle_window),
                    activity.in_flight(),
                )
            };
            if idle {
                debug!("Network idle after {:?}", started.elapsed());
                return Ok(Quiescence::Idle);
            }

            if started.elapsed() >= timeout {
                debug!("{} requests still in flight", in_flight);
                return Ok(Quiescence::TimedOut);
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn scroll_to_bottom(&self) -> Result<()> {
        self.evaluate("window.scrollTo(0, document.body.scrollHeight)")?;
        Ok(())
    }

    fn document_height(&self) -> Result<u64> {
        let result = self.evaluate("document.body.scrollHeight")?;
        result
            .value
            .as_ref()
            .and_then(|value| value.as_f64())
            .map(|height| height.max(0.0) as u64)
            .ok_or_else(|| anyhow!("document.body.scrollHeight is not a number"))
    }

    fn content(&self) -> Result<String> {
        let tab = Arc::clone(&self.tab);
        with_deadline(PAGE_CALL_TIMEOUT, move || tab.get_content())
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("Tab close failed: {:#}", e);
        }
        info!("Browser closed");
    }
}

/// Browser-based scraper for classifieds search pages
#[derive(Debug, Clone)]
pub struct ClassifiedsBrowserScraper {
    params: ScrapeParams,
    loader: LoaderConfig,
    rules: ExtractionRules,
}

impl ClassifiedsBrowserScraper {
    pub fn new(params: ScrapeParams) -> Self {
        Self {
            params,
            loader: LoaderConfig::default(),
            rules: ExtractionRules::default(),
        }
    }

    pub fn with_loader_config(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_rules(mut self, rules: ExtractionRules) -> Self {
        self.rules = rules;
        self
    }

    /// Launch Chrome, materialize the search page and extract its listings.
    ///
    /// The browser is released before parsing starts, and on every error path.
    pub fn scrape_blocking(&self) -> Result<Vec<Listing>, ScrapeError> {
        let extractor = ListingExtractor::new(&self.rules);

        let html = {
            let page = ChromePage::launch(self.params.headless, &self.loader)?;
            materialize(&page, &self.params.url, &self.loader)?
        };

        Ok(extractor.extract(&html, self.params.max_items))
    }
}

#[async_trait]
impl ScraperTrait for ClassifiedsBrowserScraper {
    async fn scrape(&self) -> Result<Vec<Listing>> {
        let scraper = self.clone();
        let listings = tokio::task::spawn_blocking(move || scraper.scrape_blocking())
            .await
            .map_err(|e| ScrapeError::Worker(e.to_string()))??;
        Ok(listings)
    }

    fn source_name(&self) -> &'static str {
        "Classifieds"
    }
}
