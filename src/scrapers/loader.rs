use crate::scrapers::error::ScrapeError;
use crate::scrapers::traits::PageDriver;
use crate::scrapers::types::{LoaderConfig, Quiescence};
use anyhow::anyhow;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the scroll loop did while materializing a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub scrolls: usize,
    pub measurements: usize,
    /// Height stopped growing before the iteration ceiling
    pub converged: bool,
    pub final_height: Option<u64>,
}

/// Navigate to `url` and scroll until lazily loaded content stops growing.
///
/// Only navigation can fail. Idle-wait timeouts and scroll or measurement
/// errors end the corresponding step and the page is used as loaded so far.
pub fn load_page<D: PageDriver>(
    driver: &D,
    url: &str,
    config: &LoaderConfig,
) -> Result<LoadReport, ScrapeError> {
    info!("Navigating to: {}", url);
    driver
        .navigate(url, config.navigation_timeout)
        .map_err(|source| ScrapeError::Navigation {
            url: url.to_string(),
            source,
        })?;

    settle(driver, config.initial_idle_timeout);
    pause(config.settle_delay);

    let mut report = LoadReport::default();
    let mut previous_height = 0;

    for iteration in 1..=config.max_scrolls {
        if let Err(e) = driver.scroll_to_bottom() {
            warn!("Scroll {} failed, keeping what has loaded: {:#}", iteration, e);
            break;
        }
        report.scrolls = iteration;

        pause(config.scroll_pause);
        settle(driver, config.scroll_idle_timeout);

        let height = match driver.document_height() {
            Ok(height) => height,
            Err(e) => {
                warn!("Could not measure page height, keeping what has loaded: {:#}", e);
                break;
            }
        };
        report.measurements += 1;
        report.final_height = Some(height);
        debug!("Scroll {}: page height {}", iteration, height);

        if height == previous_height {
            report.converged = true;
            break;
        }
        previous_height = height;
    }

    info!(
        "Page loaded after {} scrolls, {} height checks ({})",
        report.scrolls,
        report.measurements,
        if report.converged {
            "content stopped growing"
        } else {
            "scroll limit reached"
        }
    );
    Ok(report)
}

/// Load the page and return its rendered HTML.
///
/// A snapshot failure degrades to an empty document.
pub fn materialize<D: PageDriver>(
    driver: &D,
    url: &str,
    config: &LoaderConfig,
) -> Result<String, ScrapeError> {
    let report = load_page(driver, url, config)?;
    match driver.content() {
        Ok(html) => {
            debug!(
                "Captured {} bytes of HTML at height {:?}",
                html.len(),
                report.final_height
            );
            Ok(html)
        }
        Err(e) => {
            warn!("Could not capture page HTML: {:#}", e);
            Ok(String::new())
        }
    }
}

/// Bounded idle wait. A timeout or a failing wait both mean "carry on".
fn settle<D: PageDriver>(driver: &D, timeout: Duration) -> Quiescence {
    match driver.wait_for_quiescence(timeout) {
        Ok(Quiescence::Idle) => Quiescence::Idle,
        Ok(Quiescence::TimedOut) => {
            debug!("Network still busy after {:?}, continuing", timeout);
            Quiescence::TimedOut
        }
        Err(e) => {
            warn!("Idle wait failed, continuing: {:#}", e);
            Quiescence::TimedOut
        }
    }
}

/// Run `task` on its own thread and give up on it after `timeout`.
///
/// A task that overruns is abandoned, not cancelled; it finishes or fails
/// on its own once the browser behind it goes away.
pub fn with_deadline<T, F>(timeout: Duration, task: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("page-call".to_string())
        .spawn(move || {
            // receiver is gone once the deadline has passed
            let _ = tx.send(task());
        })
        .map_err(|e| anyhow!("Could not start page call: {}", e))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(anyhow!("Timed out after {:?}", timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("Page call stopped without a result")),
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
