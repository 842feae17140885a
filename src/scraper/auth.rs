use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::app::{CrawlerError, Result};
use crate::browser::{Page, WaitState};
use crate::config::{Config, SelectorConfig, TimeoutConfig};
use crate::domain::Credentials;
use crate::progress::ProgressReporter;
use crate::scraper::ScrapeConfig;

const UNREADABLE_LOGIN_ERROR: &str = "Login error element found, but could not get text.";

/// Result of a login that reached the success marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub landing_url: String,
}

#[derive(Debug)]
enum Outcome {
    Accepted,
    Rejected,
    Undecided,
}

/// Drives a site's login form.
///
/// The page is left on whatever the site shows after a successful login.
/// Credentials never reach the progress stream or the logs; only the
/// selectors being filled are reported.
pub struct Authenticator {
    selectors: SelectorConfig,
    timeouts: TimeoutConfig,
    pacing: ScrapeConfig,
}

impl Authenticator {
    pub fn new(selectors: SelectorConfig, timeouts: TimeoutConfig, pacing: ScrapeConfig) -> Self {
        Self {
            selectors,
            timeouts,
            pacing,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.selectors.clone(),
            config.timeouts.clone(),
            config.scrape.clone(),
        )
    }

    pub async fn login(
        &self,
        page: &dyn Page,
        credentials: &Credentials,
        progress: &ProgressReporter,
    ) -> Result<LoginSuccess> {
        progress.info(format!("Navigating to login page: {}", credentials.url));
        page.goto(&credentials.url, self.timeouts.navigation()).await?;

        progress.dev(format!(
            "Filling username field ({})...",
            self.selectors.username_field
        ));
        self.fill(page, &self.selectors.username_field, &credentials.username)
            .await?;
        sleep(self.pacing.typing_pause()).await;

        progress.dev(format!(
            "Filling password field ({})...",
            self.selectors.password_field
        ));
        self.fill(page, &self.selectors.password_field, &credentials.password)
            .await?;
        sleep(self.pacing.typing_pause()).await;

        progress.info("Submitting login form...");
        page.click(&self.selectors.login_button, self.timeouts.click())
            .await
            .map_err(|e| self.missing_on_timeout(e, &self.selectors.login_button))?;

        progress.dev("Waiting for login outcome...");
        match self.await_outcome(page).await? {
            Outcome::Accepted => {
                let landing_url = page.current_url().await?;
                progress.success("Login successful (success indicator found).");
                Ok(LoginSuccess { landing_url })
            }
            Outcome::Rejected => {
                let reason = self.read_login_error(page).await;
                progress.warn(format!("Login error message detected: {}", reason));
                Err(CrawlerError::CredentialsRejected(reason))
            }
            Outcome::Undecided => Err(CrawlerError::LoginTimeout(
                self.timeouts.login_outcome().as_secs(),
            )),
        }
    }

    async fn fill(&self, page: &dyn Page, selector: &str, value: &str) -> Result<()> {
        page.fill(selector, value, self.timeouts.form_fill())
            .await
            .map_err(|e| self.missing_on_timeout(e, selector))
    }

    fn missing_on_timeout(&self, err: CrawlerError, selector: &str) -> CrawlerError {
        if err.is_timeout() {
            CrawlerError::FormFieldMissing(selector.to_string())
        } else {
            err
        }
    }

    /// Race the success marker against the error marker.
    ///
    /// A branch that times out is dropped and the other keeps waiting;
    /// only when both run out is the outcome undecided.
    async fn await_outcome(&self, page: &dyn Page) -> Result<Outcome> {
        let limit = self.timeouts.login_outcome();
        let success = page.wait_for_selector(&self.selectors.login_success, WaitState::Visible, limit);
        let failure = page.wait_for_selector(&self.selectors.login_error, WaitState::Visible, limit);
        tokio::pin!(success, failure);

        let mut success_done = false;
        let mut failure_done = false;
        let deadline = sleep(limit + Duration::from_secs(1));
        tokio::pin!(deadline);

        while !(success_done && failure_done) {
            tokio::select! {
                biased;
                res = &mut success, if !success_done => match res {
                    Ok(()) => return Ok(Outcome::Accepted),
                    Err(e) if e.is_timeout() => success_done = true,
                    Err(e) => return Err(e),
                },
                res = &mut failure, if !failure_done => match res {
                    Ok(()) => return Ok(Outcome::Rejected),
                    Err(e) if e.is_timeout() => failure_done = true,
                    Err(e) => return Err(e),
                },
                _ = &mut deadline => break,
            }
        }
        Ok(Outcome::Undecided)
    }

    async fn read_login_error(&self, page: &dyn Page) -> String {
        let text = match page.query_selector(&self.selectors.login_error).await {
            Ok(Some(element)) => element.inner_text().await.ok().flatten(),
            Ok(None) => None,
            Err(e) => {
                debug!("Reading login error text failed: {}", e);
                None
            }
        };
        text.map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNREADABLE_LOGIN_ERROR.to_string())
    }
}
