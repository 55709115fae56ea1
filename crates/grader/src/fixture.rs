//! Fixture controller
//!
//! Owns everything a grading run stands up: the staged app, the app server
//! process, the WebDriver process and the browser session on top of it.

use cardgrade_common::ContactStore;
use tracing::{info, warn};

use crate::config::GraderConfig;
use crate::error::{GradeError, GradeResult};
use crate::page::Page;
use crate::server::AppServer;
use crate::webdriver::{DriverProcess, WebDriverSession};
use crate::workspace::{self, StagedApp};

pub struct Fixture {
    config: GraderConfig,
    staged: Option<StagedApp>,
    server: Option<AppServer>,
    driver: Option<DriverProcess>,
    page: Option<Page>,
}

impl Fixture {
    pub fn new(config: GraderConfig) -> Self {
        Self {
            config,
            staged: None,
            server: None,
            driver: None,
            page: None,
        }
    }

    /// Stage the app, start the server and attach a browser
    ///
    /// Anything already started is torn down again if a later stage fails.
    pub async fn start(&mut self) -> GradeResult<()> {
        if self.page.is_some() {
            return Ok(()); // Already running
        }

        match self.start_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(stop_err) = self.stop().await {
                    warn!("Teardown after failed start also failed: {}", stop_err);
                }
                Err(e)
            }
        }
    }

    async fn start_inner(&mut self) -> GradeResult<()> {
        let staged = workspace::stage(&self.config.staging)?;

        let server = AppServer::spawn(&self.config.server, &staged).await?;
        let base_url = server.base_url().to_string();
        self.server = Some(server);

        let driver = DriverProcess::spawn(&self.config.driver).await?;
        let session = WebDriverSession::open(&driver.url, &self.config.driver).await?;
        self.driver = Some(driver);

        self.page = Some(Page::new(
            Box::new(session),
            base_url,
            staged.app_name.clone(),
            self.config.timing.clone(),
        ));
        self.staged = Some(staged);
        Ok(())
    }

    /// Tear down browser, driver and server; safe to call repeatedly
    pub async fn stop(&mut self) -> GradeResult<()> {
        if let Some(mut page) = self.page.take() {
            if let Err(e) = page.quit().await {
                warn!("Failed to close browser session: {}", e);
            }
        }
        // A detached (debug) browser stays open after its driver exits.
        if let Some(mut driver) = self.driver.take() {
            driver.stop()?;
        }
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.page.is_some()
    }

    /// Browser side of the fixture
    pub fn page(&mut self) -> GradeResult<&mut Page> {
        self.page.as_mut().ok_or(GradeError::NotStarted)
    }

    /// Sample images staged for upload steps
    pub fn images(&self) -> &[std::path::PathBuf] {
        self.staged.as_ref().map(|s| s.images.as_slice()).unwrap_or(&[])
    }

    /// Log how many cards each user ended up with in the app's database
    pub fn dump_database(&self) -> GradeResult<()> {
        let Some(staged) = &self.staged else {
            return Ok(());
        };
        let path = staged.database_path();
        if !path.exists() {
            info!("No database written at {}", path.display());
            return Ok(());
        }

        let store = ContactStore::open_read_only(&path)?;
        for (owner, count) in store.owners()? {
            info!("{} owns {} contact card(s)", owner, count);
        }
        Ok(())
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("Fixture dropped while running; killing processes");
        }
        self.page = None;
        if let Some(mut driver) = self.driver.take() {
            let _ = driver.stop();
        }
        if let Some(mut server) = self.server.take() {
            let _ = server.stop();
        }
    }
}
