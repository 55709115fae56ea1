//! Grading run orchestration
//!
//! INIT -> SETUP -> RUN_STEPS -> TEARDOWN -> REPORTED. Teardown happens on
//! every path once the fixture is up; a fixture or setup failure is returned
//! as an error instead of a report.

use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::GraderConfig;
use crate::contact_cards::{self, ContactCards};
use crate::error::GradeResult;
use crate::fixture::Fixture;
use crate::page::Page;
use crate::report::Report;
use crate::runner::StepRunner;

pub struct Grader {
    config: GraderConfig,
}

impl Grader {
    pub fn new(config: GraderConfig) -> Self {
        Self { config }
    }

    /// Grade the configured app end to end and print the report
    pub async fn run(&self) -> GradeResult<Report> {
        info!("Phase: init");
        let mut fixture = Fixture::new(self.config.clone());
        fixture.start().await?;

        let images = fixture.images().to_vec();
        let graded = match fixture.page() {
            Ok(page) => grade_page(page, images).await,
            Err(e) => Err(e),
        };

        info!("Phase: teardown");
        if self.config.debug {
            if let Err(e) = fixture.dump_database() {
                warn!("Could not read the app database: {}", e);
            }
        }
        if let Err(e) = fixture.stop().await {
            warn!("Teardown failed: {}", e);
        }

        let report = graded?;
        report.print();
        if let Some(path) = &self.config.results_path {
            report.write_json(path)?;
        }

        info!("Phase: reported (total {})", report.total);
        Ok(report)
    }
}

/// Register the users and run every step against an attached page
pub async fn grade_page(page: &mut Page, images: Vec<PathBuf>) -> GradeResult<Report> {
    let mut cx = ContactCards::new(page, images);
    grade_context(&mut cx).await
}

/// Setup and step phases over a prepared context
pub async fn grade_context(cx: &mut ContactCards<'_>) -> GradeResult<Report> {
    info!("Phase: setup");
    cx.setup().await?;

    info!("Phase: run steps");
    let runner = StepRunner::new(contact_cards::steps());
    info!("Steps: {}", runner.names().join(", "));
    let outcome = runner.run(cx).await;
    if let Some(reason) = &outcome.halted {
        warn!("Grading halted early: {}", reason);
    }

    Ok(Report::from_outcome(outcome))
}
