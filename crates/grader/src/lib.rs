//! Contact Cards Grader
//!
//! Grades the contact cards web assignment by driving a real browser against
//! a freshly staged copy of the student's app:
//! - Stages the app and sample images into run-scoped directories
//! - Spawns the app server and waits for its readiness markers
//! - Drives Chrome through a WebDriver process
//! - Runs the scenario steps in order and sums their points
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Grader (Rust)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Fixture                                                    │
//! │    ├── workspace::stage() -> StagedApp                      │
//! │    ├── AppServer::spawn() (readiness markers, bounded)      │
//! │    ├── DriverProcess::spawn() + WebDriverSession::open()    │
//! │    └── Page (navigate, refresh, bounded waits)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StepRunner<ContactCards>                                   │
//! │    ├── setup: register three users                          │
//! │    ├── step1..step8 in declaration order                    │
//! │    └── Stop halts, any other failure scores zero            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Report: line items + TOTAL GRADE                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod config;
pub mod contact_cards;
pub mod error;
pub mod fixture;
pub mod grader;
pub mod page;
pub mod report;
pub mod runner;
pub mod server;
pub mod users;
pub mod webdriver;
pub mod workspace;

pub use browser::{Browser, ElementRef, Locator};
pub use config::GraderConfig;
pub use error::{GradeError, GradeResult};
pub use grader::Grader;
pub use page::{Page, Timing};
pub use report::Report;
pub use runner::{Award, Step, StepError, StepRunner};
