//! Error types for the grader

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradeError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server announced its address before the app loaded (port {0} is probably in use)")]
    StartupAborted(u16),

    #[error("Port {0} is already in use")]
    PortInUse(u16),

    #[error("Server not ready after {0:?}")]
    ServerReadinessTimeout(Duration),

    #[error("WebDriver not found: {0}")]
    DriverNotFound(String),

    #[error("WebDriver health check failed after {0} attempts")]
    DriverHealthCheck(usize),

    #[error("WebDriver error: {error} - {message}")]
    WebDriver { error: String, message: String },

    #[error("No element matches {0}")]
    NoSuchElement(String),

    #[error("Fixture is not running")]
    NotStarted,

    #[error("Staging error: {0}")]
    Staging(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Common(#[from] cardgrade_common::Error),
}

impl GradeError {
    /// Errors that must abort the whole grading run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GradeError::ServerStartup(_)
                | GradeError::StartupAborted(_)
                | GradeError::PortInUse(_)
                | GradeError::ServerReadinessTimeout(_)
                | GradeError::DriverNotFound(_)
                | GradeError::DriverHealthCheck(_)
                | GradeError::NotStarted
                | GradeError::Staging(_)
        )
    }
}

pub type GradeResult<T> = Result<T, GradeError>;
