//! Grader configuration
//!
//! Every field has a default, so `grader.toml` only needs the values that
//! differ from a standard run. Command-line flags are applied on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GradeError, GradeResult};
use crate::page::Timing;
use crate::server::ServerConfig;
use crate::webdriver::DriverConfig;
use crate::workspace::StagingConfig;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "grader.toml";

/// Top-level grader configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    /// Where the app and sample images come from and are staged to
    pub staging: StagingConfig,

    /// App server process
    pub server: ServerConfig,

    /// WebDriver process and browser session
    pub driver: DriverConfig,

    /// Settle and wait timings for page interaction
    pub timing: Timing,

    /// Leave the browser visible and open after the run
    pub debug: bool,

    /// Also write the report as JSON here
    pub results_path: Option<PathBuf>,
}

impl GraderConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> GradeResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply the `--debug` and `--port` flags on top of the file
    pub fn apply_cli(&mut self, debug: bool, port: Option<u16>) {
        if let Some(port) = port {
            self.server.port = port;
        }
        self.debug |= debug;
        if self.debug {
            self.driver.headless = false;
            self.driver.detach = true;
        }
    }

    pub fn validate(&self) -> GradeResult<()> {
        if self.server.port == 0 {
            return Err(GradeError::InvalidConfig(
                "server port must be non-zero".to_string(),
            ));
        }
        if self.server.startup_timeout_ms == 0 || self.driver.startup_timeout_ms == 0 {
            return Err(GradeError::InvalidConfig(
                "startup timeouts must be positive".to_string(),
            ));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(GradeError::InvalidConfig(
                "poll interval must be positive".to_string(),
            ));
        }
        if self.staging.app_name().is_none() {
            return Err(GradeError::InvalidConfig(format!(
                "cannot derive an app name from {}",
                self.staging.app_path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GraderConfig::load(&dir.path().join("grader.toml")).unwrap();
        assert_eq!(config.server.port, 8800);
        assert_eq!(config.server.command, "py4web");
        assert!(config.driver.headless);
        assert!(!config.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grader.toml");
        std::fs::write(
            &path,
            r#"
results_path = "out/grade.json"

[server]
command = "/opt/py4web/bin/py4web"

[timing]
settle_ms = 1500
"#,
        )
        .unwrap();

        let config = GraderConfig::load(&path).unwrap();
        assert_eq!(config.server.command, "/opt/py4web/bin/py4web");
        assert_eq!(config.server.port, 8800);
        assert_eq!(config.timing.settle_ms, 1500);
        assert_eq!(config.timing.wait_timeout_ms, Timing::default().wait_timeout_ms);
        assert_eq!(config.results_path, Some(PathBuf::from("out/grade.json")));
    }

    #[test]
    fn test_cli_debug_turns_off_headless() {
        let mut config = GraderConfig::default();
        config.apply_cli(true, Some(9000));
        assert_eq!(config.server.port, 9000);
        assert!(config.debug);
        assert!(!config.driver.headless);
        assert!(config.driver.detach);
    }

    #[test]
    fn test_file_port_and_debug_survive_absent_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grader.toml");
        std::fs::write(&path, "debug = true\n\n[server]\nport = 9100\n").unwrap();

        let mut config = GraderConfig::load(&path).unwrap();
        config.apply_cli(false, None);

        assert_eq!(config.server.port, 9100);
        assert!(config.debug);
        assert!(!config.driver.headless);
        assert!(config.driver.detach);

        config.apply_cli(false, Some(9200));
        assert_eq!(config.server.port, 9200);
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = GraderConfig::default();
        config.apply_cli(false, Some(0));
        assert!(matches!(config.validate(), Err(GradeError::InvalidConfig(_))));
    }
}
