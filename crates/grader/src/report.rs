//! Grade aggregation and reporting

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::error::GradeResult;
use crate::runner::{LineItem, RunOutcome};

const RULE: &str = "========================================";

/// Final grade: every recorded line item and their sum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub items: Vec<LineItem>,
    pub total: u32,
    /// Set when a step stopped the run early
    pub halted: Option<String>,
}

impl Report {
    pub fn from_items(items: Vec<LineItem>, halted: Option<String>) -> Self {
        let total = items.iter().map(|item| item.points).sum();
        Self {
            items,
            total,
            halted,
        }
    }

    pub fn from_outcome(outcome: RunOutcome) -> Self {
        Self::from_items(outcome.items, outcome.halted)
    }

    /// Human-readable report, one ruled block per item, then the total
    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            let _ = writeln!(out, "{}", RULE);
            let _ = writeln!(out, "[{} points] {}", item.points, item.comment);
        }
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "TOTAL GRADE {}", self.total);
        let _ = writeln!(out, "{}", RULE);
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> GradeResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        info!("Results written to: {}", path.display());
        Ok(())
    }
}
