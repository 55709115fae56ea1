//! Ordered step runner
//!
//! Steps run strictly in the order they were declared, each to completion.
//! A failing step scores zero and the run moves on; only `StepError::Stop`
//! or a fatal `GradeError` ends the run early.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::GradeError;

/// Points and a comment granted by a step that completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub points: u32,
    pub comment: String,
}

impl Award {
    pub fn new(points: u32, comment: impl Into<String>) -> Self {
        Self {
            points,
            comment: comment.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StepError {
    /// Unrecoverable; abandon the remaining steps
    #[error("grading stopped: {0}")]
    Stop(String),

    #[error("{0}")]
    Assertion(String),

    #[error(transparent)]
    Grade(#[from] GradeError),

    #[error(transparent)]
    Common(#[from] cardgrade_common::Error),
}

pub type StepResult = Result<Award, StepError>;
pub type StepFuture<'a> = BoxFuture<'a, StepResult>;
pub type StepFn<C> = for<'a> fn(&'a mut C) -> StepFuture<'a>;

/// Fail the current step with an assertion message unless `cond` holds
#[macro_export]
macro_rules! check {
    ($cond:expr, $($msg:tt)+) => {
        if !$cond {
            return Err($crate::runner::StepError::Assertion(format!($($msg)+)));
        }
    };
}

/// A named step over a shared context `C`
pub struct Step<C> {
    pub name: &'static str,
    run: StepFn<C>,
}

impl<C> Step<C> {
    pub fn new(name: &'static str, run: StepFn<C>) -> Self {
        Self { name, run }
    }
}

/// One line of the grade report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub step: String,
    pub points: u32,
    pub comment: String,
    pub passed: bool,
}

impl LineItem {
    pub fn awarded(step: &str, award: Award) -> Self {
        Self {
            step: step.to_string(),
            points: award.points,
            comment: format!("{}: {} point(s): {}", step, award.points, award.comment),
            passed: true,
        }
    }

    pub fn failed(step: &str, reason: &str) -> Self {
        Self {
            step: step.to_string(),
            points: 0,
            comment: format!("Error in {}: {}", step, reason),
            passed: false,
        }
    }
}

/// Everything a run recorded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub items: Vec<LineItem>,
    /// Reason the run was stopped early, if it was
    pub halted: Option<String>,
}

pub struct StepRunner<C> {
    steps: Vec<Step<C>>,
}

impl<C: Send> StepRunner<C> {
    pub fn new(steps: Vec<Step<C>>) -> Self {
        Self { steps }
    }

    /// Step names in execution order
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    /// Run every step against `cx`, in order
    pub async fn run(&self, cx: &mut C) -> RunOutcome {
        let mut outcome = RunOutcome::default();

        for step in &self.steps {
            info!("Running {}", step.name);

            let result = AssertUnwindSafe((step.run)(cx)).catch_unwind().await;

            match result {
                Ok(Ok(award)) => {
                    info!("✓ {} ({} point(s))", step.name, award.points);
                    outcome.items.push(LineItem::awarded(step.name, award));
                }
                Ok(Err(StepError::Stop(reason))) => {
                    warn!("{} stopped grading: {}", step.name, reason);
                    outcome.halted = Some(format!("{}: {}", step.name, reason));
                    break;
                }
                Ok(Err(StepError::Grade(e))) if e.is_fatal() => {
                    error!("{} hit a fatal error: {}", step.name, e);
                    outcome.halted = Some(format!("{}: {}", step.name, e));
                    break;
                }
                Ok(Err(e)) => {
                    error!("✗ {} - {}", step.name, e);
                    outcome.items.push(LineItem::failed(step.name, &e.to_string()));
                }
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!("✗ {} panicked - {}", step.name, reason);
                    outcome.items.push(LineItem::failed(step.name, &reason));
                }
            }
        }

        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "step panicked".to_string()
    }
}
