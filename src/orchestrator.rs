//! Bounded-concurrency fan-out of a unit of work across repositories or commits
//!
//! A unit-of-work function is called once per unit and returns either a future
//! (the work itself) or, synchronously, an error. A synchronous error means the
//! caller broke the contract (for example an empty repository path) and aborts
//! the whole batch. Errors produced by the future are isolated: they become
//! [`UnitFailure`] records and the remaining units keep running.

use crate::config::OrchestratorConfig;
use crate::error::{ChurnError, FailureKind, OrchestrationError, Result, UnitFailure};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Identifier a unit is reported under
pub trait UnitId {
    fn unit_id(&self) -> String;
}

impl UnitId for String {
    fn unit_id(&self) -> String {
        self.clone()
    }
}

impl UnitId for &str {
    fn unit_id(&self) -> String {
        (*self).to_string()
    }
}

impl UnitId for PathBuf {
    fn unit_id(&self) -> String {
        self.display().to_string()
    }
}

/// Value produced by one successful unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSuccess<T> {
    pub unit: String,
    pub value: T,
}

/// Everything one orchestration pass produced, in completion order
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub successes: Vec<UnitSuccess<T>>,
    pub failures: Vec<UnitFailure>,
}

impl<T> BatchOutcome<T> {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Units accounted for, successful or not
    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(self) -> Vec<T> {
        self.successes.into_iter().map(|s| s.value).collect()
    }
}

enum Slot<T> {
    Finished(std::result::Result<UnitSuccess<T>, UnitFailure>),
    Contract(OrchestrationError),
}

/// Runs units through a fixed number of concurrent slots
#[derive(Debug, Clone)]
pub struct Orchestrator {
    concurrency: usize,
    cancel: Option<CancellationToken>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Orchestrator {
    /// A concurrency of 0 is clamped to 1
    pub fn new(concurrency: usize) -> Self {
        let concurrency = if concurrency == 0 {
            tracing::warn!("Concurrency of 0 requested, using 1");
            1
        } else {
            concurrency
        };
        Self {
            concurrency,
            cancel: None,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.concurrency)
    }

    /// Units not yet started when `token` fires are reported as cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    pub async fn run<I, U, T, F, Fut>(&self, units: I, work: F) -> Result<BatchOutcome<T>>
    where
        I: IntoIterator<Item = U>,
        U: UnitId,
        F: Fn(U) -> Result<Fut>,
        Fut: Future<Output = Result<T>>,
    {
        let mut slots = stream::iter(units)
            .map(|unit| {
                let id = unit.unit_id();
                let started = if self.is_cancelled() {
                    None
                } else {
                    Some(work(unit))
                };

                async move {
                    match started {
                        None => Slot::Finished(Err(UnitFailure::new(
                            id,
                            FailureKind::Cancelled,
                            "cancelled before start",
                        ))),
                        Some(Err(e)) => Slot::Contract(contract_error(id, e)),
                        Some(Ok(fut)) => match fut.await {
                            Ok(value) => Slot::Finished(Ok(UnitSuccess { unit: id, value })),
                            Err(e) => Slot::Finished(Err(UnitFailure::from_error(id, &e))),
                        },
                    }
                }
            })
            .buffer_unordered(self.concurrency);

        let mut outcome = BatchOutcome {
            successes: Vec::new(),
            failures: Vec::new(),
        };

        while let Some(slot) = slots.next().await {
            match slot {
                Slot::Finished(Ok(success)) => {
                    tracing::debug!("Unit {} completed", success.unit);
                    outcome.successes.push(success);
                }
                Slot::Finished(Err(failure)) => {
                    tracing::warn!("Unit failed: {}", failure);
                    outcome.failures.push(failure);
                }
                Slot::Contract(err) => {
                    tracing::error!("Aborting batch: {}", err);
                    return Err(err.into());
                }
            }
        }

        tracing::info!(
            "Processed {} units: {} succeeded, {} failed",
            outcome.len(),
            outcome.successes.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }
}

fn contract_error(unit: String, err: ChurnError) -> OrchestrationError {
    match err {
        ChurnError::Orchestration(inner) => inner,
        other => OrchestrationError::Contract {
            unit,
            message: other.to_string(),
        },
    }
}
