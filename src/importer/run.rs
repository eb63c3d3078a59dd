//! Test run lifecycle
//!
//! A run moves `Created -> InProgress -> Completed`, and to `Aborted` as soon
//! as any phase after creation fails, including a failed status write. A
//! failed phase is never retried.

use super::error::ImportError;
use crate::azure::{RunCreateModel, RunStatus, TestManagementApi};
use std::fmt;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    InProgress,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    Start,
    ResultsImported,
    PhaseFailed,
}

/// Work done against a created run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Reconcile,
    ResultImport,
    ScreenshotUpload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Phase::Start => "start the created Test Run!",
            Phase::Reconcile => "reconcile results for the created Test Run!",
            Phase::ResultImport => "import result into the created Test Run!",
            Phase::ScreenshotUpload => "upload screenshot(s) into the created Test Run!",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run cannot handle {event:?} while {state:?}")]
pub struct TransitionError {
    pub state: RunState,
    pub event: RunEvent,
}

impl RunState {
    pub fn transition(self, event: RunEvent) -> Result<RunState, TransitionError> {
        match (self, event) {
            (RunState::Created, RunEvent::Start) => Ok(RunState::InProgress),
            (RunState::InProgress, RunEvent::ResultsImported) => Ok(RunState::Completed),
            (
                RunState::Created | RunState::InProgress | RunState::Completed,
                RunEvent::PhaseFailed,
            ) => {
                Ok(RunState::Aborted)
            }
            (state, event) => Err(TransitionError { state, event }),
        }
    }

    /// Status reported to the service on entering this state
    pub fn remote_status(self) -> Option<RunStatus> {
        match self {
            RunState::Created => None,
            RunState::InProgress => Some(RunStatus::InProgress),
            RunState::Completed => Some(RunStatus::Completed),
            RunState::Aborted => Some(RunStatus::Aborted),
        }
    }
}

/// A created run and the state it was last moved to
pub struct RunLifecycle<'a> {
    api: &'a dyn TestManagementApi,
    project: &'a str,
    run_id: i64,
    state: RunState,
}

impl<'a> RunLifecycle<'a> {
    pub async fn create(
        api: &'a dyn TestManagementApi,
        project: &'a str,
        model: &RunCreateModel,
    ) -> Result<RunLifecycle<'a>, ImportError> {
        let run = api.create_run(project, model).await?;
        let run_id = run.id.ok_or(ImportError::RunNotCreated)?;
        log::info!(
            "Created test run {} '{}' with {} point(s)",
            run_id,
            model.name,
            model.point_ids.len()
        );

        Ok(Self {
            api,
            project,
            run_id,
            state: RunState::Created,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Apply `event` and report the new status to the service
    pub async fn advance(&mut self, event: RunEvent) -> Result<RunState, ImportError> {
        let next = self.state.transition(event)?;
        if let Some(status) = next.remote_status() {
            self.api
                .set_run_status(self.project, self.run_id, status)
                .await?;
        }
        log::info!("Test run {} is now {:?}", self.run_id, next);
        self.state = next;
        Ok(next)
    }

    /// Apply `event` as the last step of `phase`; a failed status write
    /// aborts the run like any other failure of that phase
    pub async fn advance_within(
        &mut self,
        phase: Phase,
        event: RunEvent,
    ) -> Result<RunState, ImportError> {
        match self.advance(event).await {
            Ok(state) => Ok(state),
            Err(source) => Err(self.abort(phase, source).await),
        }
    }

    /// Run one phase; if it fails, abort the run and wrap the error with the phase
    pub async fn guard<T, F>(&mut self, phase: Phase, work: F) -> Result<T, ImportError>
    where
        F: Future<Output = Result<T, ImportError>>,
    {
        match work.await {
            Ok(value) => Ok(value),
            Err(source) => Err(self.abort(phase, source).await),
        }
    }

    async fn abort(&mut self, phase: Phase, source: ImportError) -> ImportError {
        log::error!("Test run {}: failed to {}", self.run_id, phase);
        if let Err(abort_error) = self.advance(RunEvent::PhaseFailed).await {
            log::warn!(
                "Could not mark test run {} as aborted: {}",
                self.run_id,
                abort_error
            );
        }
        ImportError::PhaseFailed {
            phase,
            source: Box::new(source),
        }
    }
}
