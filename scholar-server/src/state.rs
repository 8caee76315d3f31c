//! Process-wide service lifecycle.
//!
//! ```text
//! Uninitialized ──begin_indexing──▶ Indexing ──publish──▶ Ready
//!                                      │
//!                                      └──────fail──────▶ Failed
//! ```
//!
//! The pipeline is written once into a [`OnceLock`] before the phase flips
//! to `Ready`, so any reader that observes `Ready` also observes the fully
//! built pipeline. Requests never wait on indexing.

use anyhow::Result;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{error, info};

use crate::pipeline::QaPipeline;

/// Answer returned while the index is still being built.
pub const INITIALIZING_MESSAGE: &str = "System still initializing. Try again in a few seconds.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Uninitialized = 0,
    Indexing = 1,
    Ready = 2,
    Failed = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Indexing,
            2 => Phase::Ready,
            3 => Phase::Failed,
            _ => Phase::Uninitialized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Indexing => "indexing",
            Phase::Ready => "ready",
            Phase::Failed => "failed",
        }
    }
}

/// Result of [`ServiceState::ask`].
#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    Answered(String),
    /// Indexing has not finished yet
    Initializing,
    /// Indexing failed; carries the reason
    Unavailable(String),
}

impl AskOutcome {
    /// Text for the `answer` field, if this outcome has one.
    pub fn answer(&self) -> Option<&str> {
        match self {
            AskOutcome::Answered(text) => Some(text),
            AskOutcome::Initializing => Some(INITIALIZING_MESSAGE),
            AskOutcome::Unavailable(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct ServiceState {
    phase: AtomicU8,
    pipeline: OnceLock<QaPipeline>,
    failure: OnceLock<String>,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Uninitialized as u8),
            pipeline: OnceLock::new(),
            failure: OnceLock::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Move from `Uninitialized` to `Indexing`. Returns false if indexing
    /// was already started.
    pub fn begin_indexing(&self) -> bool {
        self.phase
            .compare_exchange(
                Phase::Uninitialized as u8,
                Phase::Indexing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Install the finished pipeline and start serving questions.
    pub fn publish(&self, pipeline: QaPipeline) -> Result<()> {
        if self.phase() == Phase::Failed {
            anyhow::bail!("cannot publish a pipeline after indexing failed");
        }
        self.pipeline
            .set(pipeline)
            .map_err(|_| anyhow::anyhow!("pipeline was already published"))?;
        self.phase.store(Phase::Ready as u8, Ordering::Release);
        info!("Service ready");
        Ok(())
    }

    /// Record a terminal failure. The first reason wins.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!("Indexing failed: {}", reason);
        let _ = self.failure.set(reason);
        self.phase.store(Phase::Failed as u8, Ordering::Release);
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.get().map(String::as_str)
    }

    pub fn pipeline(&self) -> Option<&QaPipeline> {
        match self.phase() {
            Phase::Ready => self.pipeline.get(),
            _ => None,
        }
    }

    /// Answer a question, or report why it cannot be answered yet.
    /// Only pipeline errors are returned as `Err`.
    pub async fn ask(&self, question: &str) -> Result<AskOutcome> {
        match self.phase() {
            Phase::Uninitialized | Phase::Indexing => Ok(AskOutcome::Initializing),
            Phase::Failed => Ok(AskOutcome::Unavailable(
                self.failure().unwrap_or("indexing failed").to_string(),
            )),
            Phase::Ready => match self.pipeline.get() {
                Some(pipeline) => pipeline.ask(question).await.map(AskOutcome::Answered),
                None => Ok(AskOutcome::Initializing),
            },
        }
    }
}
