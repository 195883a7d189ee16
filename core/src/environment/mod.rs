//! Environment adapter contract
//!
//! Adapters should report their own failures through
//! [`Observation::error_message`] rather than returning `Err`; the runner
//! treats both the same way and ends the run gracefully.

mod mock;

use async_trait::async_trait;

use crate::types::{Action, Observation};
use crate::Result;

pub use mock::{MockEnvironment, MockEnvironmentConfig, MockPage};

#[async_trait]
pub trait Environment: Send + Sync {
    /// Return to the initial state and report it
    async fn reset(&mut self) -> Result<Observation>;

    /// Report the current state without changing it
    async fn observe(&mut self) -> Result<Observation>;

    /// Apply one action and report the resulting state
    async fn step(&mut self, action: &Action) -> Result<Observation>;

    async fn close(&mut self) -> Result<()>;
}
