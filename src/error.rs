//! Error types for the simulation engine.

use crate::simulation::State;
use thiserror::Error;

/// Unified error type for simulation setup and execution.
#[derive(Error, Debug)]
pub enum MdError {
    /// Rejected before any integration step runs.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A step produced a non-finite energy, force, or state value. The run
    /// aborts immediately; `last_state` is the state before the offending
    /// step.
    #[error("numerical instability at step {step}: {detail}")]
    NumericalInstability {
        step: usize,
        detail: String,
        last_state: Box<State>,
    },

    /// A stochastic component (Langevin thermostat, Maxwell-Boltzmann
    /// velocity initialization) was requested without an explicit seed.
    #[error("a stochastic component is enabled but no random seed was configured")]
    MissingSeed,

    /// I/O errors (configuration file reading/writing)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse errors
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yml::Error),
}

impl MdError {
    pub fn invalid(message: impl Into<String>) -> Self {
        MdError::InvalidConfiguration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, MdError>;
