/// Domain error types for the pre-ranking pipeline
///
/// Only programming errors surface here: out-of-order lifecycle calls and
/// broken collaborator contracts. Degraded data conditions (unloaded shards,
/// missing tables, unresolved centers) are policy fallbacks handled inline.

#[derive(Debug, thiserror::Error)]
pub enum GeorankError {
    #[error("Invalid call to {operation} in {phase:?} phase")]
    InvalidPhase {
        operation: &'static str,
        phase: crate::prerank::SessionPhase,
    },

    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GeorankError {
    /// Helper to create lifecycle errors from the session state machine
    ///
    /// Example:
    /// ```
    /// use georank::errors::GeorankError;
    /// use georank::prerank::SessionPhase;
    /// let err = GeorankError::invalid_phase("update", SessionPhase::Uninitialized);
    /// ```
    pub fn invalid_phase(operation: &'static str, phase: crate::prerank::SessionPhase) -> Self {
        GeorankError::InvalidPhase { operation, phase }
    }
}
