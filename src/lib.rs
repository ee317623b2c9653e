pub mod candidate;
pub mod config;
pub mod editor;
pub mod errors;
pub mod estimator;
pub mod geo;
pub mod logging;
pub mod prerank;
pub mod ranker;
pub mod source;

// Re-export key types for convenience
pub use candidate::{Candidate, FeatureId, ShardId, TokenMatch, TokenRange};
pub use errors::GeorankError;
pub use prerank::{Params, PreRanker, SessionPhase};
