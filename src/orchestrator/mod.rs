//! Retrieval orchestrator
//!
//! `state` holds the per-run state machine, `coordinator` the component
//! wiring and per-session serialization around it.

pub mod coordinator;
pub mod state;

pub use coordinator::{AnswerMode, AskResponse, OrchestratorBuilder, RetrievalOrchestrator};
pub use state::{PipelineEvent, PipelineRun, PipelineState, MAX_RETRIEVAL_RETRIES};
