//! Error taxonomy for the engine (spec §7). Construction-time errors are
//! returned to the caller; tick-time leaf errors never surface here — they are
//! converted to `Status::Failure` plus an `error` event (see `node::action`).

use thiserror::Error;

pub type BtResult<T> = Result<T, BtError>;

#[derive(Debug, Error)]
pub enum BtError {
    #[error("invalid tree: {0}")]
    InvalidTree(String),

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("XML parse error at line {line}, column {column}: {message}")]
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("operation not allowed while forest is {0:?}")]
    InvalidForestState(crate::forest::RunState),

    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    #[error("cyclic dependency among forest nodes: {0:?}")]
    CyclicDependency(Vec<String>),

    #[error("no service registered for: {0}")]
    NoService(String),

    #[error("service call failed: {0}")]
    ServiceError(String),

    #[error("operation timed out")]
    Timeout,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("behavior-call recursion exceeded the configured depth limit")]
    CallDepthExceeded,

    #[error("event handler error: {0}")]
    HandlerError(String),
}
