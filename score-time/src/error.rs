use crate::primitives::{voice::LeafId, Rational};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeError {
    #[error("Invalid interval: start {start} is after stop {stop}")]
    InvalidInterval { start: Rational, stop: Rational },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Rational overflow: {0}")]
    Overflow(String),
    #[error("Leaf {0:?} is not attached to the voice")]
    DetachedLeaf(LeafId),
}
pub type TimeResult<T> = Result<T, TimeError>;
