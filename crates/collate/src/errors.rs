use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollateError>;

#[derive(Error, Debug)]
pub enum CollateError {
    /// Probing an empty sequence or mapping, or merging an empty batch list.
    #[error("empty batch: {0}")]
    Empty(&'static str),

    /// The batches handed to `merge` do not share one shape.
    #[error("batches must share one shape: expected {expected}, found {found}")]
    MixedShapes {
        expected: &'static str,
        found: &'static str,
    },

    /// Mapping batches disagree on their field sets.
    #[error("mapping fields disagree: {0}")]
    FieldMismatch(String),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}
