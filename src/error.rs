//! Error type
use crate::buffers::BufferError;
use crate::features::FlattenError;
use crate::hindsight::RelabelError;
use crate::logging::LogError;
use crate::tree::TreeError;
use thiserror::Error;

/// Error from the hindsight crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HindsightError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("error relabeling trajectory")]
    Relabel(#[from] RelabelError),
    #[error("error flattening features")]
    Flatten(#[from] FlattenError),
    #[error("error storing trajectory")]
    Buffer(#[from] BufferError),
    #[error("error logging statistics")]
    Log(#[from] LogError),
}
