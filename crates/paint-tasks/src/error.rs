//! Submission errors

use thiserror::Error;
use vertex_paint::{MeshId, RequestError};

/// Why a submission was rejected before it reached a queue.
///
/// Rejection is synchronous; a rejected request never occupies a queue slot
/// and no result handle is issued for it.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] RequestError),
    #[error("paint queue for mesh {index}:{generation} is full ({pending} pending)", index = mesh.index, generation = mesh.generation)]
    QueueOverflow { mesh: MeshId, pending: usize },
}
