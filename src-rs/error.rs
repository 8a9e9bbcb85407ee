//! Error taxonomy for annotation passes.

use std::path::PathBuf;

use crate::host::LayerRef;

/// Errors raised while annotating a document or a directory of documents.
#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    /// `current` was invoked with no active document.
    #[error("No document open")]
    NoDocumentOpen,

    /// `directory` was invoked without choosing a folder.
    #[error("No directory selected")]
    NoDirectorySelected,

    /// A layer property could not be resolved; the layer is skipped.
    #[error("failed to inspect layer {layer}: {reason}")]
    LayerInspection {
        /// Layer that failed
        layer: LayerRef,
        /// Host-provided reason
        reason: String,
    },

    /// The host refused a drawing instruction.
    #[error("failed to draw annotation: {0}")]
    Drawing(String),

    /// One document of a batch could not be opened or processed.
    #[error("{}: {message}", .path.display())]
    BatchFile {
        /// Document that failed
        path: PathBuf,
        /// Flattened error chain
        message: String,
    },
}

impl AnnotateError {
    pub fn inspection(layer: LayerRef, reason: impl Into<String>) -> Self {
        Self::LayerInspection {
            layer,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
