//! Error types for the pdfbot library.
//!
//! Two distinct error types reflect two distinct failure sources:
//!
//! * [`ProcessError`] — the Document Processor could not produce a document
//!   (undecodable image, corrupt PDF, pdfium unavailable). Returned by every
//!   [`crate::processor::DocumentProcessor`] method.
//!
//! * [`BotError`] — handling one inbound event failed. Every variant maps to a
//!   reply via [`BotError::user_message`]; nothing propagates past
//!   [`crate::bot::PdfBot::handle`].

use crate::session::{Activity, SessionError};
use thiserror::Error;

/// Failures raised by a [`crate::processor::DocumentProcessor`].
#[derive(Debug, Error)]
pub enum ProcessError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Attachment bytes could not be decoded as an image.
    #[error("Image could not be decoded ({mime_type}): {detail}")]
    InvalidImage { mime_type: String, detail: String },

    /// Attachment bytes are not a loadable PDF.
    #[error("Not a valid PDF: {detail}")]
    InvalidPdf { detail: String },

    /// Zero-length input.
    #[error("Input is empty")]
    EmptyInput,

    /// Merge called with fewer documents than it can meaningfully combine.
    #[error("Merging needs at least 2 documents, got {got}")]
    NotEnoughDocuments { got: usize },

    // ── Pdfium errors ─────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFBOT_PDFIUM_LIB=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// pdfium returned an error while building or saving a document.
    #[error("pdfium {stage} failed: {detail}")]
    Render { stage: &'static str, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. the blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The operation a [`BotError::ProcessingFailure`] concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ConvertImage,
    Merge,
    Compress,
}

impl Operation {
    pub fn label(self) -> &'static str {
        match self {
            Operation::ConvertImage => "image conversion",
            Operation::Merge => "merge",
            Operation::Compress => "compression",
        }
    }
}

/// A failure while handling one inbound event.
#[derive(Debug, Error)]
pub enum BotError {
    /// Attachment present but of the wrong type for the current activity.
    #[error("Expected {expected} attachment during {activity:?}, got '{actual}'")]
    InvalidAttachment {
        activity: Activity,
        expected: &'static str,
        actual: String,
    },

    /// The Document Processor failed.
    #[error("{} failed: {source}", .operation.label())]
    ProcessingFailure {
        operation: Operation,
        #[source]
        source: ProcessError,
    },

    /// Merge finalized with fewer documents than required.
    #[error("Merge needs {required} documents, only {received} received")]
    InsufficientInputs { received: usize, required: usize },

    /// The session store refused an update.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The Messaging Channel rejected an outbound reply.
    #[error("Channel delivery failed: {0}")]
    Channel(String),

    /// Anything else, including a panic caught at the top level.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// The reply sent to the user for this failure.
    pub fn user_message(&self) -> String {
        use crate::messages;
        let text = match self {
            BotError::InvalidAttachment { activity, .. } => match activity {
                Activity::AwaitingImage => messages::IMAGE_FAILED,
                Activity::AwaitingMergeInputs => messages::MERGE_WRONG_TYPE,
                _ => messages::COMPRESS_FAILED,
            },
            BotError::ProcessingFailure { operation, .. } => match operation {
                Operation::ConvertImage => messages::IMAGE_FAILED,
                Operation::Merge => messages::MERGE_FAILED,
                Operation::Compress => messages::COMPRESS_FAILED,
            },
            BotError::InsufficientInputs { required, .. } => {
                return messages::merge_insufficient(*required)
            }
            BotError::Session(_)
            | BotError::InvalidConfig(_)
            | BotError::Channel(_)
            | BotError::Internal(_) => messages::GENERIC_ERROR,
        };
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_failure_names_operation() {
        let e = BotError::ProcessingFailure {
            operation: Operation::Merge,
            source: ProcessError::InvalidPdf {
                detail: "bad xref".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.starts_with("merge failed"), "got: {msg}");
        assert!(msg.contains("bad xref"), "got: {msg}");
    }

    #[test]
    fn insufficient_inputs_display() {
        let e = BotError::InsufficientInputs {
            received: 1,
            required: 2,
        };
        assert!(e.to_string().contains("only 1 received"));
        assert_eq!(e.user_message(), "❌ Please send at least 2 PDFs to merge.");
    }

    #[test]
    fn invalid_attachment_message_depends_on_activity() {
        let merge = BotError::InvalidAttachment {
            activity: Activity::AwaitingMergeInputs,
            expected: "PDF",
            actual: "image/png".into(),
        };
        let compress = BotError::InvalidAttachment {
            activity: Activity::AwaitingCompressInput,
            expected: "PDF",
            actual: "image/png".into(),
        };
        assert_eq!(merge.user_message(), crate::messages::MERGE_WRONG_TYPE);
        assert_eq!(compress.user_message(), crate::messages::COMPRESS_FAILED);
    }

    #[test]
    fn internal_errors_get_generic_reply() {
        let e = BotError::Internal("boom".into());
        assert_eq!(e.user_message(), crate::messages::GENERIC_ERROR);
    }
}
