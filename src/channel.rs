//! Messaging Channel boundary: inbound events and outbound replies.
//!
//! The bot never talks to a chat transport directly. A transport adapter
//! turns platform messages into [`InboundEvent`]s, feeds them to
//! [`crate::bot::PdfBot::handle`], and implements [`MessagingChannel`] so the
//! bot can answer. Session authentication, media download and rate limits
//! all stay on the adapter's side of this line.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

pub const PDF_MIME: &str = "application/pdf";

/// Opaque stable key identifying a sender or conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A unit of binary media delivered with an inbound event.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Media type without parameters, lower-cased (`"Image/PNG; q=1"` → `"image/png"`).
    pub fn essence(&self) -> String {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    pub fn is_image(&self) -> bool {
        self.essence().starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.essence() == PDF_MIME
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// One message delivered by the Messaging Channel.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub sender: Identity,
    /// Message body or media caption; empty when absent.
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl InboundEvent {
    pub fn text(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: Identity::new(sender),
            text: text.into(),
            attachment: None,
        }
    }

    pub fn media(sender: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            sender: Identity::new(sender),
            text: String::new(),
            attachment: Some(attachment),
        }
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }
}

/// A document the bot sends back.
#[derive(Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl OutgoingFile {
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: PDF_MIME.to_string(),
            bytes,
        }
    }
}

impl fmt::Debug for OutgoingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// An outbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    File {
        file: OutgoingFile,
        caption: Option<String>,
    },
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    pub fn file(file: OutgoingFile, caption: impl Into<String>) -> Self {
        Reply::File {
            file,
            caption: Some(caption.into()),
        }
    }
}

/// Send replies back through the chat transport.
///
/// Implementations must be `Send + Sync`: the bot handles different senders'
/// events concurrently and shares one channel between them.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send_text(&self, to: &Identity, text: &str) -> Result<()>;

    async fn send_file(
        &self,
        to: &Identity,
        file: &OutgoingFile,
        caption: Option<&str>,
    ) -> Result<()>;

    /// Deliver a [`Reply`] through whichever method fits it.
    async fn send(&self, to: &Identity, reply: &Reply) -> Result<()> {
        match reply {
            Reply::Text(text) => self.send_text(to, text).await,
            Reply::File { file, caption } => self.send_file(to, file, caption.as_deref()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_essence_strips_parameters_and_case() {
        let a = Attachment::new("Application/PDF; name=x.pdf", vec![]);
        assert_eq!(a.essence(), "application/pdf");
        assert!(a.is_pdf());
        assert!(!a.is_image());
    }

    #[test]
    fn image_detection() {
        assert!(Attachment::new("image/jpeg", vec![]).is_image());
        assert!(Attachment::new("image/webp", vec![]).is_image());
        assert!(!Attachment::new("application/octet-stream", vec![]).is_image());
        assert!(!Attachment::new("image/png", vec![]).is_pdf());
    }

    #[test]
    fn debug_hides_payload() {
        let a = Attachment::new("image/png", vec![0u8; 2048]);
        let dbg = format!("{a:?}");
        assert!(dbg.contains("<2048 bytes>"), "got: {dbg}");
    }
}
