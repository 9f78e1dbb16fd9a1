//! # pdfbot
//!
//! A conversational PDF bot. Users pick an operation from a numbered menu,
//! send attachments over several messages, and get a processed document
//! back: image → PDF, merge of several PDFs, or PDF compression.
//!
//! ## Architecture
//!
//! ```text
//! Messaging Channel ──InboundEvent──▶ PdfBot::handle
//!                                      │
//!                                      ├─ SessionStore   who is mid-flight on what
//!                                      ├─ router::route  (activity, event) → Step
//!                                      ├─ DocumentProcessor  pdfium-backed PDF work
//!                                      │
//! Messaging Channel ◀──────Reply───────┘
//! ```
//!
//! Sessions expire after an idle window (five minutes by default) and live
//! in memory only.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfbot::{BotConfig, InboundEvent, MessagingChannel, PdfBot, PdfiumProcessor};
//! use std::sync::Arc;
//!
//! # async fn run(channel: Arc<dyn MessagingChannel>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = BotConfig::default();
//! let processor = Arc::new(PdfiumProcessor::new(config.pdfium_library_path.clone()));
//! let bot = PdfBot::new(config, processor, channel);
//!
//! bot.handle(InboundEvent::text("+15550100", "menu")).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfbot` console binary (clap + tracing-subscriber + mime_guess) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bot;
pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod expiry;
pub mod messages;
pub mod processor;
pub mod router;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bot::PdfBot;
pub use channel::{Attachment, Identity, InboundEvent, MessagingChannel, OutgoingFile, Reply};
pub use command::Command;
pub use config::{BotConfig, BotConfigBuilder};
pub use error::{BotError, Operation, ProcessError};
pub use processor::{CompressionReport, DocumentProcessor, PdfiumProcessor};
pub use router::{route, MediaKind, Step};
pub use session::{Activity, MemorySessionStore, Session, SessionError, SessionSnapshot, SessionStore};
