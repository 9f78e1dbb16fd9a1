//! Event handling: route, execute, reply.
//!
//! [`PdfBot::handle`] is the single entry point for the Messaging Channel.
//! For each event it looks up the sender's activity, asks
//! [`crate::router::route`] what to do, and carries that [`Step`] out
//! against the session store, the Document Processor and the channel.
//!
//! ## Failure policy
//!
//! Operation failures are caught where they happen and turned into a reply
//! (see [`BotError::user_message`]); the session returns to Idle except for
//! recoverable merge mistakes. Anything that still escapes (a channel that
//! cannot deliver, a panic) is caught in `handle`, answered with a generic
//! apology, and the sender's session is cleared. Nothing is retried.
//!
//! ## Ordering
//!
//! Events from one sender are handled strictly one at a time: each identity
//! has its own async lane lock, so a second message waits while a merge for
//! the same sender is still running. Different senders never wait on each
//! other.

use crate::channel::{Attachment, Identity, InboundEvent, MessagingChannel, OutgoingFile, Reply};
use crate::command::Command;
use crate::config::BotConfig;
use crate::error::{BotError, Operation};
use crate::messages;
use crate::processor::{CompressionReport, DocumentProcessor};
use crate::router::{route, MediaKind, Step};
use crate::session::{Activity, MemorySessionStore, SessionSnapshot, SessionStore};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

type Lane = Arc<tokio::sync::Mutex<()>>;

/// The conversational PDF bot.
pub struct PdfBot {
    config: BotConfig,
    store: Arc<dyn SessionStore>,
    processor: Arc<dyn DocumentProcessor>,
    channel: Arc<dyn MessagingChannel>,
    lanes: Mutex<HashMap<Identity, Lane>>,
}

impl PdfBot {
    /// Create a bot with an in-memory session store sized from `config`.
    pub fn new(
        config: BotConfig,
        processor: Arc<dyn DocumentProcessor>,
        channel: Arc<dyn MessagingChannel>,
    ) -> Self {
        let store = Arc::new(MemorySessionStore::new(
            config.idle_timeout,
            config.merge_max_inputs,
        ));
        Self::with_store(config, store, processor, channel)
    }

    /// Create a bot over a caller-supplied session store.
    pub fn with_store(
        config: BotConfig,
        store: Arc<dyn SessionStore>,
        processor: Arc<dyn DocumentProcessor>,
        channel: Arc<dyn MessagingChannel>,
    ) -> Self {
        Self {
            config,
            store,
            processor,
            channel,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Current activity for `identity` (Idle when there is no live session).
    pub async fn activity_of(&self, identity: &Identity) -> Activity {
        self.store
            .get(identity)
            .await
            .map_or(Activity::Idle, |s| s.activity)
    }

    /// Summaries of every live session.
    pub async fn sessions(&self) -> Vec<SessionSnapshot> {
        self.store.snapshots().await
    }

    /// Handle one inbound event. Never fails: every error becomes a reply.
    ///
    /// Returns the step that was taken, or [`Step::Ignore`] when handling
    /// was aborted by an unexpected error.
    pub async fn handle(&self, event: InboundEvent) -> Step {
        let sender = event.sender.clone();
        let lane = self.lane(&sender);
        let guard = lane.lock().await;

        let outcome = AssertUnwindSafe(self.dispatch(&event)).catch_unwind().await;
        let step = match outcome {
            Ok(Ok(step)) => step,
            Ok(Err(e)) => {
                self.recover(&sender, e).await;
                Step::Ignore
            }
            Err(panic) => {
                self.recover(&sender, BotError::Internal(panic_message(panic)))
                    .await;
                Step::Ignore
            }
        };

        drop(guard);
        self.release_lane(&sender, lane);
        step
    }

    // ── Lanes ────────────────────────────────────────────────────────────

    fn lane(&self, identity: &Identity) -> Lane {
        let mut lanes = self
            .lanes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(lanes.entry(identity.clone()).or_default())
    }

    fn release_lane(&self, identity: &Identity, lane: Lane) {
        let mut lanes = self
            .lanes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Map + our clone: nobody else is queued on this lane.
        if Arc::strong_count(&lane) == 2 {
            lanes.remove(identity);
        }
    }

    // ── Routing ──────────────────────────────────────────────────────────

    async fn dispatch(&self, event: &InboundEvent) -> Result<Step, BotError> {
        let sender = &event.sender;
        let activity = self.activity_of(sender).await;
        let command = Command::parse(&event.text);
        let media = event.attachment.as_ref().map(MediaKind::of);
        let step = route(activity, command, media);
        debug!(%sender, ?activity, ?command, ?media, ?step, "routed event");

        match step {
            Step::Ignore => {}
            Step::ShowMenu => self.say(sender, messages::main_menu()).await?,
            Step::ShowAbout => self.say(sender, self.config.about_text.clone()).await?,
            Step::Cancel => {
                self.store.clear(sender).await;
                self.say(sender, messages::CANCELLED).await?;
            }
            Step::Begin(next) => {
                self.store.begin(sender, next).await;
                self.say(sender, self.prompt_for(next)).await?;
            }
            Step::ConvertImage => self.convert_image(sender, attachment(event)?).await?,
            Step::BufferPdf => self.buffer_pdf(sender, attachment(event)?).await?,
            Step::FinalizeMerge => self.finalize_merge(sender).await?,
            Step::Compress => self.compress(sender, attachment(event)?).await?,
            Step::RejectAttachment {
                expected,
                keep_session,
            } => {
                let err = BotError::InvalidAttachment {
                    activity,
                    expected,
                    actual: attachment(event)?.mime_type.clone(),
                };
                warn!(%sender, error = %err, keep_session, "rejected attachment");
                self.say(sender, err.user_message()).await?;
                if !keep_session {
                    self.store.clear(sender).await;
                }
            }
        }
        Ok(step)
    }

    fn prompt_for(&self, activity: Activity) -> String {
        match activity {
            Activity::AwaitingImage => messages::IMAGE_PROMPT.to_string(),
            Activity::AwaitingMergeInputs => messages::merge_prompt(self.config.merge_max_inputs),
            Activity::AwaitingCompressInput => messages::COMPRESS_PROMPT.to_string(),
            Activity::Idle => messages::main_menu(),
        }
    }

    // ── Operations ───────────────────────────────────────────────────────

    async fn convert_image(&self, sender: &Identity, image: &Attachment) -> Result<(), BotError> {
        self.notice(sender, messages::IMAGE_PROCESSING).await?;
        match self
            .processor
            .image_to_document(&image.bytes, &image.mime_type)
            .await
        {
            Ok(pdf) => {
                info!(%sender, size = pdf.len(), "image converted");
                let file = OutgoingFile::pdf(output_name(image.file_name.as_deref(), ""), pdf);
                self.send(sender, Reply::file(file, messages::IMAGE_DONE))
                    .await?;
                self.store.clear(sender).await;
                Ok(())
            }
            Err(source) => {
                self.fail(
                    sender,
                    BotError::ProcessingFailure {
                        operation: Operation::ConvertImage,
                        source,
                    },
                )
                .await
            }
        }
    }

    async fn buffer_pdf(&self, sender: &Identity, pdf: &Attachment) -> Result<(), BotError> {
        let count = self.store.append(sender, pdf.clone()).await?;
        if count >= self.config.merge_max_inputs {
            let buffered = self.store.buffer_of(sender).await;
            self.merge(sender, buffered).await
        } else {
            self.say(sender, messages::merge_progress(count)).await
        }
    }

    async fn finalize_merge(&self, sender: &Identity) -> Result<(), BotError> {
        let buffered = self.store.buffer_of(sender).await;
        if buffered.len() < self.config.merge_min_inputs {
            let err = BotError::InsufficientInputs {
                received: buffered.len(),
                required: self.config.merge_min_inputs,
            };
            debug!(%sender, error = %err, "merge finalized too early");
            return self.say(sender, err.user_message()).await;
        }
        self.merge(sender, buffered).await
    }

    async fn merge(&self, sender: &Identity, buffered: Vec<Attachment>) -> Result<(), BotError> {
        self.notice(sender, messages::MERGE_WORKING).await?;
        let documents: Vec<Vec<u8>> = buffered.into_iter().map(|a| a.bytes).collect();
        match self.processor.merge_documents(&documents).await {
            Ok(pdf) => {
                info!(%sender, inputs = documents.len(), size = pdf.len(), "PDFs merged");
                let file = OutgoingFile::pdf(format!("merged-{}.pdf", timestamp()), pdf);
                self.send(sender, Reply::file(file, messages::MERGE_DONE))
                    .await?;
                self.store.clear(sender).await;
                Ok(())
            }
            Err(source) => {
                self.fail(
                    sender,
                    BotError::ProcessingFailure {
                        operation: Operation::Merge,
                        source,
                    },
                )
                .await
            }
        }
    }

    async fn compress(&self, sender: &Identity, pdf: &Attachment) -> Result<(), BotError> {
        self.notice(sender, messages::COMPRESS_WORKING).await?;
        match self.processor.compress_document(&pdf.bytes).await {
            Ok(compressed) => {
                let report = CompressionReport::new(pdf.len(), compressed.len());
                info!(
                    %sender,
                    original = report.original_size,
                    compressed = report.compressed_size,
                    "PDF compressed"
                );
                let file = OutgoingFile::pdf(
                    output_name(pdf.file_name.as_deref(), "-compressed"),
                    compressed,
                );
                self.send(sender, Reply::file(file, messages::compress_done(&report)))
                    .await?;
                self.store.clear(sender).await;
                Ok(())
            }
            Err(source) => {
                self.fail(
                    sender,
                    BotError::ProcessingFailure {
                        operation: Operation::Compress,
                        source,
                    },
                )
                .await
            }
        }
    }

    // ── Replies and failures ─────────────────────────────────────────────

    /// Report an operation failure and reset the sender to Idle.
    async fn fail(&self, sender: &Identity, err: BotError) -> Result<(), BotError> {
        warn!(%sender, error = %err, "operation failed");
        self.store.clear(sender).await;
        self.say(sender, err.user_message()).await
    }

    /// Last-resort handling for errors that escaped `dispatch`.
    async fn recover(&self, sender: &Identity, err: BotError) {
        error!(%sender, error = %err, "unhandled error while handling event");
        self.store.clear(sender).await;
        if let Err(e) = self.channel.send_text(sender, messages::GENERIC_ERROR).await {
            error!(%sender, error = %e, "could not deliver error reply");
        }
    }

    async fn notice(&self, sender: &Identity, text: &str) -> Result<(), BotError> {
        if self.config.progress_notices {
            self.say(sender, text).await?;
        }
        Ok(())
    }

    async fn say(&self, sender: &Identity, text: impl Into<String>) -> Result<(), BotError> {
        self.send(sender, Reply::text(text)).await
    }

    async fn send(&self, sender: &Identity, reply: Reply) -> Result<(), BotError> {
        self.channel
            .send(sender, &reply)
            .await
            .map_err(|e| BotError::Channel(format!("{e:#}")))
    }
}

fn attachment(event: &InboundEvent) -> Result<&Attachment, BotError> {
    event
        .attachment
        .as_ref()
        .ok_or_else(|| BotError::Internal("media step routed without an attachment".into()))
}

fn timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `<stem><suffix>.pdf` from the incoming file name, or `<millis><suffix>.pdf`.
fn output_name(incoming: Option<&str>, suffix: &str) -> String {
    let stem = incoming
        .and_then(|name| Path::new(name).file_stem())
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map_or_else(|| timestamp().to_string(), str::to_string);
    format!("{stem}{suffix}.pdf")
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_uses_incoming_stem() {
        assert_eq!(output_name(Some("holiday.jpg"), ""), "holiday.pdf");
        assert_eq!(
            output_name(Some("/tmp/report.pdf"), "-compressed"),
            "report-compressed.pdf"
        );
    }

    #[test]
    fn output_name_falls_back_to_timestamp() {
        let name = output_name(None, "-compressed");
        let stem = name.strip_suffix("-compressed.pdf").expect("suffix");
        assert!(stem.parse::<i64>().is_ok(), "got: {name}");
    }

    #[test]
    fn panic_message_extracts_payload() {
        let p: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(p), "panic: boom");
        let p: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(p), "panic: bang");
        let p: Box<dyn Any + Send> = Box::new(42u8);
        assert!(panic_message(p).contains("non-string"));
    }
}
