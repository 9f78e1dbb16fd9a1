//! The conversation state machine, as a table.
//!
//! Each [`Rule`] pairs a state pattern and a trigger with the [`Step`] to
//! take. [`route`] returns the step of the first matching rule, so rule
//! order encodes precedence: cancel beats everything, and "done" beats a
//! media attachment while merging. An event matching no rule is ignored.
//!
//! Routing is pure. Executing a step (calling the processor, replying,
//! touching the session store) is [`crate::bot::PdfBot`]'s job.

use crate::channel::Attachment;
use crate::command::Command;
use crate::session::Activity;

/// Coarse classification of an attachment's media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
    Other,
}

impl MediaKind {
    pub fn of(attachment: &Attachment) -> Self {
        if attachment.is_pdf() {
            MediaKind::Pdf
        } else if attachment.is_image() {
            MediaKind::Image
        } else {
            MediaKind::Other
        }
    }
}

/// Which states a rule applies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    In(Activity),
    NotIdle,
}

impl When {
    fn matches(self, activity: Activity) -> bool {
        match self {
            When::In(a) => a == activity,
            When::NotIdle => !activity.is_idle(),
        }
    }
}

/// What part of the event a rule reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum On {
    Command(Command),
    Media(MediaKind),
    MediaExcept(MediaKind),
}

impl On {
    fn matches(self, command: Command, media: Option<MediaKind>) -> bool {
        match (self, media) {
            (On::Command(c), _) => c == command,
            (On::Media(k), Some(m)) => k == m,
            (On::MediaExcept(k), Some(m)) => k != m,
            (On::Media(_) | On::MediaExcept(_), None) => false,
        }
    }
}

/// Action to take for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No reply, no state change.
    Ignore,
    ShowMenu,
    ShowAbout,
    /// Clear the session and confirm.
    Cancel,
    /// Replace the session with a fresh one in this activity and prompt.
    Begin(Activity),
    /// Image → PDF, then clear.
    ConvertImage,
    /// Add the PDF to the merge buffer; merge if the buffer is now full.
    BufferPdf,
    /// Merge if enough PDFs are buffered, otherwise complain and stay.
    FinalizeMerge,
    /// Compress the PDF, then clear.
    Compress,
    /// Wrong media type for the activity.
    RejectAttachment {
        expected: &'static str,
        keep_session: bool,
    },
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub when: When,
    pub on: On,
    pub step: Step,
}

const fn rule(when: When, on: On, step: Step) -> Rule {
    Rule { when, on, step }
}

const IDLE: When = When::In(Activity::Idle);
const IMAGE: When = When::In(Activity::AwaitingImage);
const MERGE: When = When::In(Activity::AwaitingMergeInputs);
const COMPRESS: When = When::In(Activity::AwaitingCompressInput);

const ABORT_NOT_IMAGE: Step = Step::RejectAttachment {
    expected: "image",
    keep_session: false,
};
const RETRY_NOT_PDF: Step = Step::RejectAttachment {
    expected: "PDF",
    keep_session: true,
};
const ABORT_NOT_PDF: Step = Step::RejectAttachment {
    expected: "PDF",
    keep_session: false,
};

static RULES: [Rule; 13] = [
    rule(When::NotIdle, On::Command(Command::Cancel), Step::Cancel),
    rule(IDLE, On::Command(Command::Menu), Step::ShowMenu),
    rule(IDLE, On::Command(Command::ConvertImage), Step::Begin(Activity::AwaitingImage)),
    rule(IDLE, On::Command(Command::Merge), Step::Begin(Activity::AwaitingMergeInputs)),
    rule(IDLE, On::Command(Command::Compress), Step::Begin(Activity::AwaitingCompressInput)),
    rule(IDLE, On::Command(Command::About), Step::ShowAbout),
    rule(IMAGE, On::Media(MediaKind::Image), Step::ConvertImage),
    rule(IMAGE, On::MediaExcept(MediaKind::Image), ABORT_NOT_IMAGE),
    rule(MERGE, On::Command(Command::Done), Step::FinalizeMerge),
    rule(MERGE, On::Media(MediaKind::Pdf), Step::BufferPdf),
    rule(MERGE, On::MediaExcept(MediaKind::Pdf), RETRY_NOT_PDF),
    rule(COMPRESS, On::Media(MediaKind::Pdf), Step::Compress),
    rule(COMPRESS, On::MediaExcept(MediaKind::Pdf), ABORT_NOT_PDF),
];

/// The full transition table, in precedence order.
pub fn rules() -> &'static [Rule] {
    &RULES
}

/// Decide what to do with an event given the sender's current activity.
pub fn route(activity: Activity, command: Command, media: Option<MediaKind>) -> Step {
    RULES
        .iter()
        .find(|r| r.when.matches(activity) && r.on.matches(command, media))
        .map_or(Step::Ignore, |r| r.step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Activity::*;

    const ALL: [Activity; 4] = [Idle, AwaitingImage, AwaitingMergeInputs, AwaitingCompressInput];

    fn text(activity: Activity, body: &str) -> Step {
        route(activity, Command::parse(body), None)
    }

    #[test]
    fn idle_commands() {
        assert_eq!(text(Idle, "menu"), Step::ShowMenu);
        assert_eq!(text(Idle, "1"), Step::Begin(AwaitingImage));
        assert_eq!(text(Idle, "2"), Step::Begin(AwaitingMergeInputs));
        assert_eq!(text(Idle, "3"), Step::Begin(AwaitingCompressInput));
        assert_eq!(text(Idle, "4"), Step::ShowAbout);
    }

    #[test]
    fn idle_ignores_unknown_text_done_and_media() {
        assert_eq!(text(Idle, "hello there"), Step::Ignore);
        assert_eq!(text(Idle, "done"), Step::Ignore);
        assert_eq!(route(Idle, Command::Other, Some(MediaKind::Pdf)), Step::Ignore);
    }

    #[test]
    fn cancel_only_acts_outside_idle() {
        assert_eq!(text(Idle, "5"), Step::Ignore);
        for a in ALL.into_iter().filter(|a| !a.is_idle()) {
            assert_eq!(text(a, "5"), Step::Cancel, "{a:?}");
            // Cancel wins even when media is attached.
            assert_eq!(route(a, Command::Cancel, Some(MediaKind::Pdf)), Step::Cancel);
        }
    }

    #[test]
    fn menu_and_start_commands_ignored_mid_flight() {
        for a in ALL.into_iter().filter(|a| !a.is_idle()) {
            for body in ["menu", "1", "2", "3", "4", "whatever"] {
                assert_eq!(text(a, body), Step::Ignore, "{a:?} / {body}");
            }
        }
    }

    #[test]
    fn awaiting_image() {
        assert_eq!(
            route(AwaitingImage, Command::Other, Some(MediaKind::Image)),
            Step::ConvertImage
        );
        assert_eq!(
            route(AwaitingImage, Command::Other, Some(MediaKind::Pdf)),
            ABORT_NOT_IMAGE
        );
    }

    #[test]
    fn awaiting_merge() {
        assert_eq!(text(AwaitingMergeInputs, "done"), Step::FinalizeMerge);
        assert_eq!(
            route(AwaitingMergeInputs, Command::Other, Some(MediaKind::Pdf)),
            Step::BufferPdf
        );
        assert_eq!(
            route(AwaitingMergeInputs, Command::Other, Some(MediaKind::Image)),
            RETRY_NOT_PDF
        );
        // "done" as a caption on a PDF finalizes rather than buffering.
        assert_eq!(
            route(AwaitingMergeInputs, Command::Done, Some(MediaKind::Pdf)),
            Step::FinalizeMerge
        );
    }

    #[test]
    fn awaiting_compress() {
        assert_eq!(
            route(AwaitingCompressInput, Command::Other, Some(MediaKind::Pdf)),
            Step::Compress
        );
        assert_eq!(
            route(AwaitingCompressInput, Command::Other, Some(MediaKind::Other)),
            ABORT_NOT_PDF
        );
        assert_eq!(text(AwaitingCompressInput, "done"), Step::Ignore);
    }

    #[test]
    fn media_kind_classification() {
        assert_eq!(
            MediaKind::of(&Attachment::new("application/pdf", vec![])),
            MediaKind::Pdf
        );
        assert_eq!(
            MediaKind::of(&Attachment::new("image/jpeg", vec![])),
            MediaKind::Image
        );
        assert_eq!(
            MediaKind::of(&Attachment::new("text/plain", vec![])),
            MediaKind::Other
        );
    }

    #[test]
    fn every_media_state_handles_every_kind() {
        for a in [AwaitingImage, AwaitingMergeInputs, AwaitingCompressInput] {
            for k in [MediaKind::Image, MediaKind::Pdf, MediaKind::Other] {
                assert_ne!(route(a, Command::Other, Some(k)), Step::Ignore, "{a:?} / {k:?}");
            }
        }
        assert_eq!(rules().len(), 13);
    }
}
