//! Text command vocabulary.
//!
//! Message bodies are trimmed and lower-cased before matching, so `" MENU "`
//! and `"menu"` are the same command. Anything outside the vocabulary parses
//! to [`Command::Other`] and is left to the router to ignore.

/// A parsed text command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Menu,
    ConvertImage,
    Merge,
    Compress,
    About,
    Cancel,
    Done,
    /// Empty body or free-form text.
    Other,
}

impl Command {
    /// Parse a raw message body.
    pub fn parse(body: &str) -> Self {
        match body.trim().to_lowercase().as_str() {
            "menu" => Command::Menu,
            "1" => Command::ConvertImage,
            "2" => Command::Merge,
            "3" => Command::Compress,
            "4" => Command::About,
            "5" => Command::Cancel,
            "done" => Command::Done,
            _ => Command::Other,
        }
    }

    /// The keyword a user types for this command.
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Command::Menu => Some("menu"),
            Command::ConvertImage => Some("1"),
            Command::Merge => Some("2"),
            Command::Compress => Some("3"),
            Command::About => Some("4"),
            Command::Cancel => Some("5"),
            Command::Done => Some("done"),
            Command::Other => None,
        }
    }
}
