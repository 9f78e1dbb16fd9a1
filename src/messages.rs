//! Every user-visible reply the bot sends.
//!
//! Keeping the wording in one place means a copy change touches exactly one
//! file, and tests can compare replies against the same constants the bot
//! uses instead of duplicating string literals.

use crate::command::Command;
use crate::processor::CompressionReport;

/// Menu entries in display order.
const MENU_ENTRIES: [(Command, &str); 5] = [
    (Command::ConvertImage, "📸 Convert Image to PDF"),
    (Command::Merge, "🔄 Merge PDFs"),
    (Command::Compress, "🗜️ Compress PDF"),
    (Command::About, "ℹ️ About PDF Bot"),
    (Command::Cancel, "❌ Cancel Operation"),
];

pub const CANCELLED: &str = "✅ Operation cancelled. Type \"menu\" to start again.";

pub const IMAGE_PROMPT: &str = "📸 Please send the image you want to convert to PDF.";
pub const IMAGE_PROCESSING: &str = "🔄 Processing your image...";
pub const IMAGE_DONE: &str = "✅ Here is your PDF!";
pub const IMAGE_FAILED: &str =
    "❌ Failed to convert image. Please make sure you sent a valid image file.";

pub const MERGE_WORKING: &str = "🔄 Merging PDFs...";
pub const MERGE_DONE: &str = "✅ PDFs merged successfully!";
pub const MERGE_FAILED: &str = "❌ Failed to merge PDFs. Please try again.";
pub const MERGE_WRONG_TYPE: &str = "❌ Please send a PDF file.";

pub const COMPRESS_PROMPT: &str = "🗜️ Please send the PDF you want to compress.";
pub const COMPRESS_WORKING: &str = "🗜️ Compressing your PDF...";
pub const COMPRESS_FAILED: &str =
    "❌ Failed to compress PDF. Please make sure you sent a valid PDF file.";

pub const GENERIC_ERROR: &str = "❌ An error occurred. Please type \"menu\" to start over.";

/// Render the command list shown for `menu`.
pub fn main_menu() -> String {
    let mut menu = String::from("*PDF Bot Commands*\n\n");
    for (command, description) in MENU_ENTRIES {
        if let Some(key) = command.keyword() {
            menu.push_str(&format!("*{key}*: {description}\n"));
        }
    }
    menu.push_str("\nType \"menu\" anytime to see this list again.");
    menu
}

pub fn merge_prompt(max_inputs: usize) -> String {
    format!(
        "🔄 Please send your PDFs one by one (maximum {max_inputs}). \
Send \"done\" when finished or \"5\" to cancel."
    )
}

pub fn merge_insufficient(min_inputs: usize) -> String {
    format!("❌ Please send at least {min_inputs} PDFs to merge.")
}

pub fn merge_progress(count: usize) -> String {
    format!("✅ PDF {count} received. Please send another PDF or type \"done\" when finished.")
}

pub fn compress_done(report: &CompressionReport) -> String {
    format!("✅ PDF compressed successfully!\n{}", report.summary())
}
