//! Console binary for pdfbot.
//!
//! Runs the bot against a terminal "chat": each stdin line is an inbound
//! message, replies are printed, and returned documents are written to the
//! output directory. Useful for trying flows without a chat transport.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use pdfbot::{
    Attachment, BotConfig, Identity, InboundEvent, MessagingChannel, OutgoingFile, PdfBot,
    PdfiumProcessor,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Console channel ──────────────────────────────────────────────────────────

/// Prints text replies and saves file replies under `output_dir`.
struct ConsoleChannel {
    output_dir: PathBuf,
}

#[async_trait]
impl MessagingChannel for ConsoleChannel {
    async fn send_text(&self, to: &Identity, text: &str) -> Result<()> {
        println!("{} {}", cyan(&format!("bot → {to}:")), text);
        Ok(())
    }

    async fn send_file(
        &self,
        to: &Identity,
        file: &OutgoingFile,
        caption: Option<&str>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;
        let path = self.output_dir.join(&file.file_name);
        tokio::fs::write(&path, &file.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        println!(
            "{} {} {}",
            cyan(&format!("bot → {to}:")),
            green(&format!("📎 {}", path.display())),
            dim(&format!("({} bytes)", file.bytes.len()))
        );
        if let Some(caption) = caption {
            println!("   {caption}");
        }
        Ok(())
    }
}

// ── Console input ────────────────────────────────────────────────────────────

/// One parsed stdin line.
#[derive(Debug, PartialEq, Eq)]
enum ConsoleInput {
    Text(String),
    Attach { path: PathBuf, caption: String },
    SwitchIdentity(String),
    Status,
    Help,
    Quit,
}

fn parse_line(line: &str) -> Option<ConsoleInput> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Some(ConsoleInput::Text(line.to_string()));
    };
    let (cmd, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();
    match cmd {
        "attach" if !args.is_empty() => {
            let (path, caption) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
            Some(ConsoleInput::Attach {
                path: PathBuf::from(path),
                caption: caption.trim().to_string(),
            })
        }
        "as" if !args.is_empty() => Some(ConsoleInput::SwitchIdentity(args.to_string())),
        "status" => Some(ConsoleInput::Status),
        "help" => Some(ConsoleInput::Help),
        "quit" | "exit" => Some(ConsoleInput::Quit),
        _ => None,
    }
}

async fn load_attachment(path: &Path) -> Result<Attachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read attachment {}", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut attachment = Attachment::new(mime.essence_str(), bytes);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        attachment = attachment.with_file_name(name);
    }
    Ok(attachment)
}

const CONSOLE_HELP: &str = "\
Type messages as the current sender. Console commands:
  /attach <path> [caption]   send a file (mime type guessed from extension)
  /as <identity>             switch sender
  /status                    print live sessions as JSON
  /help                      this text
  /quit                      exit";

// ── CLI ──────────────────────────────────────────────────────────────────────

/// Chat with the PDF bot from a terminal.
#[derive(Parser, Debug)]
#[command(
    name = "pdfbot",
    version,
    about = "Chat with the PDF bot from a terminal",
    long_about = "Runs the conversational PDF bot against stdin/stdout. Type \"menu\" to start; \
attach files with /attach <path>. Returned PDFs are written to --output-dir.",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// Sender identity for typed messages.
    #[arg(long, env = "PDFBOT_IDENTITY", default_value = "console")]
    identity: String,

    /// Directory returned documents are written to.
    #[arg(short, long, env = "PDFBOT_OUTPUT_DIR", default_value = "pdfbot-out")]
    output_dir: PathBuf,

    /// Seconds of inactivity before a session is discarded.
    #[arg(long, env = "PDFBOT_IDLE_TIMEOUT_SECS", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    idle_timeout_secs: u64,

    /// PDFs collected before a merge runs automatically.
    #[arg(long, env = "PDFBOT_MERGE_MAX", default_value_t = 2)]
    merge_max: usize,

    /// Send "working on it" notices before each operation.
    #[arg(long, env = "PDFBOT_PROGRESS_NOTICES")]
    progress_notices: bool,

    /// Path to libpdfium. Defaults to the system library.
    #[arg(long, env = "PDFBOT_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFBOT_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, env = "PDFBOT_QUIET")]
    quiet: bool,
}

fn build_config(cli: &Cli) -> Result<BotConfig> {
    let mut builder = BotConfig::builder()
        .idle_timeout(Duration::from_secs(cli.idle_timeout_secs))
        .merge_max_inputs(cli.merge_max)
        .progress_notices(cli.progress_notices);
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(path);
    }
    builder.build().context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let processor = Arc::new(PdfiumProcessor::new(config.pdfium_library_path.clone()));
    let channel = Arc::new(ConsoleChannel {
        output_dir: cli.output_dir.clone(),
    });
    let bot = PdfBot::new(config, processor, channel);

    eprintln!("{}", dim("Type \"menu\" to begin, /help for console commands."));

    let mut identity = cli.identity.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let event = match parse_line(&line) {
            Some(ConsoleInput::Text(text)) => InboundEvent::text(identity.as_str(), text),
            Some(ConsoleInput::Attach { path, caption }) => match load_attachment(&path).await {
                Ok(attachment) => InboundEvent {
                    text: caption,
                    ..InboundEvent::media(identity.as_str(), attachment)
                },
                Err(e) => {
                    eprintln!("{e:#}");
                    continue;
                }
            },
            Some(ConsoleInput::SwitchIdentity(next)) => {
                identity = next;
                eprintln!("{}", dim(&format!("now sending as {identity}")));
                continue;
            }
            Some(ConsoleInput::Status) => {
                let sessions = bot.sessions().await;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&sessions).context("Failed to serialise sessions")?
                );
                continue;
            }
            Some(ConsoleInput::Help) => {
                eprintln!("{CONSOLE_HELP}");
                continue;
            }
            Some(ConsoleInput::Quit) => break,
            None => {
                eprintln!("Unknown console command. {}", dim("/help lists them."));
                continue;
            }
        };
        bot.handle(event).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_text() {
        assert_eq!(parse_line("menu"), Some(ConsoleInput::Text("menu".into())));
        assert_eq!(parse_line(" 2 "), Some(ConsoleInput::Text(" 2 ".into())));
    }

    #[test]
    fn attach_with_and_without_caption() {
        assert_eq!(
            parse_line("/attach a.pdf"),
            Some(ConsoleInput::Attach {
                path: "a.pdf".into(),
                caption: String::new()
            })
        );
        assert_eq!(
            parse_line("/attach scans/b.png  5"),
            Some(ConsoleInput::Attach {
                path: "scans/b.png".into(),
                caption: "5".into()
            })
        );
        assert_eq!(parse_line("/attach"), None);
    }

    #[test]
    fn console_commands() {
        assert_eq!(parse_line("/as bob"), Some(ConsoleInput::SwitchIdentity("bob".into())));
        assert_eq!(parse_line("/status"), Some(ConsoleInput::Status));
        assert_eq!(parse_line("/exit"), Some(ConsoleInput::Quit));
        assert_eq!(parse_line("/bogus"), None);
    }

    #[test]
    fn config_from_cli_defaults() {
        let cli = Cli::parse_from(["pdfbot"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.merge_max_inputs, 2);
    }

    #[tokio::test]
    async fn attachment_mime_is_guessed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let a = load_attachment(&path).await.unwrap();
        assert!(a.is_pdf());
        assert_eq!(a.file_name.as_deref(), Some("scan.pdf"));
    }

    #[tokio::test]
    async fn console_channel_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let channel = ConsoleChannel {
            output_dir: dir.path().join("out"),
        };
        let file = OutgoingFile::pdf("merged-1.pdf", b"%PDF-1.7".to_vec());
        channel
            .send_file(&Identity::new("t"), &file, Some("done"))
            .await
            .unwrap();
        let written = std::fs::read(dir.path().join("out/merged-1.pdf")).unwrap();
        assert_eq!(written, b"%PDF-1.7");
    }
}
