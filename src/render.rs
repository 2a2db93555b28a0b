//! Output rendering for the chat view.
//!
//! The controller republishes the transcript through a [`TranscriptSink`]
//! after every mutation.  [`TerminalRenderer`] turns those publications into
//! incremental terminal output; [`render_transcript`] renders a whole
//! transcript at once and is what `/history` prints.

use std::io::{self, Stdout, Write};

use time::macros::format_description;

use crate::transcript::{MessageId, MessageState, Role, Transcript};

/// ANSI escape code for bold text (used for headings).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for labels and code fences).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for headings and assistant labels).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for code).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for user labels).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for error notices).
const ANSI_RED: &str = "\x1b[31m";

/// Shown after the content of a message that is still generating.
pub const IN_PROGRESS_INDICATOR: &str = "▍";

/// What changed in the transcript since the last publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A message was appended.
    Appended(MessageId),
    /// A fragment was concatenated onto the in-progress message.
    Fragment { id: MessageId, text: String },
    /// The in-progress message finished normally.
    Completed(MessageId),
    /// The in-progress message stopped because its stream failed.
    Interrupted(MessageId),
}

/// Observer of transcript republications.
pub trait TranscriptSink: Send {
    /// Called after every transcript mutation with the new state.
    fn publish(&mut self, transcript: &Transcript, change: &Change);
}

/// Discards every publication.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TranscriptSink for NullSink {
    fn publish(&mut self, _: &Transcript, _: &Change) {}
}

//////////////////////////////////////// TerminalRenderer ////////////////////////////////////////

/// Incremental terminal output with optional ANSI styling.
///
/// Assistant text is written as it arrives.  User messages are not echoed.
/// Complete assistant messages that appear at once (error notices) are
/// printed in red when color is enabled.
pub struct TerminalRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl TerminalRenderer<Stdout> {
    pub fn new(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        // A closed terminal is not worth failing the turn over.
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.use_color {
            format!("{color}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl<W: Write + Send> TranscriptSink for TerminalRenderer<W> {
    fn publish(&mut self, transcript: &Transcript, change: &Change) {
        match change {
            Change::Appended(id) => {
                let Some(message) = transcript.get(*id) else {
                    return;
                };
                match (message.role, message.state) {
                    (Role::User, _) => {}
                    (Role::Assistant, MessageState::Pending) => {
                        let label = self.paint("assistant>", ANSI_DIM);
                        self.write(&format!("{label} "));
                    }
                    (Role::Assistant, _) => {
                        let notice = self.paint(&message.content, ANSI_RED);
                        self.write(&format!("{notice}\n"));
                    }
                }
            }
            Change::Fragment { text, .. } => self.write(text),
            Change::Completed(_) | Change::Interrupted(_) => self.write("\n"),
        }
    }
}

/////////////////////////////////////////// Full render ///////////////////////////////////////////

/// Render every message of a transcript.
///
/// Pure: rendering the same transcript twice yields the same text.
pub fn render_transcript(transcript: &Transcript, use_color: bool) -> String {
    let time_format = format_description!("[hour]:[minute]:[second]");
    let mut out = String::new();
    for message in transcript {
        let time = message.created_at.format(time_format).unwrap_or_default();
        let label = format!("[{} {time}]", message.role);
        if use_color {
            let color = match message.role {
                Role::User => ANSI_GREEN,
                Role::Assistant => ANSI_CYAN,
            };
            out.push_str(&format!("{color}{label}{ANSI_RESET}\n"));
        } else {
            out.push_str(&label);
            out.push('\n');
        }
        match message.role {
            Role::User => out.push_str(&message.content),
            Role::Assistant => out.push_str(&style_markdown(&message.content, use_color)),
        }
        if message.in_progress() {
            out.push_str(IN_PROGRESS_INDICATOR);
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Light, line-based terminal styling of markdown.
///
/// Headings are bold cyan, fenced code blocks yellow with a dimmed language
/// label, and inline code spans yellow.  Without color the text is returned
/// unchanged.
pub fn style_markdown(text: &str, use_color: bool) -> String {
    if !use_color {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;
    for line in text.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        if let Some(language) = body.trim_start().strip_prefix("```") {
            in_fence = !in_fence;
            out.push_str(ANSI_DIM);
            out.push_str("```");
            out.push_str(language);
            out.push_str(ANSI_RESET);
        } else if in_fence {
            out.push_str(ANSI_YELLOW);
            out.push_str(body);
            out.push_str(ANSI_RESET);
        } else if is_heading(body) {
            out.push_str(ANSI_BOLD);
            out.push_str(ANSI_CYAN);
            out.push_str(body);
            out.push_str(ANSI_RESET);
        } else {
            out.push_str(&style_inline_code(body));
        }
        out.push_str(newline);
    }
    out
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

fn style_inline_code(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find('`') {
        let Some(len) = rest[start + 1..].find('`') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(ANSI_YELLOW);
        out.push_str(&rest[start + 1..start + 1 + len]);
        out.push_str(ANSI_RESET);
        rest = &rest[start + len + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript_with_turn() -> (Transcript, MessageId) {
        let mut transcript = Transcript::with_welcome("Hi!");
        transcript.push_user("How do I deploy?");
        let id = transcript.begin_assistant().unwrap();
        transcript.append_fragment(id, "Run `npm run build`.").unwrap();
        (transcript, id)
    }

    #[test]
    fn render_is_idempotent() {
        let (transcript, _) = transcript_with_turn();
        assert_eq!(
            render_transcript(&transcript, true),
            render_transcript(&transcript, true)
        );
        assert_eq!(
            render_transcript(&transcript, false),
            render_transcript(&transcript, false)
        );
    }

    #[test]
    fn in_progress_indicator_follows_state() {
        let (mut transcript, id) = transcript_with_turn();
        let rendered = render_transcript(&transcript, false);
        assert!(rendered.contains("Run `npm run build`.▍"));
        assert_eq!(rendered.matches(IN_PROGRESS_INDICATOR).count(), 1);

        transcript.interrupt(id).unwrap();
        let rendered = render_transcript(&transcript, false);
        assert!(!rendered.contains(IN_PROGRESS_INDICATOR));
        assert!(rendered.contains("[user "));
        assert!(rendered.contains("[assistant "));
    }

    #[test]
    fn plain_markdown_is_unchanged() {
        let text = "# Title\n```bash\nnpm start\n```\nuse `x`";
        assert_eq!(style_markdown(text, false), text);
    }

    #[test]
    fn styles_headings_and_code() {
        let styled = style_markdown("## Deploy\n```bash\nnpm run build\n```\nthen `serve`\n", true);
        assert!(styled.contains(&format!("{ANSI_BOLD}{ANSI_CYAN}## Deploy{ANSI_RESET}\n")));
        assert!(styled.contains(&format!("{ANSI_DIM}```bash{ANSI_RESET}\n")));
        assert!(styled.contains(&format!("{ANSI_YELLOW}npm run build{ANSI_RESET}\n")));
        assert!(styled.contains(&format!("then {ANSI_YELLOW}serve{ANSI_RESET}\n")));
    }

    #[test]
    fn hashtag_is_not_a_heading() {
        assert!(is_heading("# a"));
        assert!(!is_heading("#hashtag"));
        assert!(!is_heading("####### seven"));
    }

    #[test]
    fn unmatched_backtick_is_kept() {
        assert_eq!(style_inline_code("a ` b"), "a ` b");
        assert_eq!(
            style_inline_code("`a` and `b"),
            format!("{ANSI_YELLOW}a{ANSI_RESET} and `b")
        );
    }

    #[test]
    fn terminal_renderer_streams_fragments() {
        let mut transcript = Transcript::new();
        let mut renderer = TerminalRenderer::with_writer(Vec::new(), false);

        let user = transcript.push_user("q");
        renderer.publish(&transcript, &Change::Appended(user));
        let id = transcript.begin_assistant().unwrap();
        renderer.publish(&transcript, &Change::Appended(id));
        for text in ["Hel", "lo"] {
            transcript.append_fragment(id, text).unwrap();
            renderer.publish(&transcript, &Change::Fragment { id, text: text.to_string() });
        }
        transcript.interrupt(id).unwrap();
        renderer.publish(&transcript, &Change::Interrupted(id));
        let notice = transcript.push_notice("Oops.");
        renderer.publish(&transcript, &Change::Appended(notice));

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(output, "assistant> Hello\nOops.\n");
    }
}
