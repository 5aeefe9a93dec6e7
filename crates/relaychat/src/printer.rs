use std::fmt::Write as _;

use owo_colors::OwoColorize;
use relaychat_core::ChatView;
use relaychat_core::conversation::{MessageKind, Role};

const BAR_CHAR: &str = "▎";

/// Turns successive [`ChatView`]s into terminal output.
///
/// A terminal can only append, so the printer remembers what it has
/// already written: system messages are printed once each, and the answer
/// being typed is printed as it grows. An answer that restarts from
/// scratch is printed again on a fresh line.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    system_printed: usize,
    answers_seen: usize,
    // The part of the current answer already on screen.
    answer_printed: String,
    answer_open: bool,
}

impl TranscriptPrinter {
    /// Returns the text to write to bring the terminal up to date with
    /// `view`.
    pub fn render(&mut self, view: &ChatView) -> String {
        let mut out = String::new();
        let messages = view.transcript.messages();

        let notices: Vec<_> = messages
            .iter()
            .filter(|msg| msg.role == Role::System)
            .collect();
        for msg in notices.iter().skip(self.system_printed) {
            self.close_answer(&mut out);
            let bar = match msg.kind {
                Some(MessageKind::Error) => BAR_CHAR.bright_red().to_string(),
                Some(MessageKind::Warning) => {
                    BAR_CHAR.bright_yellow().to_string()
                }
                _ => BAR_CHAR.bright_blue().to_string(),
            };
            writeln!(out, "{bar}{}", msg.text.dimmed()).ok();
        }
        self.system_printed = notices.len();

        let answers = messages.iter().filter(|msg| msg.is_assistant()).count();
        let Some(answer) = view.transcript.assistant_tail() else {
            self.close_answer(&mut out);
            self.answers_seen = answers;
            return out;
        };
        if answers != self.answers_seen
            || !answer.starts_with(self.answer_printed.as_str())
        {
            self.close_answer(&mut out);
            self.answers_seen = answers;
        }

        let new_text = &answer[self.answer_printed.len()..];
        if !new_text.is_empty() {
            if !self.answer_open {
                write!(out, "{}🤖 ", BAR_CHAR.bright_cyan()).ok();
                self.answer_open = true;
            }
            write!(out, "{}", new_text.bright_white()).ok();
            self.answer_printed.push_str(new_text);
        }
        out
    }

    fn close_answer(&mut self, out: &mut String) {
        if self.answer_open {
            out.push('\n');
            self.answer_open = false;
        }
        self.answer_printed.clear();
    }
}
