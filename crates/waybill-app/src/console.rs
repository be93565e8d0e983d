//! Terminal surface for the assistant widget.
//!
//! [`ConsoleTarget`] renders transcript turns as text lines, [`PageSections`]
//! stands in for the host page's visible sections, and [`Command`] parses
//! what the user types at the prompt.

use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

use waybill_assistant::{LocationSource, RenderTarget};
use waybill_core::{Turn, TurnId, TurnKind};

// =============================================================================
// ConsoleTarget
// =============================================================================

/// Writes every turn to a text sink as soon as it is appended.
pub struct ConsoleTarget<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleTarget<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleTarget<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn out(&self) -> MutexGuard<'_, W> {
        self.out.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lines(&self, lines: &[String]) {
        let mut out = self.out();
        for line in lines {
            if let Err(e) = writeln!(out, "{}", line) {
                tracing::warn!(error = %e, "Console write failed");
                return;
            }
        }
        if let Err(e) = out.flush() {
            tracing::warn!(error = %e, "Console flush failed");
        }
    }
}

impl<W: Write + Send> RenderTarget for ConsoleTarget<W> {
    fn append(&self, turn: &Turn) {
        self.write_lines(&format_turn(turn));
    }

    fn remove(&self, id: TurnId) {
        tracing::trace!(turn_id = %id, "Typing indicator removed");
    }

    fn set_visible(&self, visible: bool) {
        let line = if visible {
            "[assistant opened]"
        } else {
            "[assistant closed]"
        };
        self.write_lines(&[line.to_string()]);
    }

    fn set_badge(&self, visible: bool) {
        if visible {
            self.write_lines(&["(1 new message, type /open)".to_string()]);
        }
    }
}

/// Text lines for one turn. Options are numbered from 1 for `/opt`.
pub fn format_turn(turn: &Turn) -> Vec<String> {
    match &turn.kind {
        TurnKind::User { text } => vec![format!("you> {}", text)],
        TurnKind::Typing => vec!["assistant is typing...".to_string()],
        TurnKind::Assistant { message, options } => {
            let mut lines = Vec::with_capacity(options.len() + 1);
            lines.push(format!("assistant> {}", message));
            lines.extend(
                options
                    .iter()
                    .enumerate()
                    .map(|(i, option)| format!("  [{}] {}", i + 1, option.trigger)),
            );
            lines
        }
    }
}

// =============================================================================
// PageSections
// =============================================================================

/// Sections the terminal "page" currently shows, changed with `/nav`.
#[derive(Debug, Default)]
pub struct PageSections {
    sections: Mutex<Vec<String>>,
}

impl PageSections {
    pub fn new(sections: Vec<String>) -> Self {
        Self {
            sections: Mutex::new(sections),
        }
    }

    pub fn replace(&self, sections: Vec<String>) {
        *self.sections.lock().unwrap_or_else(PoisonError::into_inner) = sections;
    }
}

impl LocationSource for PageSections {
    fn visible_sections(&self) -> Vec<String> {
        self.sections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// =============================================================================
// Command
// =============================================================================

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open,
    Close,
    Navigate(Vec<String>),
    /// 1-based index into the latest assistant turn's options.
    Choose(usize),
    Help,
    Quit,
    Say(String),
    Blank,
}

impl Command {
    /// Parse a prompt line. Unknown or malformed slash commands are
    /// reported as `Err` with a message for the user.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Blank);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Say(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        match name {
            "open" => Ok(Command::Open),
            "close" => Ok(Command::Close),
            "nav" => Ok(Command::Navigate(parts.map(str::to_string).collect())),
            "opt" => match parts.next().map(str::parse::<usize>) {
                Some(Ok(n)) if n > 0 => Ok(Command::Choose(n)),
                _ => Err("usage: /opt <n> (n starts at 1)".to_string()),
            },
            "help" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '/{}', type /help", other)),
        }
    }
}

pub const HELP: &str = "\
/open            open the assistant
/close           close the assistant
/nav <id>...     change the visible page sections (none = default area)
/opt <n>         click option n of the latest reply
/quit            exit
anything else    ask the assistant";

// =============================================================================
// Tests
// =============================================================================
