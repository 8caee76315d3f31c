use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};
use std::fmt::Display;
use std::io::{self, Write};

use crate::client::Reply;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const HEADER: Color = Color::Cyan;
    const PROMPT: Color = Color::Magenta;
    const ANSWER: Color = Color::Green;
    const ERROR: Color = Color::Red;
    const GOODBYE: Color = Color::Yellow;
    const DIM: Color = Color::DarkGrey;
}

pub const NO_ANSWER: &str = "[No answer]";

fn separator() -> String {
    "-".repeat(60)
}

/// Styled output for the interactive loop.
pub struct Terminal<W: Write> {
    out: W,
}

impl Terminal<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Terminal<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn print_banner(&mut self, url: &str) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(Colors::HEADER),
            SetAttribute(Attribute::Bold),
            Print("Scholar Research Copilot (CLI Mode)\n"),
            SetAttribute(Attribute::Reset),
            SetForegroundColor(Colors::DIM),
            Print(format!("Server: {url}\n")),
            ResetColor,
            Print("Type 'exit' to quit.\n\n"),
        )?;
        self.out.flush()
    }

    pub fn prompt(&mut self) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(Colors::PROMPT),
            Print("Ask: "),
            ResetColor,
        )?;
        self.out.flush()
    }

    pub fn print_reply(&mut self, reply: &Reply) -> io::Result<()> {
        match reply {
            Reply::Answer(answer) => {
                queue!(
                    self.out,
                    Print("\n"),
                    SetForegroundColor(Colors::ANSWER),
                    SetAttribute(Attribute::Bold),
                    Print("Answer:"),
                    SetAttribute(Attribute::Reset),
                    ResetColor,
                    Print("\n\n"),
                    Print(answer.as_deref().unwrap_or(NO_ANSWER)),
                    Print(format!("\n\n{}\n\n", separator())),
                )?;
            }
            Reply::Error { status, body } => {
                queue!(
                    self.out,
                    SetForegroundColor(Colors::ERROR),
                    Print(format!("Error {status}:")),
                    ResetColor,
                    Print(format!(" {body}\n")),
                )?;
            }
        }
        self.out.flush()
    }

    pub fn print_failure(&mut self, error: &impl Display) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(Colors::ERROR),
            Print("Request failed:"),
            ResetColor,
            Print(format!(" {error}\n")),
        )?;
        self.out.flush()
    }

    pub fn print_goodbye(&mut self, newline: bool) -> io::Result<()> {
        if newline {
            queue!(self.out, Print("\n"))?;
        }
        queue!(
            self.out,
            SetForegroundColor(Colors::GOODBYE),
            SetAttribute(Attribute::Bold),
            Print("Goodbye.\n"),
            SetAttribute(Attribute::Reset),
            ResetColor,
        )?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(f: impl FnOnce(&mut Terminal<Vec<u8>>) -> io::Result<()>) -> String {
        let mut terminal = Terminal::new(Vec::new());
        f(&mut terminal).unwrap();
        String::from_utf8(terminal.into_inner()).unwrap()
    }

    #[test]
    fn test_answer_is_followed_by_separator() {
        let text = rendered(|t| t.print_reply(&Reply::Answer(Some("42".to_string()))));
        assert!(text.contains("Answer:"));
        assert!(text.contains("42"));
        assert!(text.contains(&"-".repeat(60)));
    }

    #[test]
    fn test_missing_answer_placeholder() {
        let text = rendered(|t| t.print_reply(&Reply::Answer(None)));
        assert!(text.contains("[No answer]"));
    }

    #[test]
    fn test_error_prints_status_and_body() {
        let text = rendered(|t| {
            t.print_reply(&Reply::Error {
                status: 500,
                body: r#"{"error":"boom"}"#.to_string(),
            })
        });
        assert!(text.contains("Error 500:"));
        assert!(text.contains(r#"{"error":"boom"}"#));
        assert!(!text.contains(&"-".repeat(60)));
    }

    #[test]
    fn test_failure_and_goodbye() {
        let text = rendered(|t| {
            t.print_failure(&"connection refused")?;
            t.print_goodbye(true)
        });
        assert!(text.contains("Request failed:"));
        assert!(text.contains("connection refused"));
        assert!(text.contains("Goodbye."));
    }
}
