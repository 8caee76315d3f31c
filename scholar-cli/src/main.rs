mod client;
mod terminal;

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::client::{AskClient, DEFAULT_API_URL};
use crate::terminal::Terminal;

/// Interactive terminal client for the scholar question answering server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Full URL of the ask endpoint
    #[arg(long, env = "SCHOLAR_API_URL", default_value = DEFAULT_API_URL)]
    url: String,
}

#[derive(Debug, PartialEq)]
enum Input {
    Quit,
    Empty,
    Question(String),
}

fn classify(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Empty
    } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        Input::Quit
    } else {
        Input::Question(trimmed.to_string())
    }
}

/// Read questions until exit, EOF or Ctrl-C, printing each reply.
async fn repl<R, W>(client: &AskClient, input: R, terminal: &mut Terminal<W>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        terminal.prompt()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                terminal.print_goodbye(true)?;
                return Ok(());
            }
        };
        let Some(line) = line else {
            terminal.print_goodbye(true)?;
            return Ok(());
        };

        let question = match classify(&line) {
            Input::Quit => {
                terminal.print_goodbye(false)?;
                return Ok(());
            }
            Input::Empty => continue,
            Input::Question(question) => question,
        };

        tokio::select! {
            reply = client.ask(&question) => match reply {
                Ok(reply) => terminal.print_reply(&reply)?,
                Err(e) => terminal.print_failure(&e)?,
            },
            _ = tokio::signal::ctrl_c() => {
                terminal.print_goodbye(true)?;
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let client = AskClient::new(&args.url);
    let mut terminal = Terminal::stdout();

    terminal.print_banner(client.url())?;
    repl(&client, BufReader::new(tokio::io::stdin()), &mut terminal).await
}
