//! Interactive menu

use crate::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Entry chosen from the interactive menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Scrape,
    Check,
    Exit,
}

impl MenuChoice {
    /// Accepts the number, the full name or its first letter
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "1" | "s" | "scrape" => Some(MenuChoice::Scrape),
            "2" | "c" | "check" => Some(MenuChoice::Check),
            "3" | "e" | "q" | "exit" | "quit" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

const MENU: &str = "\n[1] Scrape proxies from sources\n[2] Check proxies\n[3] Exit\n> ";

/// Print the menu and read until a valid choice is entered.
/// End of input counts as [`MenuChoice::Exit`].
pub async fn prompt<R, W>(input: &mut R, out: &mut W) -> Result<MenuChoice>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut line = String::new();
    loop {
        write!(out, "{MENU}")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            return Ok(MenuChoice::Exit);
        }
        match MenuChoice::parse(&line) {
            Some(choice) => return Ok(choice),
            None => writeln!(out, "Unknown option: {}", line.trim())?,
        }
    }
}
