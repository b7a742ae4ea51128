//! Operator interaction capability.
//!
//! All blocking terminal input goes through the [`Prompt`] trait so the
//! workflow engine never reads stdin directly; tests substitute a scripted
//! implementation.

use anyhow::{Context, Result};
use std::io::{self, Write};

/// Questions the workflow engine may put to the operator.
pub trait Prompt {
    /// Yes/no question. Returns `false` for anything but an explicit yes.
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Free-text question; empty input selects the default.
    fn input(&mut self, question: &str, default: &str) -> Result<String>;

    /// Pick one of several named candidates; returns the chosen index.
    fn choose(&mut self, question: &str, options: &[String]) -> Result<usize>;
}

/// Interactive prompt reading from stdin.
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn read_line(&self) -> Result<String> {
        io::stdout().flush().context("Failed to flush stdout")?;
        let mut line = String::new();
        io::stdin()
            .read_line(&mut line)
            .context("Failed to read operator input")?;
        Ok(line.trim().to_string())
    }
}

impl Prompt for TerminalPrompt {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        print!("{} [y/N]: ", question);
        let answer = self.read_line()?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }

    fn input(&mut self, question: &str, default: &str) -> Result<String> {
        print!("{} [{}]: ", question, default);
        let answer = self.read_line()?;
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer)
        }
    }

    fn choose(&mut self, question: &str, options: &[String]) -> Result<usize> {
        loop {
            println!("{}", question);
            for (i, option) in options.iter().enumerate() {
                println!("  {}. {}", i + 1, option);
            }
            print!("Select an option: ");
            let answer = self.read_line()?;
            match answer.parse::<usize>() {
                Ok(n) if n >= 1 && n <= options.len() => return Ok(n - 1),
                _ => println!("Invalid option. Please select 1-{}.", options.len()),
            }
        }
    }
}
