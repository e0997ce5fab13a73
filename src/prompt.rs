//! Operator confirmation

use std::io::{self, BufRead, IsTerminal, Write};

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("no terminal attached to ask: {0}")]
    NotInteractive(String),

    #[error("failed to read answer: {0}")]
    Io(#[from] io::Error),
}

/// Asks the operator a yes/no question
pub trait Confirm: Send + Sync {
    fn confirm(&self, message: &str) -> Result<bool, PromptError>;
}

/// Asks on stderr and reads stdin. Anything other than `y`/`yes` is a no.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl Confirm for TerminalPrompt {
    fn confirm(&self, message: &str) -> Result<bool, PromptError> {
        if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
            return Err(PromptError::NotInteractive(message.to_string()));
        }

        let mut stderr = io::stderr();
        write!(stderr, "{} [y/N] ", message)?;
        stderr.flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;

        Ok(is_yes(&input))
    }
}

/// Always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _message: &str) -> Result<bool, PromptError> {
        Ok(self.0)
    }
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
