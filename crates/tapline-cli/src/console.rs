//! Prompt surface printing to the terminal.

use tapline_terminal::{Prompt, PromptResponse, PromptSurface};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// Prints notices and alerts to stdout.
///
/// Alerts offering an action ask for confirmation on stdin when the console
/// is interactive; otherwise they are dismissed.
#[derive(Debug, Clone, Copy)]
pub struct ConsolePrompt {
    interactive: bool,
}

impl ConsolePrompt {
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }
}

fn render(prompt: &Prompt) -> String {
    match prompt.message.as_deref() {
        Some(message) => format!("{}: {}", prompt.title, message),
        None => prompt.title.clone(),
    }
}

async fn read_answer() -> Option<String> {
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(e) => {
            warn!("Failed to read from stdin: {}", e);
            None
        }
    }
}

/// `y`/`yes` (any case) accepts the action.
fn accepts(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl PromptSurface for ConsolePrompt {
    async fn notify(&self, prompt: Prompt) {
        println!("✓ {}", render(&prompt));
    }

    async fn alert(&self, prompt: Prompt) -> PromptResponse {
        println!("! {}", render(&prompt));

        let Some(action) = prompt.action.as_ref() else {
            return PromptResponse::Dismissed;
        };
        if !self.interactive {
            return PromptResponse::Dismissed;
        }

        println!("  {}? [y/N]", action.label);
        match read_answer().await {
            Some(answer) if accepts(&answer) => PromptResponse::ActionSelected,
            _ => PromptResponse::Dismissed,
        }
    }
}
