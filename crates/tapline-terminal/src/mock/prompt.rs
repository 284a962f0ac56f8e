//! Mock prompt surface recording everything shown to the operator.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::traits::PromptSurface;
use crate::types::{Prompt, PromptResponse};

/// How a prompt was presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Non-blocking notice.
    Notice,

    /// Blocking modal.
    Alert,
}

/// A prompt as it was shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownPrompt {
    pub kind: PromptKind,
    pub prompt: Prompt,
}

#[derive(Debug, Default)]
struct PromptState {
    shown: Vec<ShownPrompt>,
    response: PromptResponse,
}

fn lock(state: &Mutex<PromptState>) -> MutexGuard<'_, PromptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock prompt surface for testing and development.
///
/// Alerts are answered immediately with the configured response
/// (`Dismissed` by default).
#[derive(Debug)]
pub struct MockPrompt {
    state: Arc<Mutex<PromptState>>,
}

impl MockPrompt {
    /// Create a new mock prompt surface.
    pub fn new() -> (Self, MockPromptHandle) {
        let state = Arc::new(Mutex::new(PromptState::default()));
        (
            Self {
                state: state.clone(),
            },
            MockPromptHandle { state },
        )
    }
}

impl Default for MockPrompt {
    fn default() -> Self {
        Self::new().0
    }
}

impl PromptSurface for MockPrompt {
    async fn notify(&self, prompt: Prompt) {
        lock(&self.state).shown.push(ShownPrompt {
            kind: PromptKind::Notice,
            prompt,
        });
    }

    async fn alert(&self, prompt: Prompt) -> PromptResponse {
        let mut state = lock(&self.state);
        state.shown.push(ShownPrompt {
            kind: PromptKind::Alert,
            prompt,
        });
        state.response
    }
}

/// Handle for inspecting a mock prompt surface.
#[derive(Debug, Clone)]
pub struct MockPromptHandle {
    state: Arc<Mutex<PromptState>>,
}

impl MockPromptHandle {
    /// Answer future alerts with `response`.
    pub fn respond_with(&self, response: PromptResponse) {
        lock(&self.state).response = response;
    }

    /// Everything shown so far, in order.
    pub fn shown(&self) -> Vec<ShownPrompt> {
        lock(&self.state).shown.clone()
    }

    /// Titles of everything shown so far, in order.
    pub fn titles(&self) -> Vec<String> {
        lock(&self.state)
            .shown
            .iter()
            .map(|s| s.prompt.title.clone())
            .collect()
    }

    /// Blocking alerts shown so far.
    pub fn alerts(&self) -> Vec<Prompt> {
        lock(&self.state)
            .shown
            .iter()
            .filter(|s| s.kind == PromptKind::Alert)
            .map(|s| s.prompt.clone())
            .collect()
    }

    /// Most recent prompt.
    pub fn last(&self) -> Option<ShownPrompt> {
        lock(&self.state).shown.last().cloned()
    }

    pub fn clear(&self) {
        lock(&self.state).shown.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PromptActionKind;

    #[tokio::test]
    async fn test_records_notices_and_alerts() {
        let (prompt, handle) = MockPrompt::new();

        prompt.notify(Prompt::new("Reader connected successfully")).await;
        let response = prompt
            .alert(Prompt::new("Error collecting payment").with_message("Declined"))
            .await;

        assert_eq!(response, PromptResponse::Dismissed);
        assert_eq!(
            handle.titles(),
            vec!["Reader connected successfully", "Error collecting payment"]
        );
        assert_eq!(handle.alerts().len(), 1);
        assert_eq!(handle.last().unwrap().kind, PromptKind::Alert);
    }

    #[tokio::test]
    async fn test_configured_response() {
        let (prompt, handle) = MockPrompt::new();
        handle.respond_with(PromptResponse::ActionSelected);

        let location_prompt = Prompt::new("Access to location")
            .with_action("Activate", PromptActionKind::OpenSettings);
        let response = prompt.alert(location_prompt).await;
        assert_eq!(response, PromptResponse::ActionSelected);

        handle.clear();
        assert!(handle.shown().is_empty());
    }
}
