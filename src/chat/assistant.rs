//! Accumulates the free text of one assistant turn.

use tracing::warn;

use crate::error::ColloquyError;
use crate::types::Message;

/// Where a turn's text is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    NotStarted,
    Accumulating,
    Finished,
}

/// Builds the assistant text message of a single turn.
///
/// `finish` is the only way content leaves the builder, and it succeeds once,
/// so a turn can never append its text to history twice.
#[derive(Debug, Default)]
pub struct AssistantTurnBuilder {
    state: TurnState,
    content: String,
    displayed: bool,
}

impl AssistantTurnBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn has_text(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.state == TurnState::Finished
    }

    /// Add a text fragment. Returns false (and drops the text) once finished.
    pub fn append(&mut self, fragment: &str) -> bool {
        match self.state {
            TurnState::Finished => {
                warn!(
                    len = fragment.len(),
                    "dropping text that arrived after the assistant turn finished"
                );
                false
            }
            _ => {
                self.state = TurnState::Accumulating;
                self.content.push_str(fragment);
                true
            }
        }
    }

    /// Record that the turn has been shown. True only on the first call.
    pub fn mark_displayed(&mut self) -> bool {
        !std::mem::replace(&mut self.displayed, true)
    }

    pub fn is_displayed(&self) -> bool {
        self.displayed
    }

    /// Close the turn and take its message. The content may be empty.
    pub fn finish(&mut self) -> Result<Message, ColloquyError> {
        if self.is_finished() {
            return Err(ColloquyError::InvalidState(
                "assistant turn already finished".into(),
            ));
        }
        self.state = TurnState::Finished;
        Ok(Message::assistant(std::mem::take(&mut self.content)))
    }
}
