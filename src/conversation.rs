//! Whether the chat input accepts a new message, derived from history.
//!
//! Nothing here is stored: every render pass recomputes the state from the
//! entries themselves.

use serde::Serialize;
use serde_json::Value;

use crate::widgets::{Entry, Render, WidgetError};

pub const PLACEHOLDER_ACCEPTING: &str = "Type your message";
pub const PLACEHOLDER_FREE_TEXT: &str = "Please type input above";
pub const PLACEHOLDER_SELECTION: &str = "Please make a selection above";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChatState {
    AcceptingInput,
    BlockedOnWidget { key: String, free_text: bool },
}

impl ChatState {
    pub fn is_blocked(&self) -> bool {
        matches!(self, ChatState::BlockedOnWidget { .. })
    }
}

/// Blocked iff the last entry is an enabled input widget without a value.
pub fn chat_state(history: &[Entry]) -> ChatState {
    match history.last() {
        Some(Entry::Input(w)) if !w.disabled && !w.is_answered() => ChatState::BlockedOnWidget {
            key: w.key.clone(),
            free_text: w.blocks_next_input(),
        },
        _ => ChatState::AcceptingInput,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatInput {
    pub disabled: bool,
    pub placeholder: &'static str,
}

impl From<&ChatState> for ChatInput {
    fn from(state: &ChatState) -> Self {
        match state {
            ChatState::AcceptingInput => ChatInput {
                disabled: false,
                placeholder: PLACEHOLDER_ACCEPTING,
            },
            ChatState::BlockedOnWidget { free_text: true, .. } => ChatInput {
                disabled: true,
                placeholder: PLACEHOLDER_FREE_TEXT,
            },
            ChatState::BlockedOnWidget { free_text: false, .. } => ChatInput {
                disabled: true,
                placeholder: PLACEHOLDER_SELECTION,
            },
        }
    }
}

/// Disable every input widget except the most recent one, and any input
/// widget the conversation has moved past (followed by a user message).
/// Returns how many widgets were newly disabled.
pub fn lock_stale_widgets(history: &mut [Entry]) -> usize {
    let latest_input = history.iter().rposition(|e| matches!(e, Entry::Input(_)));
    let last_user = history.iter().rposition(|e| matches!(e, Entry::User { .. }));

    let mut locked = 0;
    for (i, entry) in history.iter_mut().enumerate() {
        let Entry::Input(w) = entry else { continue };
        let stale = Some(i) != latest_input || last_user.is_some_and(|u| i < u);
        if stale && !w.disabled {
            w.disable();
            locked += 1;
        }
    }
    locked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPass {
    pub entries: Vec<Render>,
    pub chat_input: ChatInput,
    pub state: ChatState,
}

/// Lock stale widgets, then describe the whole page in chronological order.
pub fn render_pass(history: &mut [Entry]) -> RenderPass {
    let locked = lock_stale_widgets(history);
    let state = chat_state(history);
    tracing::debug!(entries = history.len(), locked, blocked = state.is_blocked(), "render pass");
    RenderPass {
        entries: history.iter().map(Entry::render).collect(),
        chat_input: ChatInput::from(&state),
        state,
    }
}

/// Record the user's value on the interactive widget `key`.
pub fn answer_widget(history: &mut [Entry], key: &str, value: Value) -> Result<(), WidgetError> {
    let widget = history
        .iter_mut()
        .rev()
        .filter_map(Entry::as_input_mut)
        .find(|w| w.key == key)
        .ok_or_else(|| WidgetError::UnknownKey(key.to_string()))?;
    widget.answer(value)
}
