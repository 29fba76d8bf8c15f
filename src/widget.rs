use log::debug;

use crate::agent::AssistantAgent;
use crate::config::persona;
use crate::models::chat::{ChatTurn, Conversation};

/// Widget lifecycle. `OpenAwaiting` blocks further submits, which gives the
/// single-flight guarantee by construction — there is no request queue and
/// no cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetState {
    Closed,
    OpenIdle,
    OpenAwaiting,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Replied(String),
    Ignored,
}

/// One chat widget session: the conversation store plus the three-state
/// controller. Owned by a single session task; mutated only between awaits,
/// so no locking is needed.
pub struct ChatWidget {
    conversation: Conversation,
    state: WidgetState,
}

impl ChatWidget {
    pub fn new() -> Self {
        Self {
            conversation: Conversation::seeded(&persona::persona().greeting),
            state: WidgetState::Closed,
        }
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn open(&mut self) {
        if self.state == WidgetState::Closed {
            self.state = WidgetState::OpenIdle;
        }
    }

    /// Closing hides the widget but retains the conversation; reopening
    /// replays it. An in-flight request cannot be aborted — it settles
    /// against the retained conversation.
    pub fn close(&mut self) {
        self.state = WidgetState::Closed;
    }

    /// Phase one of a submit: guard, record the user turn, enter
    /// `OpenAwaiting`. Returns the trimmed message when accepted; `None`
    /// (with no state or history change) for empty input, re-entrant
    /// submits, and submits while closed.
    pub fn begin_submit(&mut self, input: &str) -> Option<String> {
        if self.state != WidgetState::OpenIdle {
            debug!("submit ignored in state {:?}", self.state);
            return None;
        }
        let message = input.trim();
        if message.is_empty() {
            return None;
        }
        self.conversation.push_user(message);
        self.state = WidgetState::OpenAwaiting;
        Some(message.to_string())
    }

    /// History payload for the gateway: every turn before the pending user
    /// turn, in original order.
    pub fn prior_turns(&self) -> Vec<ChatTurn> {
        let turns = self.conversation.turns();
        match self.state {
            WidgetState::OpenAwaiting => turns[..turns.len() - 1].to_vec(),
            _ => turns.to_vec(),
        }
    }

    /// Phase two: the gateway call settled. Success and fallback arrive
    /// here the same way — as a displayable string — so both paths converge
    /// to the same transition. A widget closed mid-flight stays closed.
    pub fn finish_submit(&mut self, reply: String) {
        self.conversation.push_assistant(reply);
        if self.state == WidgetState::OpenAwaiting {
            self.state = WidgetState::OpenIdle;
        }
    }

    /// Full submit cycle against the gateway. Transports that interleave a
    /// typing indicator use the two-phase API directly.
    pub async fn submit(&mut self, agent: &AssistantAgent, input: &str) -> SubmitOutcome {
        let Some(message) = self.begin_submit(input) else {
            return SubmitOutcome::Ignored;
        };
        let history = self.prior_turns();
        let reply = agent.reply(&history, &message).await;
        self.finish_submit(reply.clone());
        SubmitOutcome::Replied(reply)
    }
}

impl Default for ChatWidget {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "widget_test.rs"]
mod tests;
