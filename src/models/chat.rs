use chrono::Utc;
use serde::{ Serialize, Deserialize };

/// Speaker of a single turn. Closed set; the wire-level role names used by
/// the completion service are mapped at the gateway, not here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    pub timestamp: i64,
}

impl ChatTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Ordered, append-only turn sequence for one widget session. Insertion
/// order is chronological order; duplicate text is allowed; turns are never
/// removed or edited. Held in memory only — dropped with the session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Conversation {
    /// A fresh conversation starts with the assistant greeting so the
    /// widget always has something to render on first open.
    pub fn seeded(greeting: &str) -> Self {
        Self {
            turns: vec![ChatTurn::new(Role::Assistant, greeting)],
        }
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ChatTurn::new(Role::User, text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(ChatTurn::new(Role::Assistant, text));
    }

    /// Read-only snapshot in insertion order. Used both for rendering and
    /// as the history payload handed to the gateway.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }
}
