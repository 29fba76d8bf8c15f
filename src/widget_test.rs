use super::*;
use crate::agent::{AssistantAgent, FALLBACK_REPLY};
use crate::llm::chat::{ChatClient, CompletionResponse};
use crate::models::chat::Role;
use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct EchoClient;

#[async_trait]
impl ChatClient for EchoClient {
    async fn complete(
        &self,
        _history: &[ChatTurn],
        message: &str,
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        Ok(CompletionResponse { text: format!("echo: {}", message) })
    }
}

struct FailingClient;

#[async_trait]
impl ChatClient for FailingClient {
    async fn complete(
        &self,
        _history: &[ChatTurn],
        _message: &str,
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        Err("boom".into())
    }
}

struct CountingClient {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChatClient for CountingClient {
    async fn complete(
        &self,
        _history: &[ChatTurn],
        _message: &str,
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse { text: "counted".into() })
    }
}

fn echo_agent() -> AssistantAgent {
    AssistantAgent::with_client(Arc::new(EchoClient))
}

fn open_widget() -> ChatWidget {
    let mut widget = ChatWidget::new();
    widget.open();
    widget
}

fn assert_alternating(widget: &ChatWidget) {
    let turns = widget.conversation().turns();
    for pair in turns.windows(2) {
        assert_ne!(
            pair[0].role, pair[1].role,
            "consecutive turns share a role: {:?}",
            pair
        );
    }
}

// =========================================================================
// State machine transitions
// =========================================================================

#[test]
fn widget_starts_closed_with_greeting() {
    let widget = ChatWidget::new();
    assert_eq!(widget.state(), WidgetState::Closed);
    assert_eq!(widget.conversation().len(), 1);
    assert_eq!(widget.conversation().turns()[0].role, Role::Assistant);
}

#[test]
fn open_and_close_toggle_visibility_only() {
    let mut widget = ChatWidget::new();
    widget.open();
    assert_eq!(widget.state(), WidgetState::OpenIdle);
    widget.open();
    assert_eq!(widget.state(), WidgetState::OpenIdle);
    widget.close();
    assert_eq!(widget.state(), WidgetState::Closed);
    assert_eq!(widget.conversation().len(), 1);
}

#[test]
fn history_is_retained_across_close_and_reopen() {
    let mut widget = open_widget();
    widget.begin_submit("remember me");
    widget.finish_submit("noted".into());
    widget.close();
    widget.open();

    assert_eq!(widget.state(), WidgetState::OpenIdle);
    assert_eq!(widget.conversation().len(), 3);
    assert_eq!(widget.conversation().turns()[1].text, "remember me");
}

#[test]
fn close_during_awaiting_settles_into_closed() {
    let mut widget = open_widget();
    widget.begin_submit("question");
    assert_eq!(widget.state(), WidgetState::OpenAwaiting);
    widget.close();
    widget.finish_submit("late reply".into());

    assert_eq!(widget.state(), WidgetState::Closed);
    assert_eq!(widget.conversation().last().unwrap().text, "late reply");
}

// =========================================================================
// Non-empty guard
// =========================================================================

#[test]
fn empty_and_whitespace_submits_change_nothing() {
    let mut widget = open_widget();
    assert_eq!(widget.begin_submit(""), None);
    assert_eq!(widget.begin_submit("   \t\n"), None);
    assert_eq!(widget.state(), WidgetState::OpenIdle);
    assert_eq!(widget.conversation().len(), 1);
}

#[test]
fn submit_while_closed_is_ignored() {
    let mut widget = ChatWidget::new();
    assert_eq!(widget.begin_submit("hello?"), None);
    assert_eq!(widget.state(), WidgetState::Closed);
    assert_eq!(widget.conversation().len(), 1);
}

#[test]
fn accepted_input_is_trimmed() {
    let mut widget = open_widget();
    let message = widget.begin_submit("  What are your skills?  ").unwrap();
    assert_eq!(message, "What are your skills?");
    assert_eq!(widget.conversation().last().unwrap().text, "What are your skills?");
}

// =========================================================================
// Single-flight
// =========================================================================

#[test]
fn second_submit_while_awaiting_is_ignored() {
    let mut widget = open_widget();
    assert!(widget.begin_submit("first").is_some());
    assert_eq!(widget.state(), WidgetState::OpenAwaiting);

    assert_eq!(widget.begin_submit("second"), None);
    assert_eq!(widget.conversation().len(), 2);

    widget.finish_submit("reply".into());
    assert_eq!(widget.state(), WidgetState::OpenIdle);
    assert!(widget.begin_submit("third").is_some());
}

#[tokio::test]
async fn ignored_submit_makes_no_network_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = AssistantAgent::with_client(Arc::new(CountingClient { calls: Arc::clone(&calls) }));

    let mut widget = open_widget();
    widget.begin_submit("in flight");
    let outcome = widget.submit(&agent, "blocked").await;

    assert_eq!(outcome, SubmitOutcome::Ignored);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// =========================================================================
// Alternation
// =========================================================================

#[tokio::test]
async fn conversation_alternates_across_mixed_outcomes() {
    let ok_agent = echo_agent();
    let bad_agent = AssistantAgent::with_client(Arc::new(FailingClient));

    let mut widget = open_widget();
    widget.submit(&ok_agent, "one").await;
    widget.submit(&bad_agent, "two").await;
    widget.submit(&ok_agent, "three").await;

    assert_eq!(widget.conversation().len(), 7);
    assert_alternating(&widget);
}

#[tokio::test]
async fn failed_call_appends_fallback_turn() {
    let agent = AssistantAgent::with_client(Arc::new(FailingClient));
    let mut widget = open_widget();

    let outcome = widget.submit(&agent, "anyone there?").await;
    assert_eq!(outcome, SubmitOutcome::Replied(FALLBACK_REPLY.to_string()));

    let last = widget.conversation().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.text, FALLBACK_REPLY);
    assert_eq!(widget.state(), WidgetState::OpenIdle);
}

// =========================================================================
// Gateway history payload
// =========================================================================

#[test]
fn prior_turns_exclude_the_pending_user_turn() {
    let mut widget = open_widget();
    widget.begin_submit("pending");

    let prior = widget.prior_turns();
    assert_eq!(prior.len(), 1);
    assert_eq!(prior[0].role, Role::Assistant);
}

// =========================================================================
// Seed scenario
// =========================================================================

#[tokio::test]
async fn skills_question_round_trip() {
    let agent = echo_agent();
    let mut widget = open_widget();

    assert!(widget
        .conversation()
        .turns()[0]
        .text
        .starts_with("Hi! I am Alex's AI Assistant"));

    let outcome = widget.submit(&agent, "What are your skills?").await;

    assert!(matches!(outcome, SubmitOutcome::Replied(_)));
    assert_eq!(widget.state(), WidgetState::OpenIdle);

    let turns = widget.conversation().turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[1].role, Role::User);
    assert_eq!(turns[1].text, "What are your skills?");
    assert_eq!(turns[2].role, Role::Assistant);
    assert!(!turns[2].text.is_empty());
}
