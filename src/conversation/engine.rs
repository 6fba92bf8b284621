//! Table-driven conversation driver
//!
//! A flow is a static table of states. Each state knows how to prompt, how
//! to turn an input into a typed answer, and where to go next. The engine
//! only walks the table; reaching the end commits the collected answers to
//! the profile store in a single write.

use super::session::ConversationSession;
use crate::error::{Error, Result};
use crate::profile::{ProfileStore, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Which flow a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Reference document and style sample upload
    Documents,
    /// Job search preferences
    Preferences,
}

/// One user input fed to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationInput {
    Text(String),
    /// Uploaded file, already reduced to text
    Document { file_name: Option<String>, text: String },
    Cancel,
}

impl ConversationInput {
    /// Classify a text message; the cancel commands become [`ConversationInput::Cancel`]
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let command = trimmed
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();
        match command.as_str() {
            "/abbrechen" | "/cancel" => Self::Cancel,
            _ => Self::Text(trimmed.to_string()),
        }
    }
}

/// Typed answer collected by one state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Answer {
    Text { value: String },
    Flag { value: bool },
    Time { hour: u8, minute: u8 },
}

impl Answer {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }
}

/// Answers collected so far, keyed by state id
pub type Answers = BTreeMap<String, Answer>;

/// Text answer of a state, if collected
pub fn text_answer<'a>(answers: &'a Answers, state: &str) -> Option<&'a str> {
    match answers.get(state) {
        Some(Answer::Text { value }) => Some(value),
        _ => None,
    }
}

/// Validation outcome; the error text is shown to the user
pub type Validation = std::result::Result<Answer, String>;

/// Values flows fall back to when the user accepts a default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowDefaults {
    pub alert_hour: u8,
    pub alert_minute: u8,
}

impl Default for FlowDefaults {
    fn default() -> Self {
        Self {
            alert_hour: 6,
            alert_minute: 0,
        }
    }
}

/// Where a state leads after a valid answer
#[derive(Clone, Copy)]
pub enum Transition {
    To(&'static str),
    /// Pick the next state from the answers; `None` ends the flow
    Branch(fn(&Answers) -> Option<&'static str>),
    Done,
}

/// One row of a flow table
pub struct StateSpec {
    pub id: &'static str,
    pub prompt: fn(&FlowDefaults) -> String,
    pub parse: fn(&ConversationInput, &FlowDefaults) -> Validation,
    pub next: Transition,
}

/// A complete flow table
pub struct Flow {
    pub kind: FlowKind,
    /// First entry is the initial state
    pub states: &'static [StateSpec],
    /// Apply the answers to the profile
    pub commit: fn(&Answers, &mut UserProfile) -> Result<()>,
    /// Confirmation shown after the commit
    pub summary: fn(&Answers) -> String,
    /// Reply to the cancel command
    pub cancelled: &'static str,
}

impl Flow {
    pub fn state(&self, id: &str) -> Option<&StateSpec> {
        self.states.iter().find(|s| s.id == id)
    }

    pub fn initial(&self) -> Result<&StateSpec> {
        self.states
            .first()
            .ok_or_else(|| Error::Session(format!("flow {:?} has no states", self.kind)))
    }
}

/// Result of feeding one input to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Moved to the next state
    Prompt(String),
    /// Input rejected, state unchanged
    Reprompt { error: String, prompt: String },
    /// Answers committed, session finished
    Completed(String),
    /// Session discarded without writes
    Cancelled(String),
}

impl Step {
    /// The session ended and should be discarded
    pub fn is_finished(&self) -> bool {
        matches!(self, Step::Completed(_) | Step::Cancelled(_))
    }

    /// Reply text for the user
    pub fn reply(&self) -> String {
        match self {
            Step::Prompt(text) | Step::Completed(text) | Step::Cancelled(text) => text.clone(),
            Step::Reprompt { error, prompt } => format!("{}\n\n{}", error, prompt),
        }
    }
}

/// Drives sessions through their flow tables
pub struct ConversationEngine {
    profiles: Arc<dyn ProfileStore>,
    defaults: FlowDefaults,
}

impl ConversationEngine {
    pub fn new(profiles: Arc<dyn ProfileStore>, defaults: FlowDefaults) -> Self {
        Self { profiles, defaults }
    }

    pub fn defaults(&self) -> FlowDefaults {
        self.defaults
    }

    /// Begin a flow, returning the fresh session and the first prompt
    pub fn start(&self, kind: FlowKind, user_id: &str) -> Result<(ConversationSession, String)> {
        let flow = super::flows::flow(kind);
        let initial = flow.initial()?;
        let session = ConversationSession::new(user_id, kind, initial.id);

        tracing::debug!(user = %user_id, flow = ?kind, "Conversation started");

        Ok((session, (initial.prompt)(&self.defaults)))
    }

    /// Feed one input to a session.
    ///
    /// The session is only modified when the input is accepted. The profile
    /// is written only when the flow reaches its end.
    pub async fn advance(
        &self,
        session: &mut ConversationSession,
        input: ConversationInput,
    ) -> Result<Step> {
        let flow = super::flows::flow(session.flow);

        if input == ConversationInput::Cancel {
            tracing::debug!(user = %session.user_id, flow = ?session.flow, "Conversation cancelled");
            return Ok(Step::Cancelled(flow.cancelled.to_string()));
        }

        let state = flow.state(&session.current_state).ok_or_else(|| {
            Error::Session(format!(
                "unknown state '{}' in flow {:?}",
                session.current_state, session.flow
            ))
        })?;

        let answer = match (state.parse)(&input, &self.defaults) {
            Ok(answer) => answer,
            Err(error) => {
                return Ok(Step::Reprompt {
                    error,
                    prompt: (state.prompt)(&self.defaults),
                })
            }
        };

        let mut answers = session.answers.clone();
        answers.insert(state.id.to_string(), answer);

        let next = match state.next {
            Transition::To(id) => Some(id),
            Transition::Branch(pick) => pick(&answers),
            Transition::Done => None,
        };

        match next {
            Some(next_id) => {
                let next_state = flow.state(next_id).ok_or_else(|| {
                    Error::Session(format!("flow {:?} has no state '{}'", flow.kind, next_id))
                })?;
                session.answers = answers;
                session.current_state = next_id.to_string();
                session.touch();
                Ok(Step::Prompt((next_state.prompt)(&self.defaults)))
            }
            None => {
                let mut profile = self.profiles.get_or_default(&session.user_id).await?;
                (flow.commit)(&answers, &mut profile)?;
                self.profiles.put(&session.user_id, &profile).await?;

                tracing::info!(user = %session.user_id, flow = ?flow.kind, "Conversation completed");

                session.answers = answers;
                session.touch();
                Ok(Step::Completed((flow.summary)(&session.answers)))
            }
        }
    }
}
