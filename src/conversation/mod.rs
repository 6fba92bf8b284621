//! Multi-step conversations
//!
//! `/setup` collects the cover letter documents, `/jobsetup` the job search
//! preferences. Both are tables driven by [`ConversationEngine`].

mod engine;
mod flows;
mod session;

pub use engine::{
    Answer, Answers, ConversationEngine, ConversationInput, Flow, FlowDefaults, FlowKind,
    StateSpec, Step, Transition,
};
pub use flows::flow;
pub use session::{ConversationSession, SessionStore};
