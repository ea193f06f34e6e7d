//! Prompt policies — the fixed generation instructions embedded in every prompt.
//!
//! Each policy has one named effect and renders exactly one instruction line.
//! Keeping them as data lets configuration choose the set and tests assert on
//! individual effects instead of matching a wall of template text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPolicy {
    /// Continue the conversation using prior turns as context
    PreferContext,
    /// Treat the knowledge-base answer as a guide, not text to copy
    GuideNotVerbatim,
    /// Do not open with a greeting unless the user greeted
    SuppressGreetings,
    /// Do not repeat an earlier answer word for word unless the question recurs
    AvoidVerbatimRepeat,
    /// Mention the user's registered events when the query is about events
    ReferenceRegisteredEvents,
}

impl PromptPolicy {
    /// Every policy, in the order they are rendered by default.
    pub const ALL: [PromptPolicy; 5] = [
        PromptPolicy::PreferContext,
        PromptPolicy::GuideNotVerbatim,
        PromptPolicy::SuppressGreetings,
        PromptPolicy::AvoidVerbatimRepeat,
        PromptPolicy::ReferenceRegisteredEvents,
    ];

    /// The instruction line this policy contributes to the prompt.
    pub fn instruction(self) -> &'static str {
        match self {
            PromptPolicy::PreferContext => "Generate a context-aware response based on prior messages.",
            PromptPolicy::GuideNotVerbatim => {
                "Use the knowledge base's response as a guide, but refine it dynamically."
            }
            PromptPolicy::SuppressGreetings => {
                "Do NOT include unnecessary greetings (only greet if explicitly asked)."
            }
            PromptPolicy::AvoidVerbatimRepeat => {
                "Avoid repeating previous answers exactly unless the same question was asked."
            }
            PromptPolicy::ReferenceRegisteredEvents => {
                "If the query relates to events, reference the user's registered events."
            }
        }
    }

    /// The default policy set: all of them.
    pub fn defaults() -> Vec<PromptPolicy> {
        Self::ALL.to_vec()
    }
}
