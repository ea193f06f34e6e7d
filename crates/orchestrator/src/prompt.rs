//! Prompt assembly for the generative provider.
//!
//! The prompt is rendered in a fixed section order: persona, user details,
//! prior conversation, the new query, the knowledge base's answer, then one
//! instruction line per configured [`PromptPolicy`].

use concierge_config::PromptConfig;
use concierge_core::conversation::ConversationHistory;
use concierge_core::identity::UserProfile;
use concierge_core::policy::PromptPolicy;

/// Shown in place of the profile line when no profile is available.
pub const PROFILE_PLACEHOLDER: &str = "User details not available.";

/// Shown in place of the history block when the user has no prior turns.
pub const EMPTY_HISTORY: &str = "No previous conversation.";

/// Renders prompts. Pure and deterministic for identical inputs.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    assistant_name: String,
    event_name: String,
    policies: Vec<PromptPolicy>,
}

impl PromptBuilder {
    pub fn new(assistant_name: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            event_name: event_name.into(),
            policies: PromptPolicy::defaults(),
        }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(&config.assistant_name, &config.event_name).with_policies(config.policies.clone())
    }

    /// Replace the instruction set. Order is preserved when rendering.
    pub fn with_policies(mut self, policies: Vec<PromptPolicy>) -> Self {
        self.policies = policies;
        self
    }

    pub fn policies(&self) -> &[PromptPolicy] {
        &self.policies
    }

    /// Render the full prompt for one generation call.
    pub fn build(
        &self,
        query: &str,
        profile: Option<&UserProfile>,
        history: &ConversationHistory,
        structured_answer: &str,
    ) -> String {
        let mut prompt = format!(
            "You are {}, the official event assistant for {}.\n\
             Answer with accurate, user-specific responses drawn from the previous \
             conversation, the user's details and the knowledge base's answer.\n\n",
            self.assistant_name, self.event_name
        );

        prompt.push_str("User Details:\n");
        prompt.push_str(&profile_line(profile));
        prompt.push_str("\n\nPrevious Conversation History:\n");
        prompt.push_str(&history_block(history));
        prompt.push_str("\n\nNew User Query:\nUser: ");
        prompt.push_str(query);
        prompt.push_str("\n\nKnowledge Base Response to This Query:\n");
        prompt.push_str(structured_answer);

        if !self.policies.is_empty() {
            prompt.push_str("\n\nInstructions:\n");
            for policy in &self.policies {
                prompt.push_str("- ");
                prompt.push_str(policy.instruction());
                prompt.push('\n');
            }
        } else {
            prompt.push('\n');
        }

        prompt.push_str("\nNow, generate the next response naturally and contextually.\n");
        prompt
    }
}

/// One-line profile summary, or the placeholder.
pub fn profile_line(profile: Option<&UserProfile>) -> String {
    let Some(profile) = profile else {
        return PROFILE_PLACEHOLDER.to_string();
    };

    let events = if profile.events.is_empty() {
        "None".to_string()
    } else {
        profile.events.join(", ")
    };

    format!(
        "ID: {}, Name: {}, Email: {}, Registered Events: {}",
        profile.id, profile.name, profile.email, events
    )
}

/// Chronological `User:`/`Bot:` lines, or the empty-history marker.
pub fn history_block(history: &ConversationHistory) -> String {
    if history.is_empty() {
        return EMPTY_HISTORY.to_string();
    }

    history
        .turns()
        .map(|t| format!("User: {}\nBot: {}", t.user_query, t.bot_response))
        .collect::<Vec<_>>()
        .join("\n")
}
