//! Onboarding flow records.
//!
//! Prompt options reference channels and roles by source-side id; restore
//! re-resolves them and drops the ones that no longer resolve.

use serde::{Deserialize, Serialize};

/// The onboarding configuration of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingRecord {
    /// Whether onboarding is enabled.
    pub enabled: bool,
    /// Platform onboarding mode.
    #[serde(default)]
    pub mode: u8,
    /// Channels members see by default.
    #[serde(default)]
    pub default_channel_ids: Vec<String>,
    /// Questions asked during onboarding.
    #[serde(default)]
    pub prompts: Vec<OnboardingPrompt>,
}

/// One onboarding question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingPrompt {
    /// Source-side prompt id.
    #[serde(default)]
    pub id: Option<String>,
    /// Question text.
    pub title: String,
    /// Only one option may be picked.
    #[serde(default)]
    pub single_select: bool,
    /// Answer is mandatory.
    #[serde(default)]
    pub required: bool,
    /// Shown during the onboarding flow (not only in customization).
    #[serde(default)]
    pub in_onboarding: bool,
    /// Platform prompt type.
    #[serde(default)]
    pub kind: u8,
    /// Answers.
    #[serde(default)]
    pub options: Vec<PromptOption>,
}

/// One answer of an onboarding prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    /// Source-side option id.
    #[serde(default)]
    pub id: Option<String>,
    /// Answer label.
    pub title: String,
    /// Answer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Emoji shown with the answer.
    #[serde(default)]
    pub emoji: Option<String>,
    /// Channels granted by the answer.
    #[serde(default)]
    pub channel_ids: Vec<String>,
    /// Roles granted by the answer.
    #[serde(default)]
    pub role_ids: Vec<String>,
}
