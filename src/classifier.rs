//! Maps emotion scores to a dominant category and a coarse productivity state.

use serde::{Deserialize, Serialize};

use crate::models::EmotionScores;

pub const DEFAULT_OVERRIDE_THRESHOLD: f64 = 0.1;

const NEUTRAL: &str = "neutral";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProductivityState {
    #[serde(rename = "happy/focused/motivated")]
    HappyFocused,
    #[serde(rename = "neutral/focused")]
    NeutralFocused,
    #[serde(rename = "tired/drained")]
    TiredDrained,
    #[serde(rename = "fatigued/stressed")]
    FatiguedStressed,
    #[serde(rename = "angry/frustrated/stressed")]
    AngryStressed,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ProductivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductivityState::HappyFocused => "happy/focused/motivated",
            ProductivityState::NeutralFocused => "neutral/focused",
            ProductivityState::TiredDrained => "tired/drained",
            ProductivityState::FatiguedStressed => "fatigued/stressed",
            ProductivityState::AngryStressed => "angry/frustrated/stressed",
            ProductivityState::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "happy/focused/motivated" => ProductivityState::HappyFocused,
            "neutral/focused" => ProductivityState::NeutralFocused,
            "tired/drained" => ProductivityState::TiredDrained,
            "fatigued/stressed" => ProductivityState::FatiguedStressed,
            "angry/frustrated/stressed" => ProductivityState::AngryStressed,
            _ => ProductivityState::Unknown,
        }
    }

    /// Lookup table from dominant category to state. `surprise` and `anger`
    /// are accepted spellings from the analysis service.
    pub fn for_category(category: &str) -> Self {
        match category {
            "happy" | "surprised" | "surprise" => ProductivityState::HappyFocused,
            "neutral" => ProductivityState::NeutralFocused,
            "tired" => ProductivityState::TiredDrained,
            "sad" | "disgust" | "fear" => ProductivityState::FatiguedStressed,
            "angry" | "anger" | "frustrated" => ProductivityState::AngryStressed,
            _ => ProductivityState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub dominant: Option<String>,
    pub state: ProductivityState,
}

/// Picks the highest-scoring category (ties go to the lexically first name).
/// A `neutral` winner is replaced by the first other category, in lexical
/// order, scoring above `override_threshold`.
pub fn classify(scores: &EmotionScores, override_threshold: f64) -> Classification {
    let mut dominant: Option<(&str, f64)> = None;
    for (name, score) in scores.iter() {
        match dominant {
            Some((_, best)) if score <= best => {}
            _ => dominant = Some((name, score)),
        }
    }

    let Some((mut name, _)) = dominant else {
        return Classification {
            dominant: None,
            state: ProductivityState::Unknown,
        };
    };

    if name == NEUTRAL {
        if let Some((other, _)) = scores
            .iter()
            .find(|(other, score)| *other != NEUTRAL && *score > override_threshold)
        {
            name = other;
        }
    }

    Classification {
        dominant: Some(name.to_string()),
        state: ProductivityState::for_category(name),
    }
}
