use crate::error::PipelineError;
use crate::llm::{CompletionOptions, FinishReason, LlmProvider, Message};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

pub const MOOD_LABELS: [&str; 6] = ["Happy", "Sad", "Intense", "Dark", "Nostalgic", "Uplifting"];

pub const FALLBACK_MOOD: &str = "Neutral";
pub const FALLBACK_SCORE: i64 = 50;

pub const MAX_MOOD_SCORE: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodClassification {
    pub mood: String,
    /// 0..=100
    pub score: i64,
}

impl MoodClassification {
    pub fn fallback() -> Self {
        Self {
            mood: FALLBACK_MOOD.to_string(),
            score: FALLBACK_SCORE,
        }
    }
}

pub fn build_prompt(overview: &str) -> String {
    format!(
        "Analyze the emotional tone of the following movie description and classify its predominant mood.\n\
         \n\
         Description: \"{}\"\n\
         \n\
         Return only one mood classification among: {}.\n\
         Give a mood score from 0 to 100, where 100 represents extreme intensity.\n\
         \n\
         Format the response strictly as:\n\
         Mood: <mood>, Score: <score>",
        overview,
        MOOD_LABELS.join(", ")
    )
}

fn mood_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Mood:\s*(\w+)").expect("valid mood regex"))
}

fn score_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Score:\s*(\d+)").expect("valid score regex"))
}

/// Extracts `Mood: <word>` and `Score: <digits>` from a model response.
///
/// Any word is accepted as a mood. A missing part or a score above
/// [`MAX_MOOD_SCORE`] is a parse error.
pub fn parse_mood_response(text: &str) -> Result<MoodClassification, PipelineError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PipelineError::Parse("empty response".to_string()));
    }

    let mood = mood_regex()
        .captures(text)
        .map(|c| c[1].to_string())
        .ok_or_else(|| PipelineError::Parse(format!("no mood in {:?}", text)))?;
    let score = score_regex()
        .captures(text)
        .and_then(|c| c[1].parse::<i64>().ok())
        .ok_or_else(|| PipelineError::Parse(format!("no score in {:?}", text)))?;

    if score > MAX_MOOD_SCORE {
        return Err(PipelineError::Parse(format!("score {} out of range", score)));
    }

    Ok(MoodClassification { mood, score })
}

/// Outcome of classifying one overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub classification: MoodClassification,
    /// True when the model failed or answered off-format.
    pub fallback: bool,
}

/// Asks the model for a mood and never fails: provider errors and unparseable
/// answers degrade to the fallback pair.
pub struct MoodClassifier {
    provider: Arc<dyn LlmProvider>,
    options: CompletionOptions,
}

impl MoodClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>, options: CompletionOptions) -> Self {
        Self { provider, options }
    }

    pub async fn classify(&self, overview: &str) -> Classified {
        let messages = [Message::user(build_prompt(overview))];

        let attempt = match self.provider.complete(&messages, &self.options).await {
            Ok(response) => {
                debug!(usage = ?response.usage, "Model response: {}", response.text().trim());
                // A cut-off reply may still match, e.g. "Score: 8" for "Score: 85".
                if response.finish_reason == FinishReason::MaxTokens {
                    Err(PipelineError::Parse("reply truncated at token limit".to_string()))
                } else {
                    parse_mood_response(response.text())
                }
            }
            Err(e) => Err(PipelineError::from(e)),
        };

        match attempt {
            Ok(classification) => Classified {
                classification,
                fallback: false,
            },
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    "Using fallback mood: {}", e
                );
                Classified {
                    classification: MoodClassification::fallback(),
                    fallback: true,
                }
            }
        }
    }
}
