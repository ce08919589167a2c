//! Study material generation
//!
//! `StudyGenerator` is the seam between the pipeline and the LLM/TTS
//! provider. `OpenAiClient` is the production implementation.

mod openai;
pub mod prompts;

pub use openai::OpenAiClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Definition, FlashcardDraft, QuizQuestion, SummaryContent};

/// Generates summaries, quizzes, flashcards and narration audio
#[async_trait]
pub trait StudyGenerator: Send + Sync {
    /// Structured summary of the source text
    async fn summarize(&self, text: &str) -> Result<SummaryContent>;

    /// Multiple-choice questions about the text, given its tl;dr
    async fn quiz(&self, text: &str, tldr: &str) -> Result<Vec<QuizQuestion>>;

    /// Front/back cards built from the summary's definitions and concepts
    async fn flashcards(
        &self,
        text: &str,
        definitions: &[Definition],
        key_concepts: &[String],
    ) -> Result<Vec<FlashcardDraft>>;

    /// MP3 narration of a script
    async fn narrate(&self, script: &str) -> Result<Vec<u8>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Text read aloud for a summary
pub fn narration_script(summary: &SummaryContent) -> String {
    let concepts = if summary.key_concepts.is_empty() {
        "various topics".to_string()
    } else {
        summary.key_concepts.join(", ")
    };
    format!(
        "Here's your summary. {}. Key concepts include: {}.",
        summary.tldr, concepts
    )
}

/// Drop malformed questions and give each kept one an id
pub fn sanitize_questions(questions: Vec<QuizQuestion>) -> Vec<QuizQuestion> {
    let total = questions.len();
    let kept: Vec<QuizQuestion> = questions
        .into_iter()
        .filter(QuizQuestion::is_well_formed)
        .map(|mut q| {
            q.id = uuid::Uuid::new_v4().to_string();
            q
        })
        .collect();

    if kept.len() < total {
        tracing::warn!(dropped = total - kept.len(), "dropped malformed quiz questions");
    }
    kept
}

/// Drop cards with an empty side
pub fn sanitize_flashcards(cards: Vec<FlashcardDraft>) -> Vec<FlashcardDraft> {
    cards
        .into_iter()
        .map(|c| FlashcardDraft {
            front: c.front.trim().to_string(),
            back: c.back.trim().to_string(),
        })
        .filter(|c| !c.front.is_empty() && !c.back.is_empty())
        .collect()
}
