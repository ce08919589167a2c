//! System prompts and user messages for generation

use crate::types::Definition;

pub const SUMMARY_MAX_TOKENS: u32 = 2000;
pub const QUIZ_MAX_TOKENS: u32 = 1500;
pub const FLASHCARD_MAX_TOKENS: u32 = 1500;

pub const SUMMARY_SYSTEM: &str = "You are an expert study assistant. Analyze the following text and create a structured summary in JSON format with the following fields:
- tldr: A brief 5-line summary
- key_concepts: An array of key concepts (3-7 items)
- definitions: An array of objects with \"term\" and \"definition\" fields for important terms
- bullet_points: An array of bullet points summarizing the main content (5-10 items)

Return ONLY valid JSON, no markdown or additional text.";

pub fn quiz_system(questions: u32) -> String {
    format!(
        "You are an expert quiz generator. Based on the text and summary provided, create {} multiple choice questions to test understanding.

Return JSON with a \"questions\" array where each question has:
- question: the question text
- options: array of 4 possible answers
- correct_answer: index (0-3) of the correct option
- explanation: brief explanation of why the answer is correct

Make questions varied in difficulty. Return ONLY valid JSON.",
        questions
    )
}

pub const FLASHCARD_SYSTEM: &str = "You are an expert study assistant creating flashcards. Using the text, the listed terms and the key concepts, write flashcards that each test one idea.

Return JSON with a \"flashcards\" array where each card has:
- front: a term or a short question
- back: the definition or a concise answer (1-2 sentences)

Cover every listed term, then add cards for the key concepts. Return ONLY valid JSON.";

pub fn quiz_user(text: &str, tldr: &str) -> String {
    format!("Original Text:\n{}\n\nSummary:\n{}", text, tldr)
}

pub fn flashcard_user(text: &str, definitions: &[Definition], key_concepts: &[String]) -> String {
    let terms = definitions
        .iter()
        .map(|d| format!("- {}: {}", d.term, d.definition))
        .collect::<Vec<_>>()
        .join("\n");
    let concepts = key_concepts
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Terms:\n{}\n\nKey Concepts:\n{}\n\nOriginal Text:\n{}",
        terms, concepts, text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_user_layout() {
        assert_eq!(quiz_user("body", "short"), "Original Text:\nbody\n\nSummary:\nshort");
    }

    #[test]
    fn test_flashcard_user_lists_terms() {
        let defs = vec![Definition { term: "Borrow".into(), definition: "A reference".into() }];
        let msg = flashcard_user("text", &defs, &["Ownership".to_string()]);
        assert!(msg.contains("- Borrow: A reference"));
        assert!(msg.contains("- Ownership"));
        assert!(msg.ends_with("Original Text:\ntext"));
    }
}
