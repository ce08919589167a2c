//! Study progress rules: quiz grading, flashcard review, streaks, folders

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::types::{Flashcard, Profile, QuizQuestion, ReviewOutcome, MAX_MASTERY};

/// Folder palette offered by the UI; the first entry is the default
pub const FOLDER_COLORS: [&str; 10] = [
    "#6366f1", "#8b5cf6", "#ec4899", "#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6",
    "#3b82f6", "#6b7280",
];

pub const MAX_FOLDER_NAME_CHARS: usize = 100;

/// Score answers against the stored questions
pub fn grade_quiz(questions: &[QuizQuestion], answers: &[usize]) -> Result<u32> {
    if answers.len() != questions.len() {
        return Err(Error::bad_request(format!(
            "Expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }

    let correct = questions
        .iter()
        .zip(answers)
        .filter(|(q, a)| q.correct_answer == **a)
        .count();
    Ok(correct as u32)
}

/// Apply a review outcome to a card
pub fn apply_review(card: &mut Flashcard, outcome: ReviewOutcome, now: DateTime<Utc>) {
    match outcome {
        ReviewOutcome::Known => {
            card.mastery_level = (card.mastery_level + 1).min(MAX_MASTERY);
            card.review_count += 1;
        }
        ReviewOutcome::Learning => {
            card.mastery_level = 0;
        }
    }
    card.last_reviewed = Some(now);
}

/// Streak fields of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakState {
    pub last_study_date: Option<NaiveDate>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_study_sessions: u32,
}

impl From<&Profile> for StreakState {
    fn from(profile: &Profile) -> Self {
        Self {
            last_study_date: profile.last_study_date,
            current_streak: profile.current_streak,
            longest_streak: profile.longest_streak,
            total_study_sessions: profile.total_study_sessions,
        }
    }
}

/// Streak after a study session on `today`.
/// A second session on the same day changes nothing.
pub fn advance_streak(state: StreakState, today: NaiveDate) -> StreakState {
    if state.last_study_date == Some(today) {
        return state;
    }

    let current = match state.last_study_date {
        Some(last) if last.succ_opt() == Some(today) => state.current_streak + 1,
        _ => 1,
    };

    StreakState {
        last_study_date: Some(today),
        current_streak: current,
        longest_streak: state.longest_streak.max(current),
        total_study_sessions: state.total_study_sessions + 1,
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate folder input; returns the trimmed name and the colour to store
pub fn normalize_folder(name: &str, color: Option<&str>) -> Result<(String, String)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::bad_request("Folder name is required"));
    }
    if name.chars().count() > MAX_FOLDER_NAME_CHARS {
        return Err(Error::bad_request(format!(
            "Folder name must be at most {} characters",
            MAX_FOLDER_NAME_CHARS
        )));
    }

    let color = match color.map(str::trim).filter(|c| !c.is_empty()) {
        None => FOLDER_COLORS[0].to_string(),
        Some(c) if is_hex_color(c) => c.to_ascii_lowercase(),
        Some(_) => return Err(Error::bad_request("Folder color must be a hex color like #6366f1")),
    };

    Ok((name.to_string(), color))
}
