use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest flashcard mastery level
pub const MAX_MASTERY: u8 = 5;

/// Number of options every quiz question carries
pub const QUIZ_OPTIONS: usize = 4;

// ─────────────────────────────────────────────────────────────────────────────
// Documents
// ─────────────────────────────────────────────────────────────────────────────

/// Processing state of an uploaded document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and failed are final
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    /// Only processing → completed and processing → failed are allowed
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Completed) | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown document status: {}", other)),
        }
    }
}

/// Where a document's text came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Webpage,
}

/// An uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Storage URL for PDFs, the original address for web pages
    pub file_url: String,
    pub file_size: i64,
    pub status: DocumentStatus,
    pub folder_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a document record
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: String,
    pub title: String,
    pub file_url: String,
    pub file_size: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Study material
// ─────────────────────────────────────────────────────────────────────────────

/// A glossary entry from a summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Definition {
    pub term: String,
    pub definition: String,
}

/// Generated summary body
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SummaryContent {
    #[serde(default)]
    pub tldr: String,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default, alias = "bullet_points")]
    pub bullet_summary: Vec<String>,
}

/// A stored summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub document_id: String,
    #[serde(flatten)]
    pub content: SummaryContent,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One multiple-choice question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestion {
    #[serde(default)]
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuizQuestion {
    /// Exactly four options and an answer index pointing at one of them
    pub fn is_well_formed(&self) -> bool {
        !self.question.trim().is_empty()
            && self.options.len() == QUIZ_OPTIONS
            && self.correct_answer < QUIZ_OPTIONS
    }
}

/// A stored quiz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub document_id: String,
    pub questions: Vec<QuizQuestion>,
    pub created_at: DateTime<Utc>,
}

/// A graded quiz attempt (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub score: u32,
    pub total_questions: u32,
    pub answers: Vec<usize>,
    pub taken_at: DateTime<Utc>,
}

/// A front/back pair produced by generation, before storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlashcardDraft {
    pub front: String,
    pub back: String,
}

/// A stored flashcard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub front: String,
    pub back: String,
    /// 0..=MAX_MASTERY
    pub mastery_level: u8,
    pub review_count: u32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Everything the viewer shows for one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPack {
    pub document: Document,
    pub summary: Option<Summary>,
    pub quiz: Option<Quiz>,
    pub flashcards: Vec<Flashcard>,
    pub attempts: Vec<QuizAttempt>,
}

/// A user's folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Profiles & billing
// ─────────────────────────────────────────────────────────────────────────────

/// Subscription state kept on the profile
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Free,
    Active,
    PastDue,
    Lifetime,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Lifetime => "lifetime",
        }
    }

    /// Map a Stripe subscription status onto the profile status
    pub fn from_stripe(status: &str) -> Self {
        match status {
            "active" | "trialing" => Self::Active,
            "past_due" => Self::PastDue,
            _ => Self::Free,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "lifetime" => Ok(Self::Lifetime),
            other => Err(format!("unknown subscription status: {}", other)),
        }
    }
}

/// Per-user billing and streak state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub subscription_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub last_study_date: Option<NaiveDate>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_study_sessions: u32,
}

impl Profile {
    /// Lifetime plans and profiles without a customer get no portal
    pub fn can_open_billing_portal(&self) -> bool {
        self.stripe_customer_id.is_some()
            && self.subscription_status != SubscriptionStatus::Lifetime
    }
}

/// Plan chosen at checkout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    #[default]
    Monthly,
    Yearly,
    Lifetime,
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Lifetime => "lifetime",
        }
    }

    pub fn is_one_time(&self) -> bool {
        matches!(self, Self::Lifetime)
    }
}

impl FromStr for BillingPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "lifetime" => Ok(Self::Lifetime),
            other => Err(format!("unknown billing period: {}", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Response of the authenticated upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub document_id: String,
    pub message: String,
}

/// Response of the anonymous trial
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResponse {
    pub success: bool,
    pub file_name: String,
    pub source_type: SourceType,
    pub summary: SummaryContent,
    pub quiz: Vec<QuizQuestion>,
    pub message: String,
}

/// Checkout request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub period: Option<String>,
}

/// Redirect target returned by checkout and portal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUrlResponse {
    pub url: String,
}

/// Quiz submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttemptRequest {
    pub answers: Vec<usize>,
}

/// Result of reviewing one flashcard
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    /// Card recalled; mastery goes up
    Known,
    /// Card not yet recalled; mastery resets
    Learning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardReviewRequest {
    pub outcome: ReviewOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveDocumentRequest {
    /// `None` removes the document from its folder
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentListQuery {
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_are_one_way() {
        use DocumentStatus::*;
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Processing));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [DocumentStatus::Processing, DocumentStatus::Completed, DocumentStatus::Failed] {
            assert_eq!(status.as_str().parse::<DocumentStatus>().unwrap(), status);
        }
        assert!("done".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_stripe_status_mapping() {
        assert_eq!(SubscriptionStatus::from_stripe("active"), SubscriptionStatus::Active);
        assert_eq!(SubscriptionStatus::from_stripe("trialing"), SubscriptionStatus::Active);
        assert_eq!(SubscriptionStatus::from_stripe("past_due"), SubscriptionStatus::PastDue);
        assert_eq!(SubscriptionStatus::from_stripe("canceled"), SubscriptionStatus::Free);
        assert_eq!(SubscriptionStatus::from_stripe("unpaid"), SubscriptionStatus::Free);
        assert_eq!(SubscriptionStatus::from_stripe("incomplete_expired"), SubscriptionStatus::Free);
        assert_eq!(SubscriptionStatus::from_stripe("paused"), SubscriptionStatus::Free);
    }

    #[test]
    fn test_summary_accepts_bullet_points_alias() {
        let json = r#"{"tldr":"short","key_concepts":["a"],"bullet_points":["one","two"]}"#;
        let summary: SummaryContent = serde_json::from_str(json).unwrap();
        assert_eq!(summary.bullet_summary, vec!["one", "two"]);
        assert!(summary.definitions.is_empty());
    }

    #[test]
    fn test_question_shape_check() {
        let mut q = QuizQuestion {
            id: String::new(),
            question: "What is Rust?".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: 2,
            explanation: None,
        };
        assert!(q.is_well_formed());

        q.correct_answer = 4;
        assert!(!q.is_well_formed());

        q.correct_answer = 0;
        q.options.pop();
        assert!(!q.is_well_formed());
    }

    #[test]
    fn test_portal_access() {
        let mut profile = Profile {
            id: "u1".into(),
            email: None,
            full_name: None,
            stripe_customer_id: None,
            subscription_status: SubscriptionStatus::Active,
            subscription_id: None,
            current_period_end: None,
            last_study_date: None,
            current_streak: 0,
            longest_streak: 0,
            total_study_sessions: 0,
        };
        assert!(!profile.can_open_billing_portal());

        profile.stripe_customer_id = Some("cus_1".into());
        assert!(profile.can_open_billing_portal());

        profile.subscription_status = SubscriptionStatus::Lifetime;
        assert!(!profile.can_open_billing_portal());
    }

    #[test]
    fn test_upload_response_is_camel_case() {
        let response = UploadResponse {
            success: true,
            document_id: "d1".into(),
            message: "ok".into(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["documentId"], "d1");
    }
}
