//! SQLite persistence for profiles, documents and study material
//!
//! JSON-shaped fields (key concepts, questions, answers) are stored as TEXT.
//! Timestamps are RFC 3339 strings with fixed microsecond precision so they
//! sort lexicographically; ties fall back to rowid.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::study::{advance_streak, StreakState};
use crate::types::{
    Document, DocumentStatus, Flashcard, FlashcardDraft, Folder, NewDocument, Profile, Quiz,
    QuizAttempt, QuizQuestion, StudyPack, Summary, SummaryContent, SubscriptionStatus,
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        email TEXT,
        full_name TEXT,
        stripe_customer_id TEXT UNIQUE,
        subscription_status TEXT NOT NULL DEFAULT 'free'
            CHECK (subscription_status IN ('free', 'active', 'past_due', 'lifetime')),
        subscription_id TEXT,
        current_period_end TEXT,
        last_study_date TEXT,
        current_streak INTEGER NOT NULL DEFAULT 0,
        longest_streak INTEGER NOT NULL DEFAULT 0,
        total_study_sessions INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK (subscription_status <> 'lifetime' OR current_period_end IS NULL)
    );

    CREATE TABLE IF NOT EXISTS folders (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        color TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_folders_user ON folders(user_id);

    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        file_url TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'processing'
            CHECK (status IN ('processing', 'completed', 'failed')),
        folder_id TEXT REFERENCES folders(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id, created_at);

    -- completed and failed are final
    CREATE TRIGGER IF NOT EXISTS documents_status_final
    BEFORE UPDATE OF status ON documents
    WHEN OLD.status <> 'processing' AND NEW.status <> OLD.status
    BEGIN
        SELECT RAISE(ABORT, 'document status is final');
    END;

    CREATE TABLE IF NOT EXISTS summaries (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL UNIQUE REFERENCES documents(id) ON DELETE CASCADE,
        tldr TEXT NOT NULL,
        key_concepts TEXT NOT NULL,
        definitions TEXT NOT NULL,
        bullet_summary TEXT NOT NULL,
        audio_url TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS quizzes (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL UNIQUE REFERENCES documents(id) ON DELETE CASCADE,
        questions TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS quiz_attempts (
        id TEXT PRIMARY KEY,
        quiz_id TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        score INTEGER NOT NULL,
        total_questions INTEGER NOT NULL,
        answers TEXT NOT NULL,
        taken_at TEXT NOT NULL,
        CHECK (score <= total_questions)
    );
    CREATE INDEX IF NOT EXISTS idx_attempts_quiz ON quiz_attempts(quiz_id, user_id);

    CREATE TRIGGER IF NOT EXISTS quiz_attempts_append_only
    BEFORE UPDATE ON quiz_attempts
    BEGIN
        SELECT RAISE(ABORT, 'quiz attempts are append-only');
    END;

    CREATE TABLE IF NOT EXISTS flashcards (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        front TEXT NOT NULL,
        back TEXT NOT NULL,
        mastery_level INTEGER NOT NULL DEFAULT 0 CHECK (mastery_level BETWEEN 0 AND 5),
        review_count INTEGER NOT NULL DEFAULT 0,
        last_reviewed TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_flashcards_document ON flashcards(document_id);
"#;

const PROFILE_COLUMNS: &str = "id, email, full_name, stripe_customer_id, subscription_status, \
    subscription_id, current_period_end, last_study_date, current_streak, longest_streak, \
    total_study_sessions";

const DOCUMENT_COLUMNS: &str =
    "id, user_id, title, file_url, file_size, status, folder_id, created_at, updated_at";

const FLASHCARD_COLUMNS: &str = "id, document_id, user_id, front, back, mastery_level, \
    review_count, last_reviewed, created_at";

// ─────────────────────────────────────────────────────────────────────────────
// Column conversions
// ─────────────────────────────────────────────────────────────────────────────

impl ToSql for DocumentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DocumentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for SubscriptionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SubscriptionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

fn ts(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn optional_time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| {
        DateTime::parse_from_rfc3339(&r)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn optional_date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| NaiveDate::parse_from_str(&r, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        stripe_customer_id: row.get(3)?,
        subscription_status: row.get(4)?,
        subscription_id: row.get(5)?,
        current_period_end: optional_time_column(row, 6)?,
        last_study_date: optional_date_column(row, 7)?,
        current_streak: row.get(8)?,
        longest_streak: row.get(9)?,
        total_study_sessions: row.get(10)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        file_url: row.get(3)?,
        file_size: row.get(4)?,
        status: row.get(5)?,
        folder_id: row.get(6)?,
        created_at: time_column(row, 7)?,
        updated_at: time_column(row, 8)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<Summary> {
    Ok(Summary {
        id: row.get(0)?,
        document_id: row.get(1)?,
        content: SummaryContent {
            tldr: row.get(2)?,
            key_concepts: json_column(row, 3)?,
            definitions: json_column(row, 4)?,
            bullet_summary: json_column(row, 5)?,
        },
        audio_url: row.get(6)?,
        created_at: time_column(row, 7)?,
    })
}

fn quiz_from_row(row: &Row<'_>) -> rusqlite::Result<Quiz> {
    Ok(Quiz {
        id: row.get(0)?,
        document_id: row.get(1)?,
        questions: json_column(row, 2)?,
        created_at: time_column(row, 3)?,
    })
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<QuizAttempt> {
    Ok(QuizAttempt {
        id: row.get(0)?,
        quiz_id: row.get(1)?,
        user_id: row.get(2)?,
        score: row.get(3)?,
        total_questions: row.get(4)?,
        answers: json_column(row, 5)?,
        taken_at: time_column(row, 6)?,
    })
}

fn flashcard_from_row(row: &Row<'_>) -> rusqlite::Result<Flashcard> {
    Ok(Flashcard {
        id: row.get(0)?,
        document_id: row.get(1)?,
        user_id: row.get(2)?,
        front: row.get(3)?,
        back: row.get(4)?,
        mastery_level: row.get(5)?,
        review_count: row.get(6)?,
        last_reviewed: optional_time_column(row, 7)?,
        created_at: time_column(row, 8)?,
    })
}

fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        created_at: time_column(row, 4)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Subscription fields written by billing events.
/// `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionUpdate {
    pub status: SubscriptionStatus,
    pub subscription_id: Option<Option<String>>,
    pub current_period_end: Option<Option<DateTime<Utc>>>,
}

/// SQLite-backed store for all persistent records
pub struct StudyStore {
    conn: Mutex<Connection>,
}

impl StudyStore {
    /// Open (or create) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn)
    }

    /// In-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database lock poisoned"))
    }

    // ── Profiles ────────────────────────────────────────────────────────────

    /// Fetch the profile, creating a free one on first use
    pub fn ensure_profile(&self, user_id: &str, email: Option<&str>) -> Result<Profile> {
        let conn = self.lock()?;
        let now = ts(Utc::now());
        conn.execute(
            "INSERT INTO profiles (id, email, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET email = COALESCE(profiles.email, excluded.email)",
            params![user_id, email, now],
        )?;
        let profile = conn.query_row(
            &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS),
            [user_id],
            profile_from_row,
        )?;
        Ok(profile)
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let conn = self.lock()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS),
                [user_id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    pub fn find_profile_by_customer(&self, customer_id: &str) -> Result<Option<Profile>> {
        let conn = self.lock()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE stripe_customer_id = ?1", PROFILE_COLUMNS),
                [customer_id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    pub fn set_stripe_customer(&self, user_id: &str, customer_id: &str) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE profiles SET stripe_customer_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![customer_id, ts(Utc::now()), user_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("Profile"));
        }
        Ok(())
    }

    /// Apply a billing change; returns false when the profile does not exist
    pub fn update_subscription(&self, user_id: &str, update: &SubscriptionUpdate) -> Result<bool> {
        let conn = self.lock()?;

        let mut sets = vec!["subscription_status = ?", "updated_at = ?"];
        let mut values: Vec<Box<dyn ToSql>> =
            vec![Box::new(update.status), Box::new(ts(Utc::now()))];

        if let Some(subscription_id) = &update.subscription_id {
            sets.push("subscription_id = ?");
            values.push(Box::new(subscription_id.clone()));
        }

        // Lifetime plans never carry a period end
        let period_end = if update.status == SubscriptionStatus::Lifetime {
            Some(None)
        } else {
            update.current_period_end
        };
        if let Some(period_end) = period_end {
            sets.push("current_period_end = ?");
            values.push(Box::new(period_end.map(ts)));
        }

        values.push(Box::new(user_id.to_string()));
        let sql = format!("UPDATE profiles SET {} WHERE id = ?", sets.join(", "));
        let changed = conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
        Ok(changed > 0)
    }

    /// Record a study session on `today` and return the updated profile
    pub fn record_study_session(&self, user_id: &str, today: NaiveDate) -> Result<Profile> {
        let conn = self.lock()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS),
                [user_id],
                profile_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("Profile"))?;

        let next = advance_streak(StreakState::from(&profile), today);
        conn.execute(
            "UPDATE profiles SET last_study_date = ?1, current_streak = ?2, longest_streak = ?3,
                 total_study_sessions = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                next.last_study_date.map(|d| d.format("%Y-%m-%d").to_string()),
                next.current_streak,
                next.longest_streak,
                next.total_study_sessions,
                ts(Utc::now()),
                user_id
            ],
        )?;

        Ok(Profile {
            last_study_date: next.last_study_date,
            current_streak: next.current_streak,
            longest_streak: next.longest_streak,
            total_study_sessions: next.total_study_sessions,
            ..profile
        })
    }

    // ── Documents ───────────────────────────────────────────────────────────

    /// Insert a document in `processing`
    pub fn create_document(&self, doc: &NewDocument) -> Result<Document> {
        let conn = self.lock()?;
        let now = Utc::now();
        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: doc.user_id.clone(),
            title: doc.title.clone(),
            file_url: doc.file_url.clone(),
            file_size: doc.file_size,
            status: DocumentStatus::Processing,
            folder_id: None,
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            "INSERT INTO documents (id, user_id, title, file_url, file_size, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                document.id,
                document.user_id,
                document.title,
                document.file_url,
                document.file_size,
                document.status,
                ts(now)
            ],
        )?;
        Ok(document)
    }

    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.lock()?;
        let doc = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                [id],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }

    /// Document by id, only when owned by `user_id`
    pub fn get_document_for_user(&self, id: &str, user_id: &str) -> Result<Option<Document>> {
        let conn = self.lock()?;
        let doc = conn
            .query_row(
                &format!(
                    "SELECT {} FROM documents WHERE id = ?1 AND user_id = ?2",
                    DOCUMENT_COLUMNS
                ),
                [id, user_id],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }

    /// A user's documents, newest first, optionally limited to one folder
    pub fn list_documents(&self, user_id: &str, folder_id: Option<&str>) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents
             WHERE user_id = ?1 AND (?2 IS NULL OR folder_id = ?2)
             ORDER BY created_at DESC, rowid DESC",
            DOCUMENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id, folder_id], document_from_row)?;
        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        Ok(docs)
    }

    /// Move a processing document to a final status.
    /// Returns false when the document is missing or already final.
    pub fn transition_document(&self, id: &str, next: DocumentStatus) -> Result<bool> {
        if !DocumentStatus::Processing.can_transition_to(next) {
            return Err(Error::internal(format!("invalid document transition to {}", next)));
        }
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE documents SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'processing'",
            params![next, ts(Utc::now()), id],
        )?;
        Ok(changed > 0)
    }

    /// Set or clear a document's folder; false when the user does not own it
    pub fn move_document(&self, id: &str, user_id: &str, folder_id: Option<&str>) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE documents SET folder_id = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            params![folder_id, ts(Utc::now()), id, user_id],
        )?;
        Ok(changed > 0)
    }

    // ── Summaries & quizzes ─────────────────────────────────────────────────

    pub fn insert_summary(
        &self,
        document_id: &str,
        content: &SummaryContent,
        audio_url: Option<&str>,
    ) -> Result<Summary> {
        let conn = self.lock()?;
        let summary = Summary {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            content: content.clone(),
            audio_url: audio_url.map(str::to_string),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO summaries (id, document_id, tldr, key_concepts, definitions, bullet_summary, audio_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                summary.id,
                summary.document_id,
                content.tldr,
                serde_json::to_string(&content.key_concepts)?,
                serde_json::to_string(&content.definitions)?,
                serde_json::to_string(&content.bullet_summary)?,
                summary.audio_url,
                ts(summary.created_at)
            ],
        )?;
        Ok(summary)
    }

    pub fn get_summary(&self, document_id: &str) -> Result<Option<Summary>> {
        let conn = self.lock()?;
        let summary = conn
            .query_row(
                "SELECT id, document_id, tldr, key_concepts, definitions, bullet_summary, audio_url, created_at
                 FROM summaries WHERE document_id = ?1",
                [document_id],
                summary_from_row,
            )
            .optional()?;
        Ok(summary)
    }

    pub fn insert_quiz(&self, document_id: &str, questions: &[QuizQuestion]) -> Result<Quiz> {
        let conn = self.lock()?;
        let quiz = Quiz {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            questions: questions.to_vec(),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO quizzes (id, document_id, questions, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                quiz.id,
                quiz.document_id,
                serde_json::to_string(&quiz.questions)?,
                ts(quiz.created_at)
            ],
        )?;
        Ok(quiz)
    }

    pub fn get_quiz(&self, id: &str) -> Result<Option<Quiz>> {
        let conn = self.lock()?;
        let quiz = conn
            .query_row(
                "SELECT id, document_id, questions, created_at FROM quizzes WHERE id = ?1",
                [id],
                quiz_from_row,
            )
            .optional()?;
        Ok(quiz)
    }

    pub fn get_quiz_by_document(&self, document_id: &str) -> Result<Option<Quiz>> {
        let conn = self.lock()?;
        let quiz = conn
            .query_row(
                "SELECT id, document_id, questions, created_at FROM quizzes WHERE document_id = ?1",
                [document_id],
                quiz_from_row,
            )
            .optional()?;
        Ok(quiz)
    }

    /// Append a graded attempt
    pub fn insert_quiz_attempt(
        &self,
        quiz_id: &str,
        user_id: &str,
        score: u32,
        total_questions: u32,
        answers: &[usize],
    ) -> Result<QuizAttempt> {
        let conn = self.lock()?;
        let attempt = QuizAttempt {
            id: uuid::Uuid::new_v4().to_string(),
            quiz_id: quiz_id.to_string(),
            user_id: user_id.to_string(),
            score,
            total_questions,
            answers: answers.to_vec(),
            taken_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO quiz_attempts (id, quiz_id, user_id, score, total_questions, answers, taken_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                attempt.id,
                attempt.quiz_id,
                attempt.user_id,
                attempt.score,
                attempt.total_questions,
                serde_json::to_string(&attempt.answers)?,
                ts(attempt.taken_at)
            ],
        )?;
        Ok(attempt)
    }

    /// A user's attempts on a quiz, newest first
    pub fn list_attempts(&self, quiz_id: &str, user_id: &str) -> Result<Vec<QuizAttempt>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, quiz_id, user_id, score, total_questions, answers, taken_at
             FROM quiz_attempts WHERE quiz_id = ?1 AND user_id = ?2
             ORDER BY taken_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([quiz_id, user_id], attempt_from_row)?;
        let mut attempts = Vec::new();
        for row in rows {
            attempts.push(row?);
        }
        Ok(attempts)
    }

    // ── Flashcards ──────────────────────────────────────────────────────────

    /// Insert all cards for a document in one transaction
    pub fn insert_flashcards(
        &self,
        document_id: &str,
        user_id: &str,
        cards: &[FlashcardDraft],
    ) -> Result<usize> {
        if cards.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO flashcards (id, document_id, user_id, front, back, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let now = ts(Utc::now());
            for card in cards {
                stmt.execute(params![
                    uuid::Uuid::new_v4().to_string(),
                    document_id,
                    user_id,
                    card.front,
                    card.back,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(cards.len())
    }

    /// Cards for a document in creation order
    pub fn list_flashcards(&self, document_id: &str) -> Result<Vec<Flashcard>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM flashcards WHERE document_id = ?1 ORDER BY created_at, rowid",
            FLASHCARD_COLUMNS
        ))?;
        let rows = stmt.query_map([document_id], flashcard_from_row)?;
        let mut cards = Vec::new();
        for row in rows {
            cards.push(row?);
        }
        Ok(cards)
    }

    pub fn get_flashcard(&self, id: &str) -> Result<Option<Flashcard>> {
        let conn = self.lock()?;
        let card = conn
            .query_row(
                &format!("SELECT {} FROM flashcards WHERE id = ?1", FLASHCARD_COLUMNS),
                [id],
                flashcard_from_row,
            )
            .optional()?;
        Ok(card)
    }

    /// Persist review progress for a card
    pub fn save_flashcard_review(&self, card: &Flashcard) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE flashcards SET mastery_level = ?1, review_count = ?2, last_reviewed = ?3 WHERE id = ?4",
            params![
                card.mastery_level,
                card.review_count,
                card.last_reviewed.map(ts),
                card.id
            ],
        )?;
        Ok(())
    }

    // ── Folders ─────────────────────────────────────────────────────────────

    pub fn create_folder(&self, user_id: &str, name: &str, color: &str) -> Result<Folder> {
        let conn = self.lock()?;
        let folder = Folder {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO folders (id, user_id, name, color, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![folder.id, folder.user_id, folder.name, folder.color, ts(folder.created_at)],
        )?;
        Ok(folder)
    }

    pub fn list_folders(&self, user_id: &str) -> Result<Vec<Folder>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, color, created_at FROM folders
             WHERE user_id = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([user_id], folder_from_row)?;
        let mut folders = Vec::new();
        for row in rows {
            folders.push(row?);
        }
        Ok(folders)
    }

    pub fn get_folder(&self, id: &str) -> Result<Option<Folder>> {
        let conn = self.lock()?;
        let folder = conn
            .query_row(
                "SELECT id, user_id, name, color, created_at FROM folders WHERE id = ?1",
                [id],
                folder_from_row,
            )
            .optional()?;
        Ok(folder)
    }

    // ── Study packs ─────────────────────────────────────────────────────────

    /// Everything the viewer needs for one of the user's documents
    pub fn get_study_pack(&self, document_id: &str, user_id: &str) -> Result<Option<StudyPack>> {
        let Some(document) = self.get_document_for_user(document_id, user_id)? else {
            return Ok(None);
        };

        let summary = self.get_summary(document_id)?;
        let quiz = self.get_quiz_by_document(document_id)?;
        let attempts = match &quiz {
            Some(q) => self.list_attempts(&q.id, user_id)?,
            None => Vec::new(),
        };
        let flashcards = self.list_flashcards(document_id)?;

        Ok(Some(StudyPack {
            document,
            summary,
            quiz,
            flashcards,
            attempts,
        }))
    }
}
