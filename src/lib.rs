//! Cognify - turns PDFs and web pages into study packs
//!
//! A study pack is a summary, a quiz, flashcards and a narrated audio
//! overview, generated by an LLM and stored per user:
//! - SQLite: documents, study material, profiles and billing state
//! - Filesystem object store: uploaded PDFs and narration audio
//! - Hosted collaborators: Supabase Auth, OpenAI, Stripe

pub mod auth;
pub mod billing;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod generate;
pub mod ingest;
pub mod ratelimit;
pub mod server;
pub mod storage;
pub mod study;
pub mod types;

pub use auth::{AuthUser, Authenticator, SupabaseAuth};
pub use billing::{BillingProvider, StripeClient};
pub use config::Config;
pub use error::{Error, Result};
pub use generate::{OpenAiClient, StudyGenerator};
pub use ingest::{Source, StudyPackPipeline};
pub use ratelimit::GuestLimiter;
pub use server::{create_router, run_server, AppState};
pub use storage::{BlobStore, StudyStore};
pub use types::*;
