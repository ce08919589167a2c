//! Persistence: SQLite records and filesystem objects

pub mod blob;
pub mod database;

pub use blob::{audio_key, document_key, BlobStore, Bucket, STORAGE_ROUTE};
pub use database::{StudyStore, SubscriptionUpdate};
