pub mod memory;
pub mod model;
pub mod mongo;

pub use memory::MemoryDateStore;
pub use model::{DateEntry, DateId, Fields, NewDateEntry, PushOutcome, Review};
pub use mongo::MongoDateStore;

use async_trait::async_trait;

/// Failures surfaced by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("value cannot be stored: {0}")]
    Encoding(String),
    #[error("stored document is unreadable: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations the HTTP layer issues against the date collection.
///
/// Counts returned by mutations follow document-store semantics: a matched
/// document whose content does not change counts as 0 modified.
#[async_trait]
pub trait DateStore: Send + Sync {
    /// Short name of the backend, reported by the health check
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    /// All entries in store order
    async fn list(&self) -> StoreResult<Vec<DateEntry>>;

    async fn get(&self, id: &DateId) -> StoreResult<Option<DateEntry>>;

    async fn insert(&self, entry: NewDateEntry) -> StoreResult<DateId>;

    /// Merge `fields` into the entry, returning the modified count
    async fn update(&self, id: &DateId, fields: Fields) -> StoreResult<u64>;

    /// Remove the entry, returning the deleted count
    async fn delete(&self, id: &DateId) -> StoreResult<u64>;

    /// Append `review` unless the entry already holds one by the same user.
    /// The check and the append happen as one store operation.
    async fn push_review(&self, id: &DateId, review: Review) -> StoreResult<PushOutcome>;

    /// Replace the review written by `user_id`, returning the modified count
    async fn replace_review(&self, id: &DateId, user_id: &str, review: Review)
    -> StoreResult<u64>;

    /// Remove every review written by `user_id`, returning the modified count
    async fn pull_review(&self, id: &DateId, user_id: &str) -> StoreResult<u64>;

    /// Mean of the numeric review ratings, `None` when there are none
    async fn average_rating(&self, id: &DateId) -> StoreResult<Option<f64>>;

    async fn set_review_rating(&self, id: &DateId, rating: f64) -> StoreResult<u64>;
}
