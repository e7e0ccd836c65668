use super::{DateEntry, DateId, DateStore, Fields, NewDateEntry, PushOutcome, Review};
use super::StoreResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::info;

/// In-process date collection, ordered by id
#[derive(Debug, Default)]
pub struct MemoryDateStore {
    entries: RwLock<BTreeMap<DateId, DateEntry>>,
}

impl MemoryDateStore {
    pub fn new() -> Self {
        info!("Using in-memory date store; data is lost on shutdown");
        Self::default()
    }
}

#[async_trait]
impl DateStore for MemoryDateStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<DateEntry>> {
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &DateId) -> StoreResult<Option<DateEntry>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn insert(&self, entry: NewDateEntry) -> StoreResult<DateId> {
        let mut fields = entry.into_fields();
        // New entries never carry reviews
        fields.remove("reviews");
        fields.remove("review_rating");

        let id = DateId::generate();
        let entry = DateEntry {
            id,
            reviews: Vec::new(),
            review_rating: 0.0,
            fields,
        };
        self.entries.write().await.insert(id, entry);
        Ok(id)
    }

    async fn update(&self, id: &DateId, fields: Fields) -> StoreResult<u64> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(id) else {
            return Ok(0);
        };

        let mut changed = false;
        for (key, value) in fields {
            if entry.fields.get(&key) != Some(&value) {
                entry.fields.insert(key, value);
                changed = true;
            }
        }
        Ok(changed.into())
    }

    async fn delete(&self, id: &DateId) -> StoreResult<u64> {
        Ok(self.entries.write().await.remove(id).is_some().into())
    }

    async fn push_review(&self, id: &DateId, review: Review) -> StoreResult<PushOutcome> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(id) else {
            return Ok(PushOutcome::EntryMissing);
        };
        let duplicate = review
            .user_id
            .as_deref()
            .is_some_and(|uid| entry.review_by(uid).is_some());
        if duplicate {
            return Ok(PushOutcome::AlreadyReviewed);
        }
        entry.reviews.push(review);
        Ok(PushOutcome::Added)
    }

    async fn replace_review(
        &self,
        id: &DateId,
        user_id: &str,
        review: Review,
    ) -> StoreResult<u64> {
        let mut entries = self.entries.write().await;
        let Some(slot) = entries
            .get_mut(id)
            .and_then(|entry| entry.reviews.iter_mut().find(|r| r.is_by(user_id)))
        else {
            return Ok(0);
        };
        if *slot == review {
            return Ok(0);
        }
        *slot = review;
        Ok(1)
    }

    async fn pull_review(&self, id: &DateId, user_id: &str) -> StoreResult<u64> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(id) else {
            return Ok(0);
        };
        let before = entry.reviews.len();
        entry.reviews.retain(|r| !r.is_by(user_id));
        Ok((entry.reviews.len() != before).into())
    }

    async fn average_rating(&self, id: &DateId) -> StoreResult<Option<f64>> {
        let entries = self.entries.read().await;
        let Some(entry) = entries.get(id) else {
            return Ok(None);
        };
        let ratings: Vec<f64> = entry.reviews.iter().filter_map(Review::numeric_rating).collect();
        if ratings.is_empty() {
            return Ok(None);
        }
        Ok(Some(ratings.iter().sum::<f64>() / ratings.len() as f64))
    }

    async fn set_review_rating(&self, id: &DateId, rating: f64) -> StoreResult<u64> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) if entry.review_rating != rating => {
                entry.review_rating = rating;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn review(user_id: &str, rating: Value) -> Review {
        Review {
            user_id: Some(user_id.to_string()),
            rating,
            date_added: Some(Utc::now()),
            extra: Fields::new(),
        }
    }

    async fn seeded() -> (MemoryDateStore, DateId) {
        let store = MemoryDateStore::new();
        let entry =
            NewDateEntry::from_fields(fields(json!({"location": "Park", "activity": "Picnic"})))
                .unwrap();
        let id = store.insert(entry).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn insert_then_get() {
        let (store, id) = seeded().await;
        let entry = store.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.fields["location"], json!("Park"));
        assert!(entry.reviews.is_empty());
        assert_eq!(entry.review_rating, 0.0);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_counts_only_real_changes() {
        let (store, id) = seeded().await;
        assert_eq!(store.update(&id, fields(json!({"title": "Sunday"}))).await.unwrap(), 1);
        assert_eq!(store.update(&id, fields(json!({"title": "Sunday"}))).await.unwrap(), 0);
        assert_eq!(store.update(&DateId::generate(), fields(json!({"x": 1}))).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn push_review_guards_duplicates() {
        let (store, id) = seeded().await;
        assert_eq!(
            store.push_review(&id, review("u1", json!(4))).await.unwrap(),
            PushOutcome::Added
        );
        assert_eq!(
            store.push_review(&id, review("u1", json!(2))).await.unwrap(),
            PushOutcome::AlreadyReviewed
        );
        assert_eq!(
            store.push_review(&DateId::generate(), review("u1", json!(2))).await.unwrap(),
            PushOutcome::EntryMissing
        );
        assert_eq!(store.get(&id).await.unwrap().unwrap().reviews.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_pushes_by_one_user_add_once() {
        let (store, id) = seeded().await;
        let (first, second) = tokio::join!(
            store.push_review(&id, review("u1", json!(4))),
            store.push_review(&id, review("u1", json!(2))),
        );

        let mut outcomes = [first.unwrap(), second.unwrap()];
        outcomes.sort_by_key(|o| matches!(o, PushOutcome::AlreadyReviewed));
        assert_eq!(outcomes, [PushOutcome::Added, PushOutcome::AlreadyReviewed]);
        assert_eq!(store.get(&id).await.unwrap().unwrap().reviews.len(), 1);
    }

    #[tokio::test]
    async fn average_skips_non_numeric_ratings() {
        let (store, id) = seeded().await;
        assert_eq!(store.average_rating(&id).await.unwrap(), None);

        store.push_review(&id, review("u1", json!(4))).await.unwrap();
        store.push_review(&id, review("u2", json!("great"))).await.unwrap();
        store.push_review(&id, review("u3", json!(5))).await.unwrap();
        assert_eq!(store.average_rating(&id).await.unwrap(), Some(4.5));
    }

    #[tokio::test]
    async fn replace_and_pull_review() {
        let (store, id) = seeded().await;
        store.push_review(&id, review("u1", json!(4))).await.unwrap();

        assert_eq!(store.replace_review(&id, "u1", review("u1", json!(1))).await.unwrap(), 1);
        assert_eq!(store.replace_review(&id, "nobody", review("nobody", json!(1))).await.unwrap(), 0);
        let entry = store.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.review_by("u1").unwrap().rating, json!(1));

        assert_eq!(store.pull_review(&id, "nobody").await.unwrap(), 0);
        assert_eq!(store.pull_review(&id, "u1").await.unwrap(), 1);
        assert!(store.get(&id).await.unwrap().unwrap().reviews.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (store, id) = seeded().await;
        assert_eq!(store.delete(&id).await.unwrap(), 1);
        assert_eq!(store.delete(&id).await.unwrap(), 0);
        assert!(store.get(&id).await.unwrap().is_none());
    }
}
