//! MongoDB backend for the date collection
//!
//! Entries are read and written as raw `Document`s and converted by hand, so
//! fields the service knows nothing about survive every round trip.

use super::{DateEntry, DateId, DateStore, Fields, NewDateEntry, PushOutcome, Review};
use super::{StoreError, StoreResult};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{Client, Collection, Database};
use serde_json::Value;
use tracing::{info, warn};

/// Date collection stored in MongoDB
#[derive(Debug, Clone)]
pub struct MongoDateStore {
    database: Database,
    collection: Collection<Document>,
}

impl MongoDateStore {
    /// Connect and verify the server answers before serving requests
    pub async fn connect(uri: &str, db_name: &str, collection: &str) -> StoreResult<Self> {
        info!("Connecting to MongoDB database '{}'", db_name);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await?;
        let database = client.database(db_name);
        let store = Self {
            collection: database.collection::<Document>(collection),
            database,
        };
        store.ping().await?;

        info!(collection, "Connected to MongoDB");
        Ok(store)
    }
}

fn value_to_bson(value: Value) -> StoreResult<Bson> {
    Bson::try_from(value).map_err(|e| StoreError::Encoding(e.to_string()))
}

fn fields_to_document(fields: Fields) -> StoreResult<Document> {
    fields
        .into_iter()
        .map(|(key, value)| Ok((key, value_to_bson(value)?)))
        .collect()
}

fn review_to_document(review: Review) -> StoreResult<Document> {
    let mut doc = fields_to_document(review.extra)?;
    if let Some(user_id) = review.user_id {
        doc.insert("user_id", user_id);
    }
    doc.insert("rating", value_to_bson(review.rating)?);
    if let Some(at) = review.date_added {
        doc.insert("date_added", bson::DateTime::from_chrono(at));
    }
    Ok(doc)
}

fn bson_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

fn review_from_bson(value: Bson) -> StoreResult<Review> {
    let mut doc = match value {
        Bson::Document(doc) => doc,
        other => {
            return Err(StoreError::Corrupt(format!(
                "review is not a document: {}",
                other
            )));
        }
    };
    // Values of an unexpected type go back into the extra fields untouched
    let user_id = match doc.remove("user_id") {
        Some(Bson::String(uid)) => Some(uid),
        Some(other) => {
            doc.insert("user_id", other);
            None
        }
        None => None,
    };
    let rating = doc
        .remove("rating")
        .map(Bson::into_relaxed_extjson)
        .unwrap_or(Value::Null);
    let date_added = match doc.remove("date_added") {
        Some(Bson::DateTime(at)) => Some(at.to_chrono()),
        Some(other) => {
            doc.insert("date_added", other);
            None
        }
        None => None,
    };

    Ok(Review {
        user_id,
        rating,
        date_added,
        extra: document_to_fields(doc),
    })
}

fn document_to_fields(doc: Document) -> Fields {
    doc.into_iter()
        .map(|(key, value)| (key, value.into_relaxed_extjson()))
        .collect()
}

fn entry_from_document(mut doc: Document) -> StoreResult<DateEntry> {
    let id = match doc.remove("_id") {
        Some(Bson::ObjectId(oid)) => DateId::from(oid),
        other => return Err(StoreError::Corrupt(format!("_id is {:?}", other))),
    };

    let reviews = match doc.remove("reviews") {
        Some(Bson::Array(items)) => items
            .into_iter()
            .filter_map(|item| match review_from_bson(item) {
                Ok(review) => Some(review),
                Err(e) => {
                    warn!(oid = %id, "Skipping unreadable review: {}", e);
                    None
                }
            })
            .collect(),
        Some(Bson::Null) | None => Vec::new(),
        Some(other) => {
            return Err(StoreError::Corrupt(format!(
                "reviews of {} is not an array: {}",
                id, other
            )));
        }
    };

    let review_rating = doc
        .remove("review_rating")
        .as_ref()
        .and_then(bson_number)
        .unwrap_or(0.0);

    Ok(DateEntry {
        id,
        reviews,
        review_rating,
        fields: document_to_fields(doc),
    })
}

fn by_id(id: &DateId) -> Document {
    doc! { "_id": id.object_id() }
}

#[async_trait]
impl DateStore for MongoDateStore {
    fn backend(&self) -> &'static str {
        "mongo"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<DateEntry>> {
        let docs: Vec<Document> = self.collection.find(doc! {}).await?.try_collect().await?;

        Ok(docs
            .into_iter()
            .filter_map(|doc| match entry_from_document(doc) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable date entry: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn get(&self, id: &DateId) -> StoreResult<Option<DateEntry>> {
        self.collection
            .find_one(by_id(id))
            .await?
            .map(entry_from_document)
            .transpose()
    }

    async fn insert(&self, entry: NewDateEntry) -> StoreResult<DateId> {
        let doc = fields_to_document(entry.into_fields())?;
        let result = self.collection.insert_one(doc).await?;

        result
            .inserted_id
            .as_object_id()
            .map(DateId::from)
            .ok_or_else(|| StoreError::Corrupt(format!("inserted _id is {}", result.inserted_id)))
    }

    async fn update(&self, id: &DateId, fields: Fields) -> StoreResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let updates = fields_to_document(fields)?;
        let result = self
            .collection
            .update_one(by_id(id), doc! { "$set": updates })
            .await?;
        Ok(result.modified_count)
    }

    async fn delete(&self, id: &DateId) -> StoreResult<u64> {
        let result = self.collection.delete_one(by_id(id)).await?;
        Ok(result.deleted_count)
    }

    async fn push_review(&self, id: &DateId, review: Review) -> StoreResult<PushOutcome> {
        let user_id = review.user_id.clone().unwrap_or_default();
        let review = review_to_document(review)?;

        // The user check rides in the filter, so concurrent pushes by one user
        // cannot both match
        let filter = doc! {
            "_id": id.object_id(),
            "reviews.user_id": { "$ne": user_id.as_str() },
        };
        let result = self
            .collection
            .update_one(filter, doc! { "$push": { "reviews": review } })
            .await?;
        if result.matched_count > 0 {
            return Ok(PushOutcome::Added);
        }

        let exists = self.collection.count_documents(by_id(id)).await? > 0;
        Ok(if exists {
            PushOutcome::AlreadyReviewed
        } else {
            PushOutcome::EntryMissing
        })
    }

    async fn replace_review(
        &self,
        id: &DateId,
        user_id: &str,
        review: Review,
    ) -> StoreResult<u64> {
        let review = review_to_document(review)?;
        let filter = doc! { "_id": id.object_id(), "reviews.user_id": user_id };
        let result = self
            .collection
            .update_one(filter, doc! { "$set": { "reviews.$": review } })
            .await?;
        Ok(result.modified_count)
    }

    async fn pull_review(&self, id: &DateId, user_id: &str) -> StoreResult<u64> {
        let result = self
            .collection
            .update_one(
                by_id(id),
                doc! { "$pull": { "reviews": { "user_id": user_id } } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn average_rating(&self, id: &DateId) -> StoreResult<Option<f64>> {
        let pipeline = vec![
            doc! { "$match": by_id(id) },
            doc! { "$project": { "_id": 0, "average": { "$avg": "$reviews.rating" } } },
        ];
        let mut cursor = self.collection.aggregate(pipeline).await?;

        Ok(cursor
            .try_next()
            .await?
            .and_then(|doc| doc.get("average").and_then(bson_number)))
    }

    async fn set_review_rating(&self, id: &DateId, rating: f64) -> StoreResult<u64> {
        let result = self
            .collection
            .update_one(by_id(id), doc! { "$set": { "review_rating": rating } })
            .await?;
        Ok(result.modified_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn entry_from_document_splits_known_fields() {
        let oid = ObjectId::new();
        let at = bson::DateTime::from_millis(1_700_000_000_000);
        let doc = doc! {
            "_id": oid,
            "location": "Park",
            "activity": "Picnic",
            "review_rating": 4,
            "reviews": [
                { "user_id": "u1", "rating": 4, "date_added": at, "comment": "lovely" },
            ],
        };

        let entry = entry_from_document(doc).unwrap();
        assert_eq!(entry.id, DateId::from(oid));
        assert_eq!(entry.review_rating, 4.0);
        assert_eq!(entry.fields["location"], json!("Park"));
        assert!(!entry.fields.contains_key("reviews"));

        let review = &entry.reviews[0];
        assert_eq!(review.user_id.as_deref(), Some("u1"));
        assert_eq!(review.rating, json!(4));
        assert_eq!(review.date_added, Some(at.to_chrono()));
        assert_eq!(review.extra["comment"], json!("lovely"));
    }

    #[test]
    fn nonconforming_reviews_are_kept_verbatim() {
        let doc = doc! {
            "_id": ObjectId::new(),
            "reviews": [
                { "rating": 3 },
                { "user_id": 7, "rating": 1, "date_added": "2023-01-01" },
                { "user_id": "u2", "rating": 5 },
            ],
        };
        let entry = entry_from_document(doc).unwrap();
        assert_eq!(entry.reviews.len(), 3);
        assert_eq!(entry.reviews[0].user_id, None);
        assert_eq!(entry.reviews[0].rating, json!(3));

        let legacy = &entry.reviews[1];
        assert_eq!(legacy.user_id, None);
        assert_eq!(legacy.date_added, None);
        assert_eq!(legacy.extra["user_id"], json!(7));
        assert_eq!(legacy.extra["date_added"], json!("2023-01-01"));

        assert_eq!(entry.reviews[2].user_id.as_deref(), Some("u2"));
        assert_eq!(entry.review_rating, 0.0);
    }

    #[test]
    fn nonconforming_review_round_trips() {
        let original = doc! { "user_id": 7, "rating": 1, "date_added": "2023-01-01" };
        let review = review_from_bson(Bson::Document(original)).unwrap();
        let written = review_to_document(review).unwrap();
        assert_eq!(written.get("user_id").and_then(bson_number), Some(7.0));
        assert_eq!(written.get_str("date_added").unwrap(), "2023-01-01");
        assert_eq!(written.get("rating").and_then(bson_number), Some(1.0));
    }

    #[test]
    fn entry_without_object_id_is_corrupt() {
        let err = entry_from_document(doc! { "_id": "plain" }).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn review_to_document_stamps_bson_date() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut extra = Fields::new();
        extra.insert("comment".into(), json!("ok"));
        let doc = review_to_document(Review {
            user_id: Some("u1".into()),
            rating: json!(3.5),
            date_added: Some(at),
            extra,
        })
        .unwrap();

        assert_eq!(doc.get_str("user_id").unwrap(), "u1");
        assert_eq!(doc.get_f64("rating").unwrap(), 3.5);
        assert_eq!(doc.get_datetime("date_added").unwrap().to_chrono(), at);
        assert_eq!(doc.get_str("comment").unwrap(), "ok");
    }

    #[test]
    fn bson_number_reads_numeric_kinds() {
        assert_eq!(bson_number(&Bson::Int32(3)), Some(3.0));
        assert_eq!(bson_number(&Bson::Int64(5)), Some(5.0));
        assert_eq!(bson_number(&Bson::Double(2.5)), Some(2.5));
        assert_eq!(bson_number(&Bson::Null), None);
        assert_eq!(bson_number(&Bson::String("4".into())), None);
    }
}
