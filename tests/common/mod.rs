#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use schemadex::{
    Config, Error, FieldDescriptor, FieldKind, IndexCoordinator, MaxLength, NumericRange, Record,
    Result, Schema, Value,
};
use tempfile::TempDir;

/// Isolated storage directory for one test
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new(test_name: &str) -> Self {
        let temp_dir = TempDir::new()
            .unwrap_or_else(|e| panic!("Failed to create temp dir for test {}: {}", test_name, e));
        TestEnvironment { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> Config {
        Config::with_storage_path(self.path())
    }
}

/// Opens a coordinator, waiting for a previous owner of the location to
/// release its file lock.
pub async fn open<R: Record>(config: &Config) -> IndexCoordinator<R> {
    for _ in 0..200 {
        match IndexCoordinator::<R>::open(config).await {
            Ok(coordinator) => return coordinator,
            Err(Error::Locked(_)) => tokio::time::sleep(Duration::from_millis(10)).await,
            Err(e) => panic!("Failed to open coordinator: {}", e),
        }
    }
    panic!("index location stayed locked");
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Book {
    pub id: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub year: Option<i64>,
    pub rating: Option<f64>,
    pub available: Option<bool>,
    pub published: Option<DateTime<Utc>>,
    pub embedding: Option<Vec<f32>>,
    pub author_id: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub rank: Option<i64>,
    pub notes: Option<String>,
}

static BOOK_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(
        Schema::builder("Books", "library")
            .field(FieldDescriptor::new("id").kind(FieldKind::UniqueId))
            .field(
                FieldDescriptor::new("title")
                    .kinds(&[FieldKind::Text, FieldKind::DefaultSearch])
                    .constraint(MaxLength(200)),
            )
            .field(FieldDescriptor::new("tags").kind(FieldKind::Keyword))
            .field(FieldDescriptor::new("year").kind(FieldKind::Auto))
            .field(
                FieldDescriptor::new("rating")
                    .kind(FieldKind::Auto)
                    .constraint(NumericRange::between(0.0, 5.0)),
            )
            .field(FieldDescriptor::new("available").kind(FieldKind::Auto))
            .field(FieldDescriptor::new("published").kind(FieldKind::Auto))
            .field(FieldDescriptor::new("embedding").kind(FieldKind::Vector))
            .field(FieldDescriptor::new("author_id").kind(FieldKind::ForeignKey))
            .field(FieldDescriptor::new("meta").kind(FieldKind::Text))
            .field(FieldDescriptor::new("rank").kind(FieldKind::SortKey))
            .field(FieldDescriptor::new("notes").kind(FieldKind::MetaTagsOnly))
            .build()
            .expect("book schema is valid"),
    )
});

impl Record for Book {
    fn schema() -> Arc<Schema> {
        BOOK_SCHEMA.clone()
    }

    fn get_value(&self, field: &str) -> Option<Value> {
        match field {
            "id" => self.id.clone().map(Value::Str),
            "title" => self.title.clone().map(Value::Str),
            "tags" if !self.tags.is_empty() => Some(Value::string_list(self.tags.clone())),
            "year" => self.year.map(Value::Int),
            "rating" => self.rating.map(Value::Float),
            "available" => self.available.map(Value::Bool),
            "published" => self.published.map(Value::Timestamp),
            "embedding" => self.embedding.clone().map(Value::Vector),
            "author_id" => self.author_id.clone().map(Value::Str),
            "meta" => self.meta.clone().map(Value::Json),
            "rank" => self.rank.map(Value::Int),
            "notes" => self.notes.clone().map(Value::Str),
            _ => None,
        }
    }

    fn set_value(&mut self, field: &str, value: Value) -> Result<()> {
        let mismatch = |value: &Value| Error::encoding(field, format!("unexpected {}", value.type_name()));
        match field {
            "id" => self.id = value.to_token(),
            "title" => self.title = value.as_str().map(String::from),
            "tags" => {
                self.tags = value
                    .as_list()
                    .ok_or_else(|| mismatch(&value))?
                    .iter()
                    .filter_map(|item| item.as_str().map(String::from))
                    .collect()
            }
            "year" => self.year = Some(value.as_i64().ok_or_else(|| mismatch(&value))?),
            "rating" => self.rating = Some(value.as_f64().ok_or_else(|| mismatch(&value))?),
            "available" => self.available = Some(value.as_bool().ok_or_else(|| mismatch(&value))?),
            "published" => {
                self.published = Some(value.as_timestamp().ok_or_else(|| mismatch(&value))?)
            }
            "embedding" => {
                self.embedding = Some(value.as_vector().ok_or_else(|| mismatch(&value))?.to_vec())
            }
            "author_id" => self.author_id = value.to_token(),
            "meta" => match value {
                Value::Json(json) => self.meta = Some(json),
                other => return Err(mismatch(&other)),
            },
            "rank" => self.rank = Some(value.as_i64().ok_or_else(|| mismatch(&value))?),
            "notes" => self.notes = value.as_str().map(String::from),
            _ => return Err(mismatch(&value)),
        }
        Ok(())
    }
}

pub fn book(id: &str, title: &str) -> Book {
    Book {
        id: Some(id.to_string()),
        title: Some(title.to_string()),
        ..Book::default()
    }
}

/// A book with every indexed field set.
pub fn full_book(id: &str) -> Book {
    Book {
        id: Some(id.to_string()),
        title: Some("The Left Hand of Darkness".to_string()),
        tags: vec!["sci-fi".to_string(), "classic".to_string()],
        year: Some(1969),
        rating: Some(4.25),
        available: Some(false),
        published: Some(Utc.with_ymd_and_hms(1969, 3, 1, 0, 0, 0).unwrap()),
        embedding: Some(vec![0.125, -1.5, 3.75, 1e-3]),
        author_id: Some("ursula-le-guin".to_string()),
        meta: Some(serde_json::json!({"publisher": "Ace", "pages": 286})),
        rank: Some(3),
        notes: None,
    }
}
