use crate::core::error::{Error, Result};
use crate::core::types::Value;
use crate::index::document::{Document, FieldEntry, FieldValue, Indexing};
use crate::record::Record;
use crate::schema::field::FieldKind;
use crate::schema::schema::{SORT_FIELD, Schema};

#[derive(Debug, Clone, Copy)]
struct EncodeContext<'a> {
    field: &'a str,
    // Whether this kind owns the stored representation
    stored: bool,
    analyzer: &'a str,
    multi: bool,
}

type EncodeFn = fn(&EncodeContext<'_>, &Value, &mut Document) -> Result<()>;
type DecodeFn = fn(&str, &[&FieldEntry]) -> Result<Option<Value>>;

struct KindCodec {
    kind: FieldKind,
    encode: EncodeFn,
    decode: DecodeFn,
}

static KIND_CODECS: [KindCodec; 9] = [
    KindCodec {
        kind: FieldKind::UniqueId,
        encode: encode_unique_id,
        decode: decode_stored,
    },
    KindCodec {
        kind: FieldKind::Keyword,
        encode: encode_exact,
        decode: decode_stored,
    },
    KindCodec {
        kind: FieldKind::ForeignKey,
        encode: encode_exact,
        decode: decode_stored,
    },
    KindCodec {
        kind: FieldKind::Vector,
        encode: encode_vector,
        decode: decode_vector,
    },
    KindCodec {
        kind: FieldKind::Text,
        encode: encode_dynamic,
        decode: decode_stored,
    },
    KindCodec {
        kind: FieldKind::DefaultSearch,
        encode: encode_dynamic,
        decode: decode_stored,
    },
    KindCodec {
        kind: FieldKind::Auto,
        encode: encode_dynamic,
        decode: decode_stored,
    },
    KindCodec {
        kind: FieldKind::SortKey,
        encode: encode_sort_key,
        decode: decode_stored,
    },
    KindCodec {
        kind: FieldKind::MetaTagsOnly,
        encode: |_, _, _| Ok(()),
        decode: |_, _| Ok(None),
    },
];

fn codec_for(kind: FieldKind) -> Option<&'static KindCodec> {
    KIND_CODECS.iter().find(|codec| codec.kind == kind)
}

/// Whether `kind` can be encoded. Checked when a schema is built.
pub fn has_codec(kind: FieldKind) -> bool {
    codec_for(kind).is_some()
}

/// Converts `record` into an engine document. With `fields`, only the named
/// fields are encoded. Missing values contribute no entries.
pub fn encode<R: Record>(record: &R, schema: &Schema, fields: Option<&[&str]>) -> Result<Document> {
    let mut document = Document::new();

    for field in schema.fields() {
        if let Some(subset) = fields {
            if !subset.contains(&field.name.as_str()) {
                continue;
            }
        }
        if !field.is_indexed() {
            continue;
        }
        let Some(value) = record.get_value(&field.name) else {
            continue;
        };

        for (idx, kind) in field.encoding_kinds().into_iter().enumerate() {
            let codec = codec_for(kind).ok_or_else(|| {
                Error::encoding(&field.name, format!("no encoding for kind {}", kind))
            })?;
            let ctx = EncodeContext {
                field: &field.name,
                stored: idx == 0,
                analyzer: schema.analyzer_for(&field.name),
                multi: false,
            };
            (codec.encode)(&ctx, &value, &mut document)?;
        }
    }

    Ok(document)
}

/// Rebuilds a record from the stored entries of `document`.
pub fn decode<R: Record>(document: &Document, schema: &Schema) -> Result<R> {
    let mut record = R::default();

    for field in schema.fields() {
        if !field.is_indexed() {
            continue;
        }
        let Some(codec) = field.primary_kind().and_then(codec_for) else {
            continue;
        };

        let stored: Vec<&FieldEntry> = document.stored_entries(&field.name).collect();
        if stored.is_empty() {
            continue;
        }
        if let Some(value) = (codec.decode)(&field.name, &stored)? {
            record.set_value(&field.name, value)?;
        }
    }

    Ok(record)
}

fn scalar(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Str(s) => Some(FieldValue::Str(s.clone())),
        Value::Int(n) => Some(FieldValue::I64(*n)),
        Value::Float(n) => Some(FieldValue::F64(*n)),
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Timestamp(ts) => Some(FieldValue::Date(*ts)),
        Value::Vector(_) | Value::List(_) | Value::Json(_) => None,
    }
}

// Strings sort by their raw bytes
fn sortable(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Str(s) => FieldValue::Bytes(s.as_bytes().to_vec()),
        other => other.clone(),
    }
}

fn unsupported(ctx: &EncodeContext<'_>, kind: &str, value: &Value) -> Error {
    Error::encoding(
        ctx.field,
        format!("{} field cannot hold a {}", kind, value.type_name()),
    )
}

fn encode_unique_id(ctx: &EncodeContext<'_>, value: &Value, doc: &mut Document) -> Result<()> {
    let token = value
        .to_token()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::encoding(ctx.field, "unique id must be a non-empty scalar"))?;

    doc.push(
        FieldEntry::new(ctx.field, FieldValue::Str(token.clone()), Indexing::Exact)
            .stored(ctx.stored),
    );
    doc.push(FieldEntry::new(
        ctx.field,
        FieldValue::Bytes(token.into_bytes()),
        Indexing::Sortable,
    ));
    Ok(())
}

fn encode_exact(ctx: &EncodeContext<'_>, value: &Value, doc: &mut Document) -> Result<()> {
    if let Value::List(items) = value {
        for item in items {
            let term = scalar(item).ok_or_else(|| unsupported(ctx, "keyword list", item))?;
            doc.push(
                FieldEntry::new(ctx.field, term, Indexing::Exact)
                    .stored(ctx.stored)
                    .multi(true),
            );
        }
        return Ok(());
    }

    let term = scalar(value).ok_or_else(|| unsupported(ctx, "keyword", value))?;
    doc.push(FieldEntry::new(ctx.field, sortable(&term), Indexing::Sortable));
    doc.push(FieldEntry::new(ctx.field, term, Indexing::Exact).stored(ctx.stored));
    Ok(())
}

fn encode_vector(ctx: &EncodeContext<'_>, value: &Value, doc: &mut Document) -> Result<()> {
    let Value::Vector(vector) = value else {
        return Err(unsupported(ctx, "vector", value));
    };

    doc.push(FieldEntry::new(
        ctx.field,
        FieldValue::Vector(vector.clone()),
        Indexing::Vector,
    ));
    if ctx.stored {
        let text: Vec<String> = vector.iter().map(|x| x.to_string()).collect();
        doc.push(
            FieldEntry::new(ctx.field, FieldValue::Str(text.join(" ")), Indexing::StoredOnly)
                .stored(true),
        );
    }
    Ok(())
}

fn encode_dynamic(ctx: &EncodeContext<'_>, value: &Value, doc: &mut Document) -> Result<()> {
    let (value, indexing) = match value {
        Value::Str(s) => (
            FieldValue::Str(s.clone()),
            Indexing::Analyzed(ctx.analyzer.to_string()),
        ),
        Value::Json(json) => (
            FieldValue::Json(serde_json::to_string(json)?),
            Indexing::Analyzed(ctx.analyzer.to_string()),
        ),
        Value::List(items) => {
            let element = EncodeContext { multi: true, ..*ctx };
            for item in items {
                encode_dynamic(&element, item, doc)?;
            }
            return Ok(());
        }
        Value::Vector(_) => return Err(unsupported(ctx, "text", value)),
        other => match scalar(other) {
            Some(typed) => (typed, Indexing::Numeric),
            None => return Err(unsupported(ctx, "text", other)),
        },
    };

    doc.push(
        FieldEntry::new(ctx.field, value, indexing)
            .stored(ctx.stored)
            .multi(ctx.multi),
    );
    Ok(())
}

fn encode_sort_key(ctx: &EncodeContext<'_>, value: &Value, doc: &mut Document) -> Result<()> {
    let typed = scalar(value).ok_or_else(|| unsupported(ctx, "sort key", value))?;

    if ctx.stored {
        doc.push(FieldEntry::new(ctx.field, typed.clone(), Indexing::StoredOnly).stored(true));
    }
    doc.push(FieldEntry::new(SORT_FIELD, typed, Indexing::Sortable));
    Ok(())
}

fn to_value(value: &FieldValue) -> Result<Value> {
    Ok(match value {
        FieldValue::Str(s) => Value::Str(s.clone()),
        FieldValue::I64(n) => Value::Int(*n),
        FieldValue::F64(n) => Value::Float(*n),
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Date(ts) => Value::Timestamp(*ts),
        FieldValue::Bytes(b) => Value::Str(String::from_utf8_lossy(b).into_owned()),
        FieldValue::Vector(v) => Value::Vector(v.clone()),
        FieldValue::Json(s) => Value::Json(serde_json::from_str(s)?),
    })
}

// One stored entry is a scalar, multi-valued entries a list
fn decode_stored(_field: &str, entries: &[&FieldEntry]) -> Result<Option<Value>> {
    match entries {
        [] => Ok(None),
        [single] if !single.multi => to_value(&single.value).map(Some),
        many => {
            let items = many
                .iter()
                .map(|entry| to_value(&entry.value))
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(Value::List(items)))
        }
    }
}

fn decode_vector(field: &str, entries: &[&FieldEntry]) -> Result<Option<Value>> {
    let Some(entry) = entries.first() else {
        return Ok(None);
    };
    let FieldValue::Str(text) = &entry.value else {
        return Err(Error::Corrupt(format!("vector field '{}' is not stored as text", field)));
    };

    let vector = text
        .split_whitespace()
        .map(|part| part.parse::<f32>())
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| Error::Corrupt(format!("vector field '{}': {}", field, e)))?;
    Ok(Some(Value::Vector(vector)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, LazyLock};

    use chrono::{TimeZone, Utc};

    use crate::index::document::SlotKind;
    use crate::schema::field::FieldDescriptor;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Note {
        id: Option<String>,
        body: Option<String>,
        tags: Vec<String>,
        score: Option<i64>,
        weight: Option<f64>,
        pinned: Option<bool>,
        at: Option<chrono::DateTime<Utc>>,
        embedding: Option<Vec<f32>>,
        extra: Option<serde_json::Value>,
        rank: Option<i64>,
        hidden: Option<String>,
    }

    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(
            Schema::builder("notes", "test")
                .field(FieldDescriptor::new("id").kind(FieldKind::UniqueId))
                .field(FieldDescriptor::new("body").kinds(&[FieldKind::Text, FieldKind::DefaultSearch]))
                .field(FieldDescriptor::new("tags").kind(FieldKind::Keyword))
                .field(FieldDescriptor::new("score").kind(FieldKind::Auto))
                .field(FieldDescriptor::new("weight").kind(FieldKind::Auto))
                .field(FieldDescriptor::new("pinned").kind(FieldKind::Auto))
                .field(FieldDescriptor::new("at").kind(FieldKind::Auto))
                .field(FieldDescriptor::new("embedding").kind(FieldKind::Vector))
                .field(FieldDescriptor::new("extra").kind(FieldKind::Text))
                .field(FieldDescriptor::new("rank").kind(FieldKind::SortKey))
                .field(FieldDescriptor::new("hidden").kind(FieldKind::MetaTagsOnly))
                .build()
                .unwrap(),
        )
    });

    impl Record for Note {
        fn schema() -> Arc<Schema> {
            SCHEMA.clone()
        }

        fn get_value(&self, field: &str) -> Option<Value> {
            match field {
                "id" => self.id.clone().map(Value::Str),
                "body" => self.body.clone().map(Value::Str),
                "tags" if !self.tags.is_empty() => Some(Value::string_list(self.tags.clone())),
                "score" => self.score.map(Value::Int),
                "weight" => self.weight.map(Value::Float),
                "pinned" => self.pinned.map(Value::Bool),
                "at" => self.at.map(Value::Timestamp),
                "embedding" => self.embedding.clone().map(Value::Vector),
                "extra" => self.extra.clone().map(Value::Json),
                "rank" => self.rank.map(Value::Int),
                "hidden" => self.hidden.clone().map(Value::Str),
                _ => None,
            }
        }

        fn set_value(&mut self, field: &str, value: Value) -> Result<()> {
            match (field, value) {
                ("id", Value::Str(s)) => self.id = Some(s),
                ("body", Value::Str(s)) => self.body = Some(s),
                ("tags", Value::List(items)) => {
                    self.tags = items.iter().filter_map(|v| v.as_str().map(String::from)).collect()
                }
                ("score", Value::Int(n)) => self.score = Some(n),
                ("weight", Value::Float(n)) => self.weight = Some(n),
                ("pinned", Value::Bool(b)) => self.pinned = Some(b),
                ("at", v) => self.at = v.as_timestamp(),
                ("embedding", Value::Vector(v)) => self.embedding = Some(v),
                ("extra", Value::Json(j)) => self.extra = Some(j),
                ("rank", Value::Int(n)) => self.rank = Some(n),
                ("hidden", Value::Str(s)) => self.hidden = Some(s),
                (field, value) => {
                    return Err(Error::encoding(field, format!("unexpected {}", value.type_name())));
                }
            }
            Ok(())
        }
    }

    fn full() -> Note {
        Note {
            id: Some("n1".into()),
            body: Some("Remember the milk".into()),
            tags: vec!["home".into(), "errand".into()],
            score: Some(-3),
            weight: Some(0.1),
            pinned: Some(true),
            at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()),
            embedding: Some(vec![0.1, -2.5, 3.333_333]),
            extra: Some(serde_json::json!({"color": "red", "n": 2})),
            rank: Some(7),
            hidden: Some("secret".into()),
        }
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let note = full();
        let doc = encode(&note, &SCHEMA, None).unwrap();
        let back: Note = decode(&doc, &SCHEMA).unwrap();

        let expected = Note {
            hidden: None,
            ..note
        };
        assert_eq!(back, expected);
    }

    #[test]
    fn test_meta_only_and_missing_fields_emit_nothing() {
        let note = Note {
            id: Some("n2".into()),
            hidden: Some("x".into()),
            ..Note::default()
        };
        let doc = encode(&note, &SCHEMA, None).unwrap();
        assert!(doc.entries.iter().all(|e| e.name == "id"));
    }

    #[test]
    fn test_unique_id_entries() {
        let doc = encode(&full(), &SCHEMA, None).unwrap();
        assert!(doc.has_exact("id", "n1"));
        assert_eq!(doc.sort_value("id"), Some(&FieldValue::Bytes(b"n1".to_vec())));
    }

    #[test]
    fn test_keyword_list_has_no_sort_projection() {
        let doc = encode(&full(), &SCHEMA, None).unwrap();
        let tags: Vec<_> = doc.entries_named("tags").collect();
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|e| e.indexing == Indexing::Exact && e.multi));
        assert!(doc.sort_value("tags").is_none());
    }

    #[test]
    fn test_sort_key_goes_to_reserved_field() {
        let doc = encode(&full(), &SCHEMA, None).unwrap();
        assert_eq!(doc.sort_value(SORT_FIELD), Some(&FieldValue::I64(7)));
    }

    #[test]
    fn test_dynamic_dispatch_on_runtime_type() {
        let doc = encode(&full(), &SCHEMA, None).unwrap();
        let kind = |name: &str| doc.entries_named(name).next().unwrap().indexing.slot_kind();
        assert_eq!(kind("body"), SlotKind::Analyzed);
        assert_eq!(kind("score"), SlotKind::Numeric);
        assert_eq!(kind("extra"), SlotKind::Analyzed);
    }

    #[test]
    fn test_vector_is_stored_as_text() {
        let doc = encode(&full(), &SCHEMA, None).unwrap();
        let stored: Vec<_> = doc.stored_entries("embedding").collect();
        assert_eq!(stored.len(), 1);
        assert!(matches!(&stored[0].value, FieldValue::Str(s) if s.split(' ').count() == 3));
    }

    #[test]
    fn test_empty_id_is_an_encoding_error() {
        let note = Note {
            id: Some(String::new()),
            ..Note::default()
        };
        assert!(matches!(
            encode(&note, &SCHEMA, None),
            Err(Error::Encoding { .. })
        ));
    }

    #[test]
    fn test_subset_encodes_only_named_fields() {
        let doc = encode(&full(), &SCHEMA, Some(&["id", "score"])).unwrap();
        assert!(doc.entries.iter().all(|e| e.name == "id" || e.name == "score"));
    }

    #[test]
    fn test_every_kind_has_a_codec() {
        for kind in FieldKind::ALL {
            assert!(has_codec(kind));
        }
    }
}
