//! Firestore document representation and the conversions between documents
//! and the domain types.
//!
//! Writes always emit every optional field, using `nullValue` when absent, so
//! an overwrite never leaves a stale value behind. Reads treat a missing field
//! and an explicit `nullValue` the same way.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Business, Event, Interest, Media};

pub type Fields = BTreeMap<String, Value>;

/// A typed Firestore value, in the REST API's JSON encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(serde_json::Value),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: Fields,
}

impl Value {
    pub fn null() -> Self {
        Self::NullValue(())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::StringValue(s.into())
    }

    pub fn optional_string(s: Option<&str>) -> Self {
        s.map(Self::string).unwrap_or_else(Self::null)
    }

    pub fn string_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ArrayValue(ArrayValue {
            values: items.into_iter().map(Self::string).collect(),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::StringValue(s) | Self::TimestampValue(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::NullValue(()))
    }
}

/// A document as returned by the store: its id plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Non-empty string value of a field. `nullValue`, a missing field and an
    /// empty string are all `None`.
    pub fn string(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn strings(&self, field: &str) -> Vec<String> {
        match self.fields.get(field) {
            Some(Value::ArrayValue(array)) => array
                .values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.string(field).and_then(parse_timestamp)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("document {id} is missing required field {field}")]
    MissingField { id: String, field: &'static str },

    #[error("document {id} has an invalid date: {value}")]
    InvalidDate { id: String, value: String },
}

/// Drops everything below a millisecond, the precision timestamps are stored at.
pub fn stored_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn optional_timestamp(ts: Option<DateTime<Utc>>) -> Value {
    ts.map(|t| Value::string(format_timestamp(t)))
        .unwrap_or_else(Value::null)
}

pub fn event_fields(event: &Event) -> Fields {
    let mut fields = Fields::new();
    fields.insert("businessId".into(), Value::string(&event.business_id));
    fields.insert("title".into(), Value::string(&event.title));
    fields.insert("caption".into(), Value::optional_string(event.caption.as_deref()));
    fields.insert("date".into(), Value::string(format_timestamp(event.date)));
    fields.insert("link".into(), Value::optional_string(event.link.as_deref()));
    fields.insert(
        "tags".into(),
        Value::string_array(event.tags.iter().map(Interest::as_str)),
    );
    fields.insert("image".into(), Value::optional_string(event.image()));
    fields.insert("video".into(), Value::optional_string(event.video()));
    fields.insert("createdAt".into(), optional_timestamp(event.created_at));
    fields.insert("updatedAt".into(), optional_timestamp(event.updated_at));
    fields
}

pub fn decode_event(doc: &Document) -> Result<Event, DecodeError> {
    let raw_date = doc.string("date").ok_or_else(|| DecodeError::MissingField {
        id: doc.id.clone(),
        field: "date",
    })?;
    let date = parse_timestamp(raw_date).ok_or_else(|| DecodeError::InvalidDate {
        id: doc.id.clone(),
        value: raw_date.to_string(),
    })?;

    let tags = doc
        .strings("tags")
        .into_iter()
        .filter_map(|tag| match tag.parse::<Interest>() {
            Ok(interest) => Some(interest),
            Err(e) => {
                warn!(event_id = %doc.id, error = %e, "dropping unrecognised tag");
                None
            }
        })
        .collect();

    let media = match (doc.string("video"), doc.string("image")) {
        (Some(video), image) => {
            if image.is_some() {
                warn!(event_id = %doc.id, "event has both image and video, keeping the video");
            }
            Some(Media::Video(video.to_string()))
        }
        (None, Some(image)) => Some(Media::Image(image.to_string())),
        (None, None) => None,
    };

    Ok(Event {
        id: doc.id.clone(),
        business_id: doc.string("businessId").unwrap_or_default().to_string(),
        title: doc.string("title").unwrap_or_default().to_string(),
        caption: doc.string("caption").map(str::to_string),
        date,
        link: doc.string("link").map(str::to_string),
        tags,
        media,
        created_at: doc.timestamp("createdAt"),
        updated_at: doc.timestamp("updatedAt"),
    })
}

pub fn business_fields(business: &Business) -> Fields {
    let mut fields = Fields::new();
    fields.insert("name".into(), Value::string(&business.name));
    fields.insert("address".into(), Value::string(&business.address));
    fields.insert("description".into(), Value::string(&business.description));
    fields.insert(
        "website".into(),
        Value::optional_string(business.website.as_deref()),
    );
    fields.insert("tags".into(), Value::string_array(&business.tags));
    fields.insert(
        "socialLinks".into(),
        Value::string_array(&business.social_links),
    );
    fields.insert("image".into(), Value::optional_string(business.image.as_deref()));
    fields.insert("createdAt".into(), optional_timestamp(business.created_at));
    fields.insert("updatedAt".into(), optional_timestamp(business.updated_at));
    fields
}

pub fn decode_business(doc: &Document) -> Business {
    Business {
        id: doc.id.clone(),
        name: doc.string("name").unwrap_or_default().to_string(),
        address: doc.string("address").unwrap_or_default().to_string(),
        description: doc.string("description").unwrap_or_default().to_string(),
        website: doc.string("website").map(str::to_string),
        tags: doc.strings("tags"),
        social_links: doc.strings("socialLinks"),
        image: doc.string("image").map(str::to_string),
        created_at: doc.timestamp("createdAt"),
        updated_at: doc.timestamp("updatedAt"),
    }
}
