use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Interest;

/// Media attached to an event. An event never carries both kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Image(String),
    Video(String),
}

impl Media {
    pub fn url(&self) -> &str {
        match self {
            Self::Image(url) | Self::Video(url) => url,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventRecord", into = "EventRecord")]
pub struct Event {
    pub id: String,
    pub business_id: String,
    pub title: String,
    pub caption: Option<String>,
    pub date: DateTime<Utc>,
    pub link: Option<String>,
    pub tags: Vec<Interest>,
    pub media: Option<Media>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        business_id: impl Into<String>,
        title: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            business_id: business_id.into(),
            title: title.into(),
            caption: None,
            date,
            link: None,
            tags: Vec::new(),
            media: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn image(&self) -> Option<&str> {
        match &self.media {
            Some(Media::Image(url)) => Some(url),
            _ => None,
        }
    }

    pub fn video(&self) -> Option<&str> {
        match &self.media {
            Some(Media::Video(url)) => Some(url),
            _ => None,
        }
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.date >= now
    }
}

/// Flat shape used when an event is written to the local cache.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    id: String,
    business_id: String,
    title: String,
    #[serde(default)]
    caption: Option<String>,
    date: DateTime<Utc>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    video: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<EventRecord> for Event {
    type Error = String;

    fn try_from(r: EventRecord) -> Result<Self, Self::Error> {
        let media = match (r.image, r.video) {
            (Some(_), Some(_)) => {
                return Err(format!("event {} has both an image and a video", r.id))
            }
            (Some(image), None) => Some(Media::Image(image)),
            (None, Some(video)) => Some(Media::Video(video)),
            (None, None) => None,
        };

        let tags = r
            .tags
            .iter()
            .filter_map(|tag| match tag.parse::<Interest>() {
                Ok(interest) => Some(interest),
                Err(e) => {
                    warn!(event_id = %r.id, error = %e, "dropping unrecognised cached tag");
                    None
                }
            })
            .collect();

        Ok(Self {
            id: r.id,
            business_id: r.business_id,
            title: r.title,
            caption: r.caption,
            date: r.date,
            link: r.link,
            tags,
            media,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl From<Event> for EventRecord {
    fn from(e: Event) -> Self {
        let (image, video) = match e.media {
            Some(Media::Image(url)) => (Some(url), None),
            Some(Media::Video(url)) => (None, Some(url)),
            None => (None, None),
        };

        Self {
            id: e.id,
            business_id: e.business_id,
            title: e.title,
            caption: e.caption,
            date: e.date,
            link: e.link,
            tags: e.tags.iter().map(|t| t.as_str().to_string()).collect(),
            image,
            video,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

/// An event joined with the name of the business that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWithBusiness {
    #[serde(flatten)]
    pub event: Event,
    pub business_name: String,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample() -> Event {
        let mut event = Event::new(
            "E1",
            "B1",
            "Live Music",
            Utc.with_ymd_and_hms(2030, 1, 5, 19, 0, 0).unwrap(),
        );
        event.tags = vec![Interest::LiveMusic];
        event.media = Some(Media::Video("https://v.example/clip.mp4".into()));
        event
    }

    #[test]
    fn cache_json_uses_flat_camel_case_fields() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["businessId"], "B1");
        assert_eq!(json["video"], "https://v.example/clip.mp4");
        assert!(json["image"].is_null());
        assert_eq!(json["tags"][0], "Live Music");
    }

    #[test]
    fn rejects_image_and_video_together() {
        let json = serde_json::json!({
            "id": "E1",
            "businessId": "B1",
            "title": "Both",
            "date": "2030-01-05T19:00:00Z",
            "image": "a.jpg",
            "video": "b.mp4"
        });
        assert!(serde_json::from_value::<Event>(json).is_err());
    }

    #[test]
    fn unknown_tags_are_dropped_one_by_one() {
        let json = serde_json::json!({
            "id": "E1",
            "businessId": "B1",
            "title": "Mixed",
            "date": "2030-01-05T19:00:00Z",
            "tags": ["Live Music", "Bowling", "comedy"]
        });
        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(event.tags, vec![Interest::LiveMusic, Interest::Comedy]);
    }

    #[test]
    fn joined_event_flattens() {
        let joined = EventWithBusiness {
            event: sample(),
            business_name: "Cafe X".into(),
        };
        let json = serde_json::to_value(&joined).unwrap();
        assert_eq!(json["businessName"], "Cafe X");
        assert_eq!(json["title"], "Live Music");

        let back: EventWithBusiness = serde_json::from_value(json).unwrap();
        assert_eq!(back, joined);
    }
}
