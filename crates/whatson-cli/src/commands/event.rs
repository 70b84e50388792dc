use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use tabled::Tabled;
use uuid::Uuid;
use whatson_sync::domain::{Event, EventWithBusiness, Interest, Media};
use whatson_sync::error::AppError;
use whatson_sync::validation::{format_website_url, validate_event, EventDraft};
use whatson_sync::App;

use super::{signed_in_code, upload_media};
use crate::output::{self, Format};

#[derive(Subcommand)]
pub enum Commands {
    /// List events, latest first when filtered by business
    List {
        #[arg(long, help = "Only events of this business")]
        business: Option<String>,
    },
    /// Create an event for the signed-in business
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, help = "Start time, RFC 3339 (e.g. 2031-05-02T19:00:00Z)")]
        date: DateTime<Utc>,
        #[arg(long, default_value = "")]
        caption: String,
        #[arg(long, default_value = "")]
        link: String,
        #[arg(long = "interest", help = "Interest category, repeatable")]
        interests: Vec<Interest>,
        #[arg(long, conflicts_with = "video", help = "Local image to attach")]
        image: Option<PathBuf>,
        #[arg(long, help = "Local video to attach; the event stays pending until promoted")]
        video: Option<PathBuf>,
    },
    /// Edit an event of the signed-in business
    Update {
        #[arg(help = "Event ID")]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<DateTime<Utc>>,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long = "interest", help = "Replaces all interest categories")]
        interests: Vec<Interest>,
    },
    /// Delete an event of the signed-in business together with its media
    Delete {
        #[arg(help = "Event ID")]
        id: String,
    },
}

#[derive(Tabled)]
pub struct EventRow {
    pub id: String,
    pub date: String,
    pub title: String,
    pub business: String,
    pub tags: String,
    pub media: String,
}

fn media_label(media: &Option<Media>) -> String {
    match media {
        Some(Media::Image(_)) => "image".into(),
        Some(Media::Video(_)) => "video".into(),
        None => "-".into(),
    }
}

fn tag_list(tags: &[Interest]) -> String {
    tags.iter()
        .map(Interest::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<&Event> for EventRow {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id.clone(),
            date: e.date.format("%Y-%m-%d %H:%M").to_string(),
            title: e.title.clone(),
            business: e.business_id.clone(),
            tags: tag_list(&e.tags),
            media: media_label(&e.media),
        }
    }
}

impl From<&EventWithBusiness> for EventRow {
    fn from(e: &EventWithBusiness) -> Self {
        Self {
            business: e.business_name.clone(),
            ..Self::from(&e.event)
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

fn draft_of(event: &Event) -> EventDraft {
    EventDraft {
        title: event.title.clone(),
        caption: event.caption.clone().unwrap_or_default(),
        date: event.date,
        link: event.link.clone().unwrap_or_default(),
        interests: event.tags.clone(),
    }
}

fn print_saved(event: &Event, message: &str, format: Format) {
    match format {
        Format::Json => output::print_json(event),
        Format::Table => {
            output::print_success(message);
            output::print_table(vec![EventRow::from(event)]);
        }
    }
}

async fn find_own_event(app: &App, code: &str, id: &str) -> Result<Event> {
    let event = app
        .store()
        .fetch_events_for_business(code)
        .await?
        .into_iter()
        .find(|e| e.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Event {id}")))?;
    Ok(event)
}

pub async fn run(cmd: Commands, app: &App, format: Format) -> Result<()> {
    let store = app.store();

    match cmd {
        Commands::List { business } => {
            let events = match business {
                Some(id) => store.fetch_events_for_business(&id).await?,
                None => store.fetch_all_events().await?,
            };
            output::print_items::<_, EventRow>(&events, format);
        }
        Commands::Create {
            title,
            date,
            caption,
            link,
            interests,
            image,
            video,
        } => {
            let code = signed_in_code(app).await?;
            let draft = EventDraft {
                title,
                caption,
                date,
                link,
                interests,
            };
            validate_event(&draft, Utc::now())?;

            let mut event = Event::new(Uuid::new_v4().to_string(), code, draft.title.trim(), draft.date);
            event.caption = non_empty(&draft.caption);
            event.link = non_empty(&draft.link).map(|l| format_website_url(&l));
            event.tags = draft.interests;

            if let Some(path) = video {
                event.media = Some(Media::Video(upload_media(app, &path, "event").await?));
                let saved = store.save_pending_event(&event).await?;
                output::print_notice("Video is processing; the event goes live once it is promoted");
                print_saved(&saved, "Event submitted", format);
            } else {
                if let Some(path) = image {
                    event.media = Some(Media::Image(upload_media(app, &path, "event").await?));
                }
                let saved = store.save_event(&event).await?;
                print_saved(&saved, "Event created", format);
            }
        }
        Commands::Update {
            id,
            title,
            date,
            caption,
            link,
            interests,
        } => {
            let code = signed_in_code(app).await?;
            let mut event = find_own_event(app, &code, &id).await?;

            if let Some(title) = title {
                event.title = title.trim().to_string();
            }
            if let Some(date) = date {
                event.date = date;
            }
            if let Some(caption) = caption {
                event.caption = non_empty(&caption);
            }
            if let Some(link) = link {
                event.link = non_empty(&link).map(|l| format_website_url(&l));
            }
            if !interests.is_empty() {
                event.tags = interests;
            }
            validate_event(&draft_of(&event), Utc::now())?;

            let saved = store.save_event(&event).await?;
            print_saved(&saved, "Event updated", format);
        }
        Commands::Delete { id } => {
            let code = signed_in_code(app).await?;
            let event = find_own_event(app, &code, &id).await?;
            store.delete_event_with_media(&event).await?;
            output::print_success("Event deleted");
        }
    }

    Ok(())
}
