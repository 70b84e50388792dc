use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use tabled::Tabled;
use whatson_sync::domain::Business;
use whatson_sync::error::AppError;
use whatson_sync::feed::search_businesses;
use whatson_sync::validation::{validate_business, BusinessDraft};
use whatson_sync::App;

use super::{signed_in_code, upload_media};
use crate::output::{self, display_option, Format};

#[derive(Subcommand)]
pub enum Commands {
    /// List all businesses
    List,
    /// Search businesses by name or tag
    Search {
        #[arg(help = "Text to look for")]
        text: String,
    },
    /// Get business details
    Get {
        #[arg(help = "Business ID")]
        id: String,
    },
    /// Create or update the signed-in business profile
    Save {
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        website: String,
        #[arg(long, help = "Comma-separated tags")]
        tags: String,
        #[arg(long, default_value = "", help = "Comma-separated profile URLs")]
        social_links: String,
        #[arg(long, help = "Local image to upload as the profile picture")]
        image: Option<PathBuf>,
    },
    /// Delete the signed-in business profile
    Delete,
}

#[derive(Tabled)]
pub struct BusinessRow {
    pub id: String,
    pub name: String,
    pub address: String,
    #[tabled(display_with = "display_option")]
    pub website: Option<String>,
    pub tags: String,
}

impl From<&Business> for BusinessRow {
    fn from(b: &Business) -> Self {
        Self {
            id: b.id.clone(),
            name: b.name.clone(),
            address: b.address.clone(),
            website: b.website.clone(),
            tags: b.tags.join(", "),
        }
    }
}

pub async fn run(cmd: Commands, app: &App, format: Format) -> Result<()> {
    let store = app.store();

    match cmd {
        Commands::List => {
            let businesses = store.fetch_all_businesses().await?;
            output::print_items::<_, BusinessRow>(&businesses, format);
        }
        Commands::Search { text } => {
            let businesses = store.fetch_all_businesses().await?;
            let found = search_businesses(&businesses, &text);
            output::print_items::<_, BusinessRow>(&found, format);
        }
        Commands::Get { id } => {
            let business = store
                .fetch_business_by_id(&id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Business {id}")))?;
            output::print_item::<_, BusinessRow>(&business, format);
        }
        Commands::Save {
            name,
            address,
            description,
            website,
            tags,
            social_links,
            image,
        } => {
            let code = signed_in_code(app).await?;
            let draft = BusinessDraft {
                name,
                address,
                description,
                website,
                tags,
                social_links,
            };
            validate_business(&draft, app.geocoder()).await?;

            let existing = store.fetch_business_by_id(&code).await?;
            let image = match image {
                Some(path) => Some(upload_media(app, &path, "business").await?),
                None => existing.and_then(|b| b.image),
            };

            let saved = store
                .save_business(&draft.into_business(code, image))
                .await?;
            match format {
                Format::Json => output::print_json(&saved),
                Format::Table => {
                    output::print_success("Business profile saved");
                    output::print_table(vec![BusinessRow::from(&saved)]);
                }
            }
        }
        Commands::Delete => {
            let code = signed_in_code(app).await?;
            if let Some(image) = store
                .fetch_business_by_id(&code)
                .await?
                .and_then(|b| b.image)
            {
                store.delete_blob(&image).await;
            }
            store.delete_business(&code).await?;
            output::print_success("Business profile deleted");
        }
    }

    Ok(())
}
