//! Form validation for the business profile and event editors.
//!
//! Every rule runs and all failures are reported together, so the person
//! filling the form sees the full list at once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{Business, Interest};
use crate::error::{AppError, Result};

pub const MAX_BUSINESS_NAME: usize = 50;
pub const MAX_DESCRIPTION: usize = 2500;
pub const MAX_BUSINESS_TAGS: usize = 200;
pub const MAX_SOCIAL_LINKS: usize = 500;
pub const MAX_EVENT_TITLE: usize = 100;
pub const MAX_EVENT_CAPTION: usize = 300;
pub const MAX_EVENT_LINK: usize = 200;

static DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?([\da-z.-]+)\.([a-z.]{2,6})([/\w .-]*)*/?$").expect("valid regex")
});
static SOCIAL_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://.+\..+").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Resolves a free-text address to coordinates. An empty result means the
/// address was not found; an error means the lookup itself failed.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Vec<Coordinates>>;
}

/// [`Geocoder`] backed by a Nominatim search endpoint.
#[derive(Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<Coordinates>> {
        debug!(address, "geocoding");
        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .header("User-Agent", concat!("whatson/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| AppError::remote(format!("geocoding request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::remote(format!(
                "geocoding failed with status {}",
                resp.status()
            )));
        }

        let places: Vec<NominatimPlace> = resp
            .json()
            .await
            .map_err(|e| AppError::remote(format!("failed to parse geocoding response: {e}")))?;

        Ok(places
            .iter()
            .filter_map(|p| {
                Some(Coordinates {
                    latitude: p.lat.parse().ok()?,
                    longitude: p.lon.parse().ok()?,
                })
            })
            .collect())
    }
}

/// Raw business profile form input.
#[derive(Debug, Clone, Default)]
pub struct BusinessDraft {
    pub name: String,
    pub address: String,
    pub description: String,
    pub website: String,
    /// Comma-separated.
    pub tags: String,
    /// Comma-separated.
    pub social_links: String,
}

impl BusinessDraft {
    /// Normalized listing for the given access code. Call after validation.
    pub fn into_business(self, id: impl Into<String>, image: Option<String>) -> Business {
        let mut business = Business::new(id, self.name.trim());
        business.address = self.address.trim().to_string();
        business.description = self.description.trim().to_string();
        business.website = Some(self.website.trim())
            .filter(|w| !w.is_empty())
            .map(format_website_url);
        business.tags = split_list(&self.tags);
        business.social_links = split_list(&self.social_links);
        business.image = image;
        business
    }
}

/// Raw event form input.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub caption: String,
    pub date: DateTime<Utc>,
    pub link: String,
    pub interests: Vec<Interest>,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn finish(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationFailed(errors))
    }
}

pub async fn validate_business(draft: &BusinessDraft, geocoder: &dyn Geocoder) -> Result<()> {
    let mut errors = Vec::new();

    let name = draft.name.trim();
    if name.is_empty() {
        errors.push("Business name is required".to_string());
    } else if char_len(name) > MAX_BUSINESS_NAME {
        errors.push(format!(
            "Business name must be {MAX_BUSINESS_NAME} characters or less"
        ));
    }

    let address = draft.address.trim();
    if address.is_empty() {
        errors.push("Address is required".to_string());
    } else {
        match geocoder.geocode(address).await {
            Ok(found) if found.is_empty() => {
                errors.push("Please enter a valid address that can be found on maps".to_string())
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "address lookup failed");
                errors.push(
                    "Unable to verify address. Please check your internet connection and try again"
                        .to_string(),
                );
            }
        }
    }

    let description = draft.description.trim();
    if description.is_empty() {
        errors.push("Business description is required".to_string());
    } else if char_len(description) > MAX_DESCRIPTION {
        errors.push("Description must be 2,500 characters or less".to_string());
    }

    let website = draft.website.trim();
    if website.is_empty() {
        errors.push("Website is required".to_string());
    } else if !DOMAIN.is_match(website) {
        errors.push(
            "Please enter a valid website (e.g., yourwebsite.com or https://yourwebsite.com)"
                .to_string(),
        );
    }

    if draft.tags.trim().is_empty() {
        errors.push("At least one tag is required".to_string());
    } else if char_len(&draft.tags) > MAX_BUSINESS_TAGS {
        errors.push(format!("Tags must be {MAX_BUSINESS_TAGS} characters or less"));
    }

    if !draft.social_links.trim().is_empty() {
        if char_len(&draft.social_links) > MAX_SOCIAL_LINKS {
            errors.push(format!(
                "Social links must be {MAX_SOCIAL_LINKS} characters or less"
            ));
        }
        if split_list(&draft.social_links)
            .iter()
            .any(|link| !SOCIAL_URL.is_match(link))
        {
            errors.push(
                "All social links must be valid URLs (e.g., https://facebook.com/yourpage)"
                    .to_string(),
            );
        }
    }

    finish(errors)
}

pub fn validate_event(draft: &EventDraft, now: DateTime<Utc>) -> Result<()> {
    let mut errors = Vec::new();

    let title = draft.title.trim();
    if title.is_empty() {
        errors.push("Event title is required".to_string());
    } else if char_len(title) > MAX_EVENT_TITLE {
        errors.push(format!(
            "Event title must be {MAX_EVENT_TITLE} characters or less"
        ));
    }

    if char_len(draft.caption.trim()) > MAX_EVENT_CAPTION {
        errors.push(format!(
            "Event description must be {MAX_EVENT_CAPTION} characters or less"
        ));
    }

    if draft.date <= now {
        errors.push("Event date must be in the future".to_string());
    }

    let link = draft.link.trim();
    if !link.is_empty() {
        if char_len(&draft.link) > MAX_EVENT_LINK {
            errors.push(format!(
                "Event link must be {MAX_EVENT_LINK} characters or less"
            ));
        }
        if !DOMAIN.is_match(link) {
            errors.push(
                "Event link must be a valid URL (e.g., tickets.com or https://tickets.com)"
                    .to_string(),
            );
        }
    }

    if draft.interests.is_empty() {
        errors.push("Please select at least one interest category for your event".to_string());
    }

    finish(errors)
}

/// Prefixes `https://` unless the value already carries an http(s) scheme.
pub fn format_website_url(website: &str) -> String {
    if website.is_empty() || website.starts_with("http://") || website.starts_with("https://") {
        website.to_string()
    } else {
        format!("https://{website}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_pattern() {
        for ok in [
            "yourwebsite.com",
            "https://cafe-x.com.au",
            "http://tickets.com/events/2031",
        ] {
            assert!(DOMAIN.is_match(ok), "{ok}");
        }
        for bad in ["not a site", "https://", "UPPER.COM", "cafe"] {
            assert!(!DOMAIN.is_match(bad), "{bad}");
        }
    }

    #[test]
    fn website_formatting() {
        assert_eq!(format_website_url("cafex.com"), "https://cafex.com");
        assert_eq!(format_website_url("http://cafex.com"), "http://cafex.com");
        assert_eq!(format_website_url(""), "");
    }

    #[test]
    fn draft_normalizes_lists() {
        let draft = BusinessDraft {
            name: " Cafe X ".into(),
            website: "cafex.com".into(),
            tags: "Food, Coffee ,,".into(),
            social_links: "https://instagram.com/cafex, ".into(),
            ..Default::default()
        };
        let business = draft.into_business("B1", None);
        assert_eq!(business.name, "Cafe X");
        assert_eq!(business.website.as_deref(), Some("https://cafex.com"));
        assert_eq!(business.tags, vec!["Food", "Coffee"]);
        assert_eq!(business.social_links, vec!["https://instagram.com/cafex"]);
    }
}
