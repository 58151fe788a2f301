//! Contentful Delivery API access.
//!
//! `ContentSource` is the seam the gateway fetches through. `ContentfulClient`
//! implements it over awc with one GET per query; tests substitute an
//! in-memory source.

use std::collections::HashMap;

use async_trait::async_trait;
use awc::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{error::ContentError, settings::ContentfulSettings, types::Locale};

pub const PROJECT_CONTENT_TYPE: &str = "project";

/// Linked assets are resolved two levels deep.
const INCLUDE_DEPTH: u8 = 2;
const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// One project query against the CMS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryQuery {
    pub locale: Locale,
    pub featured_only: bool,
    pub slug: Option<String>,
    pub limit: Option<usize>,
    pub newest_first: bool,
}

impl EntryQuery {
    pub fn projects(locale: Locale) -> Self {
        EntryQuery {
            locale,
            featured_only: false,
            slug: None,
            limit: None,
            newest_first: true,
        }
    }

    pub fn featured(locale: Locale, limit: usize) -> Self {
        EntryQuery {
            featured_only: true,
            limit: Some(limit),
            ..Self::projects(locale)
        }
    }

    pub fn by_slug(slug: &str, locale: Locale) -> Self {
        EntryQuery {
            slug: Some(slug.to_string()),
            limit: Some(1),
            newest_first: false,
            ..Self::projects(locale)
        }
    }

    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("content_type", PROJECT_CONTENT_TYPE.to_string()),
            ("locale", self.locale.content_tag().to_string()),
            ("include", INCLUDE_DEPTH.to_string()),
        ];
        if self.newest_first {
            params.push(("order", "-fields.year".to_string()));
        }
        if self.featured_only {
            params.push(("fields.featured", "true".to_string()));
        }
        if let Some(slug) = &self.slug {
            params.push(("fields.slug", slug.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

/// Entries response: raw items plus the linked assets they reference.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EntryCollection {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub includes: Includes,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Includes {
    #[serde(rename = "Asset", default)]
    pub assets: Vec<Value>,
}

impl EntryCollection {
    /// Asset bodies keyed by `sys.id`.
    pub fn asset_index(&self) -> HashMap<&str, &Value> {
        self.includes
            .assets
            .iter()
            .filter_map(|asset| {
                let id = asset.pointer("/sys/id")?.as_str()?;
                Some((id, asset))
            })
            .collect()
    }
}

#[async_trait(?Send)]
pub trait ContentSource: Send + Sync {
    async fn fetch_entries(&self, query: &EntryQuery) -> Result<EntryCollection, ContentError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

pub struct ContentfulClient {
    settings: ContentfulSettings,
}

impl ContentfulClient {
    pub fn new(settings: ContentfulSettings) -> Self {
        ContentfulClient { settings }
    }

    pub fn entries_url(&self) -> String {
        format!(
            "https://{}/spaces/{}/environments/{}/entries",
            self.settings.host(),
            self.settings.space_id,
            self.settings.environment
        )
    }
}

#[async_trait(?Send)]
impl ContentSource for ContentfulClient {
    async fn fetch_entries(&self, query: &EntryQuery) -> Result<EntryCollection, ContentError> {
        let client = Client::default();
        let request = client
            .get(self.entries_url())
            .bearer_auth(self.settings.token())
            .query(&query.to_params())
            .map_err(|error| ContentError::Request(error.to_string()))?;

        let mut response = request
            .send()
            .await
            .map_err(|error| ContentError::Request(error.to_string()))?;
        let body = response
            .body()
            .limit(MAX_RESPONSE_BYTES)
            .await
            .map_err(|error| ContentError::Payload(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .map(|error| error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(ContentError::Status {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(
            locale = %query.locale,
            bytes = body.len(),
            "Fetched project entries"
        );
        Ok(serde_json::from_slice::<EntryCollection>(&body)?)
    }
}
