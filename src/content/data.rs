//! Content gateway: CMS entries in, `Project` records out.
//!
//! Every read degrades to an empty result when the backend is missing or
//! failing, so page rendering never fails on content.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use chrono::{Datelike, Local};
use serde::Deserialize;
use serde_json::Value;

use super::contentful::{ContentSource, ContentfulClient, EntryCollection, EntryQuery};
use crate::{
    error::ContentError,
    settings::Settings,
    types::{ImageRef, Locale, Project, ProjectCategory},
};

/// Featured projects shown on the home page.
pub const HOME_FEATURED_LIMIT: usize = 3;

#[derive(Deserialize, Debug)]
struct RawEntry {
    sys: RawSys,
    #[serde(default)]
    fields: RawProjectFields,
}

#[derive(Deserialize, Debug)]
struct RawSys {
    id: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawProjectFields {
    title: Option<String>,
    slug: Option<String>,
    description: Option<Value>,
    short_description: Option<String>,
    featured_image: Option<Value>,
    gallery: Option<Vec<Value>>,
    client: Option<String>,
    location: Option<String>,
    year: Option<i32>,
    category: Option<String>,
    featured: Option<bool>,
    seo_title: Option<String>,
    seo_description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawAssetFields {
    title: Option<String>,
    file: Option<RawFile>,
}

#[derive(Deserialize, Debug)]
struct RawFile {
    url: Option<String>,
    details: Option<RawFileDetails>,
}

#[derive(Deserialize, Debug)]
struct RawFileDetails {
    image: Option<RawImageDetails>,
}

#[derive(Deserialize, Debug)]
struct RawImageDetails {
    width: Option<u32>,
    height: Option<u32>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Resolves an asset link (or an already-embedded asset) to an image.
/// Assets without a file payload, and links missing from `includes`, are
/// absent.
fn transform_asset(link: &Value, assets: &HashMap<&str, &Value>) -> Option<ImageRef> {
    let asset = match link.get("fields") {
        Some(_) => link,
        None => {
            let id = link.pointer("/sys/id")?.as_str()?;
            assets.get(id).copied()?
        }
    };
    let fields: RawAssetFields = serde_json::from_value(asset.get("fields")?.clone()).ok()?;
    let file = fields.file?;
    let url = file.url.filter(|url| !url.is_empty())?;
    let image = file.details.and_then(|details| details.image);

    Some(ImageRef {
        url: if url.starts_with("//") {
            format!("https:{}", url)
        } else {
            url
        },
        title: fields.title.unwrap_or_default(),
        width: image.as_ref().and_then(|i| i.width).unwrap_or(0),
        height: image.as_ref().and_then(|i| i.height).unwrap_or(0),
    })
}

fn transform_project(
    entry: &Value,
    assets: &HashMap<&str, &Value>,
    locale: Locale,
    current_year: i32,
) -> Result<Project, serde_json::Error> {
    let RawEntry { sys, fields } = RawEntry::deserialize(entry)?;
    let category = ProjectCategory::normalize(fields.category.as_deref());

    let title = non_empty(fields.title).unwrap_or_default();
    let short_description = non_empty(fields.short_description).unwrap_or_default();

    Ok(Project {
        id: sys.id,
        slug: non_empty(fields.slug).unwrap_or_default(),
        description: fields.description.filter(|d| !d.is_null()),
        featured_image: fields
            .featured_image
            .as_ref()
            .and_then(|link| transform_asset(link, assets)),
        gallery: fields
            .gallery
            .unwrap_or_default()
            .iter()
            .filter_map(|link| transform_asset(link, assets))
            .collect(),
        client: non_empty(fields.client).unwrap_or_default(),
        location: non_empty(fields.location).unwrap_or_default(),
        year: fields.year.filter(|year| *year != 0).unwrap_or(current_year),
        category,
        category_label: category.label(locale).to_string(),
        featured: fields.featured.unwrap_or(false),
        seo_title: non_empty(fields.seo_title).unwrap_or_else(|| title.clone()),
        seo_description: non_empty(fields.seo_description)
            .unwrap_or_else(|| short_description.clone()),
        title,
        short_description,
    })
}

/// Normalizes every entry of a response. Malformed entries are dropped
/// whole.
pub fn transform_collection(collection: &EntryCollection, locale: Locale) -> Vec<Project> {
    let assets = collection.asset_index();
    let current_year = Local::now().year();

    collection
        .items
        .iter()
        .filter_map(
            |entry| match transform_project(entry, &assets, locale, current_year) {
                Ok(project) => Some(project),
                Err(error) => {
                    let id = entry.pointer("/sys/id").and_then(Value::as_str);
                    tracing::warn!(entry = ?id, "Skipping malformed project entry: {}", error);
                    None
                }
            },
        )
        .collect()
}

fn newest_first(projects: &mut [Project]) {
    projects.sort_by(|a, b| b.year.cmp(&a.year));
}

/// Read access to projects. Clones share the source and the warn-once
/// state.
#[derive(Clone)]
pub struct ContentGateway {
    source: Option<Arc<dyn ContentSource>>,
    /// Set the first time a read finds no credentials; never reset for the
    /// life of the process.
    warned_missing: Arc<AtomicBool>,
}

impl ContentGateway {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        ContentGateway {
            source: Some(source),
            warned_missing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn unconfigured() -> Self {
        ContentGateway {
            source: None,
            warned_missing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        match &settings.contentful {
            Some(contentful) => Self::new(Arc::new(ContentfulClient::new(contentful.clone()))),
            None => Self::unconfigured(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.source.is_some()
    }

    fn source(&self) -> Option<&dyn ContentSource> {
        if self.source.is_none() && !self.warned_missing.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "Contentful credentials are missing. Add CONTENTFUL_SPACE_ID, \
                 CONTENTFUL_ACCESS_TOKEN, CONTENTFUL_PREVIEW_TOKEN to your .env file."
            );
        }
        self.source.as_deref()
    }

    async fn fetch(&self, query: &EntryQuery) -> Result<Vec<Project>, ContentError> {
        let source = self.source().ok_or(ContentError::NotConfigured)?;
        let collection = source.fetch_entries(query).await?;
        Ok(transform_collection(&collection, query.locale))
    }

    /// All projects, newest year first.
    pub async fn projects(&self, locale: Locale) -> Vec<Project> {
        match self.fetch(&EntryQuery::projects(locale)).await {
            Ok(mut projects) => {
                newest_first(&mut projects);
                projects
            }
            Err(ContentError::NotConfigured) => Vec::new(),
            Err(error) => {
                tracing::error!(%locale, "Error fetching projects: {}", error);
                Vec::new()
            }
        }
    }

    /// At most `limit` featured projects, newest year first.
    pub async fn featured_projects(&self, locale: Locale, limit: usize) -> Vec<Project> {
        match self.fetch(&EntryQuery::featured(locale, limit)).await {
            Ok(projects) => {
                let mut projects: Vec<Project> =
                    projects.into_iter().filter(|p| p.featured).collect();
                newest_first(&mut projects);
                projects.truncate(limit);
                projects
            }
            Err(ContentError::NotConfigured) => Vec::new(),
            Err(error) => {
                tracing::error!(%locale, "Error fetching featured projects: {}", error);
                Vec::new()
            }
        }
    }

    pub async fn project_by_slug(&self, slug: &str, locale: Locale) -> Option<Project> {
        match self.fetch(&EntryQuery::by_slug(slug, locale)).await {
            Ok(projects) => projects.into_iter().find(|project| project.slug == slug),
            Err(ContentError::NotConfigured) => None,
            Err(error) => {
                tracing::error!(%locale, slug, "Error fetching project: {}", error);
                None
            }
        }
    }

    /// Every (locale, slug) pair, for prerendering detail pages.
    pub async fn project_slugs(&self) -> Vec<(Locale, String)> {
        let mut slugs = Vec::new();
        for locale in Locale::ALL {
            for project in self.projects(locale).await {
                if !project.slug.is_empty() {
                    slugs.push((locale, project.slug));
                }
            }
        }
        slugs
    }

    #[cfg(test)]
    pub fn warned_missing(&self) -> bool {
        self.warned_missing.load(Ordering::Relaxed)
    }
}
