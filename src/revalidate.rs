//! CMS change notifications → page invalidations.
//!
//! Planning which paths go stale is pure (`plan_invalidation`); the handlers
//! authenticate, plan, invalidate and acknowledge.

use actix_web::HttpResponse;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    auth::check_secret,
    content::{cache::PageInvalidator, contentful::PROJECT_CONTENT_TYPE},
    types::Locale,
};

/// Locale assumed when a notification carries none.
const DEFAULT_CONTENT_TAG: &str = "tr-TR";
/// Slug lookup order after the notification's own locale.
const SLUG_FALLBACK_TAGS: [&str; 2] = ["tr-TR", "en-US"];

/// Pages rebuilt by a manual revalidation without an explicit path.
pub const MAIN_PAGES: [&str; 8] = [
    "/tr",
    "/en",
    "/tr/projects",
    "/en/projects",
    "/tr/services",
    "/en/services",
    "/tr/about",
    "/en/about",
];

/// Webhook payload. Read leniently: any field that is missing or has an
/// unexpected shape counts as absent.
#[derive(Debug, Default)]
pub struct Notification(Value);

impl From<Value> for Notification {
    fn from(value: Value) -> Self {
        Notification(value)
    }
}

impl Notification {
    fn str_at(&self, pointer: &str) -> Option<&str> {
        self.0.pointer(pointer)?.as_str()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.str_at("/sys/contentType/sys/id")
    }

    pub fn entry_id(&self) -> Option<&str> {
        self.str_at("/sys/id")
    }

    pub fn content_tag(&self) -> &str {
        self.str_at("/sys/locale").unwrap_or(DEFAULT_CONTENT_TAG)
    }

    /// First non-empty slug among the notification locale, `tr-TR`, `en-US`.
    pub fn slug(&self) -> Option<&str> {
        let slugs = self.0.pointer("/fields/slug")?.as_object()?;
        std::iter::once(self.content_tag())
            .chain(SLUG_FALLBACK_TAGS)
            .find_map(|tag| slugs.get(tag)?.as_str().filter(|slug| !slug.is_empty()))
    }
}

/// Paths whose cached pages may show the changed entry.
pub fn plan_invalidation(notification: &Notification) -> Vec<String> {
    if notification.content_type() != Some(PROJECT_CONTENT_TYPE) {
        return Vec::new();
    }

    let mut paths: Vec<String> = Locale::ALL
        .iter()
        .map(|locale| format!("/{}/projects", locale))
        .chain(Locale::ALL.iter().map(|locale| format!("/{}", locale)))
        .collect();
    if let Some(slug) = notification.slug() {
        paths.extend(
            Locale::ALL
                .iter()
                .map(|locale| format!("/{}/projects/{}", locale, slug)),
        );
    }
    paths
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn invalid_secret() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({ "message": "Invalid secret" }))
}

fn revalidation_failed(error: impl std::fmt::Display) -> HttpResponse {
    tracing::error!("Revalidation error: {}", error);
    HttpResponse::InternalServerError().json(json!({
        "message": "Error revalidating",
        "error": error.to_string(),
    }))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Acknowledgement<'a> {
    revalidated: bool,
    message: &'static str,
    content_type: Option<&'a str>,
    entry_id: Option<&'a str>,
    timestamp: String,
}

/// Webhook entry point: secret header plus a raw JSON notification body.
pub fn handle_notification(
    expected_secret: Option<&str>,
    presented_secret: Option<&str>,
    body: &[u8],
    invalidator: &dyn PageInvalidator,
) -> HttpResponse {
    if check_secret(expected_secret, presented_secret).is_err() {
        return invalid_secret();
    }

    let notification = match serde_json::from_slice::<Value>(body) {
        Ok(value) => Notification::from(value),
        Err(error) => return revalidation_failed(error),
    };

    tracing::info!(
        content_type = ?notification.content_type(),
        entry_id = ?notification.entry_id(),
        locale = %Locale::from_content_tag(notification.content_tag()),
        "Revalidating"
    );

    for path in plan_invalidation(&notification) {
        invalidator.invalidate(&path);
    }

    HttpResponse::Ok().json(Acknowledgement {
        revalidated: true,
        message: "Revalidation triggered successfully",
        content_type: notification.content_type(),
        entry_id: notification.entry_id(),
        timestamp: timestamp(),
    })
}

#[derive(Deserialize, Debug, Default)]
pub struct ManualQuery {
    pub secret: Option<String>,
    pub path: Option<String>,
}

/// Manual entry point: `?secret=..&path=..`. No path rebuilds the main pages.
pub fn handle_manual(
    expected_secret: Option<&str>,
    query: &ManualQuery,
    invalidator: &dyn PageInvalidator,
) -> HttpResponse {
    if check_secret(expected_secret, query.secret.as_deref()).is_err() {
        return invalid_secret();
    }

    match query.path.as_deref().filter(|path| !path.is_empty()) {
        Some(path) => {
            tracing::info!(path, "Manual revalidation");
            invalidator.invalidate(path);
            HttpResponse::Ok().json(json!({
                "revalidated": true,
                "path": path,
                "timestamp": timestamp(),
            }))
        }
        None => {
            tracing::info!("Manual revalidation of all main pages");
            for path in MAIN_PAGES {
                invalidator.invalidate(path);
            }
            HttpResponse::Ok().json(json!({
                "revalidated": true,
                "message": "All pages revalidated",
                "timestamp": timestamp(),
            }))
        }
    }
}
