use std::{env, time::Duration};

const DEFAULT_SITE_URL: &str = "https://celikon-yapi.vercel.app";
const DEFAULT_CONTACT_FROM: &str = "Celikon İletişim <onboarding@resend.dev>";
const DEFAULT_CONTACT_TO: &str = "info@celikon.com";

/// Contentful space access. Present only when the space id and the delivery
/// token are both set.
#[derive(Clone, Debug)]
pub struct ContentfulSettings {
    pub space_id: String,
    pub access_token: String,
    pub preview_token: Option<String>,
    pub environment: String,
    pub use_preview: bool,
}

impl ContentfulSettings {
    pub fn host(&self) -> &'static str {
        if self.preview_active() {
            "preview.contentful.com"
        } else {
            "cdn.contentful.com"
        }
    }

    pub fn token(&self) -> &str {
        match &self.preview_token {
            Some(token) if self.use_preview => token,
            _ => &self.access_token,
        }
    }

    fn preview_active(&self) -> bool {
        self.use_preview && self.preview_token.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct MailSettings {
    pub api_key: Option<String>,
    pub from: String,
    pub to: String,
}

/// Process configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub contentful: Option<ContentfulSettings>,
    pub revalidate_secret: Option<String>,
    pub mail: MailSettings,
    pub site_url: String,
    /// Seconds a rendered page stays fresh (default: 3600)
    pub page_revalidate_seconds: u64,
    /// Rendered pages kept before LRU eviction (default: 512)
    pub page_cache_max_entries: usize,
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// Contentful: `CONTENTFUL_SPACE_ID`, `CONTENTFUL_ACCESS_TOKEN`,
    /// `CONTENTFUL_PREVIEW_TOKEN`, `CONTENTFUL_ENVIRONMENT` (default "master"),
    /// `CONTENTFUL_USE_PREVIEW`. Webhook: `CONTENTFUL_REVALIDATE_SECRET`.
    /// Contact: `RESEND_API_KEY`, `CONTACT_FROM`, `CONTACT_TO`.
    /// Site: `SITE_URL`, `PAGE_REVALIDATE_SECONDS`, `PAGE_CACHE_MAX_ENTRIES`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let contentful = match (var("CONTENTFUL_SPACE_ID"), var("CONTENTFUL_ACCESS_TOKEN")) {
            (Some(space_id), Some(access_token)) => Some(ContentfulSettings {
                space_id,
                access_token,
                preview_token: var("CONTENTFUL_PREVIEW_TOKEN"),
                environment: var("CONTENTFUL_ENVIRONMENT").unwrap_or_else(|| "master".to_string()),
                use_preview: var("CONTENTFUL_USE_PREVIEW")
                    .is_some_and(|value| matches!(value.as_str(), "1" | "true" | "yes")),
            }),
            _ => None,
        };

        Self {
            contentful,
            revalidate_secret: var("CONTENTFUL_REVALIDATE_SECRET"),
            mail: MailSettings {
                api_key: var("RESEND_API_KEY"),
                from: var("CONTACT_FROM").unwrap_or_else(|| DEFAULT_CONTACT_FROM.to_string()),
                to: var("CONTACT_TO").unwrap_or_else(|| DEFAULT_CONTACT_TO.to_string()),
            },
            site_url: var("SITE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
            page_revalidate_seconds: var("PAGE_REVALIDATE_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            page_cache_max_entries: var("PAGE_CACHE_MAX_ENTRIES")
                .and_then(|v| v.parse().ok())
                .filter(|max| *max > 0)
                .unwrap_or(512),
        }
    }

    pub fn page_ttl(&self) -> Duration {
        Duration::from_secs(self.page_revalidate_seconds)
    }
}
