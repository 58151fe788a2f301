use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Site locale, as it appears in the first path segment.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Tr,
    En,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::Tr, Locale::En];

    pub fn as_str(self) -> &'static str {
        match self {
            Locale::Tr => "tr",
            Locale::En => "en",
        }
    }

    /// CMS locale tag used when querying localized field values.
    pub fn content_tag(self) -> &'static str {
        match self {
            Locale::Tr => "tr-TR",
            Locale::En => "en-US",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "tr" => Some(Locale::Tr),
            "en" => Some(Locale::En),
            _ => None,
        }
    }

    /// Maps a CMS locale tag to a site locale. Only `tr-TR` is Turkish.
    pub fn from_content_tag(tag: &str) -> Self {
        if tag == Locale::Tr.content_tag() {
            Locale::Tr
        } else {
            Locale::En
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProjectCategory {
    #[serde(rename = "depo")]
    Warehouse,
    #[serde(rename = "köprü")]
    Bridge,
    #[serde(rename = "fabrika")]
    Factory,
    #[serde(rename = "restorasyon")]
    Restoration,
    #[serde(rename = "diğer")]
    Other,
}

impl ProjectCategory {
    /// Maps a raw CMS category to the fixed set. Unknown or missing values
    /// become `Other`.
    pub fn normalize(raw: Option<&str>) -> Self {
        let value = raw.unwrap_or_default().trim().to_lowercase();
        match value.as_str() {
            "depo" => ProjectCategory::Warehouse,
            "köprü" | "kopru" => ProjectCategory::Bridge,
            "fabrika" => ProjectCategory::Factory,
            "restorasyon" | "restoration" => ProjectCategory::Restoration,
            "diğer" | "diger" => ProjectCategory::Other,
            _ => ProjectCategory::Other,
        }
    }

    pub fn label(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (ProjectCategory::Warehouse, Locale::Tr) => "Depo",
            (ProjectCategory::Warehouse, Locale::En) => "Warehouse",
            (ProjectCategory::Bridge, Locale::Tr) => "Köprü",
            (ProjectCategory::Bridge, Locale::En) => "Bridge",
            (ProjectCategory::Factory, Locale::Tr) => "Fabrika",
            (ProjectCategory::Factory, Locale::En) => "Factory",
            (ProjectCategory::Restoration, Locale::Tr) => "Restorasyon",
            (ProjectCategory::Restoration, Locale::En) => "Restoration",
            (ProjectCategory::Other, Locale::Tr) => "Diğer",
            (ProjectCategory::Other, Locale::En) => "Other",
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ImageRef {
    pub url: String,
    pub title: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<Value>,
    pub short_description: String,
    pub featured_image: Option<ImageRef>,
    pub gallery: Vec<ImageRef>,
    pub client: String,
    pub location: String,
    pub year: i32,
    pub category: ProjectCategory,
    pub category_label: String,
    pub featured: bool,
    pub seo_title: String,
    pub seo_description: String,
}
