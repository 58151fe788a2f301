//! Site pages as data documents.
//!
//! Each page path renders to a JSON document assembled from the content
//! gateway. Layout and presentation live in the front end.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::{
    content::data::{ContentGateway, HOME_FEATURED_LIMIT},
    types::{Locale, Project},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Page {
    Home,
    Projects,
    Project(String),
    Services,
    About,
}

/// A localized site page, e.g. `/en/projects/steel-bridge-x`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SitePath {
    pub locale: Locale,
    pub page: Page,
}

impl SitePath {
    pub fn new(locale: Locale, page: Page) -> Self {
        SitePath { locale, page }
    }

    pub fn to_path(&self) -> String {
        let locale = self.locale;
        match &self.page {
            Page::Home => format!("/{}", locale),
            Page::Projects => format!("/{}/projects", locale),
            Page::Project(slug) => format!("/{}/projects/{}", locale, slug),
            Page::Services => format!("/{}/services", locale),
            Page::About => format!("/{}/about", locale),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Alternates {
    pub tr: String,
    pub en: String,
}

#[derive(Serialize, Debug)]
#[serde(tag = "page", rename_all = "camelCase")]
pub enum PageDocument {
    #[serde(rename_all = "camelCase")]
    Home {
        locale: Locale,
        featured_projects: Vec<Project>,
    },
    Projects {
        locale: Locale,
        projects: Vec<Project>,
    },
    Project {
        locale: Locale,
        project: Box<Project>,
        alternates: Alternates,
    },
    Services {
        locale: Locale,
    },
    About {
        locale: Locale,
    },
}

/// Builds the document for `site_path`. `None` when the page's content does
/// not exist, i.e. an unknown project slug.
pub async fn render(gateway: &ContentGateway, site_path: &SitePath) -> Option<PageDocument> {
    let locale = site_path.locale;
    let document = match &site_path.page {
        Page::Home => PageDocument::Home {
            locale,
            featured_projects: gateway.featured_projects(locale, HOME_FEATURED_LIMIT).await,
        },
        Page::Projects => PageDocument::Projects {
            locale,
            projects: gateway.projects(locale).await,
        },
        Page::Project(slug) => {
            let project = gateway.project_by_slug(slug, locale).await?;
            PageDocument::Project {
                locale,
                project: Box::new(project),
                alternates: Alternates {
                    tr: SitePath::new(Locale::Tr, Page::Project(slug.clone())).to_path(),
                    en: SitePath::new(Locale::En, Page::Project(slug.clone())).to_path(),
                },
            }
        }
        Page::Services => PageDocument::Services { locale },
        Page::About => PageDocument::About { locale },
    };
    Some(document)
}

const SITEMAP_PAGES: [(&str, f32); 4] = [
    ("", 1.0),
    ("/about", 0.7),
    ("/projects", 0.7),
    ("/services", 0.7),
];

pub fn sitemap(site_url: &str) -> String {
    let lastmod = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for (path, priority) in SITEMAP_PAGES {
        for locale in Locale::ALL {
            xml.push_str(&format!(
                "  <url>\n    <loc>{}/{}{}</loc>\n    <lastmod>{}</lastmod>\n    \
                 <changefreq>weekly</changefreq>\n    <priority>{:.1}</priority>\n  </url>\n",
                site_url, locale, path, lastmod, priority
            ));
        }
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Renders listing and detail pages ahead of the first request.
pub async fn prerender(
    gateway: &ContentGateway,
    mut store: impl FnMut(&str, &PageDocument),
) -> usize {
    let mut targets: Vec<SitePath> = Locale::ALL
        .iter()
        .flat_map(|&locale| {
            [
                SitePath::new(locale, Page::Home),
                SitePath::new(locale, Page::Projects),
            ]
        })
        .collect();
    targets.extend(
        gateway
            .project_slugs()
            .await
            .into_iter()
            .map(|(locale, slug)| SitePath::new(locale, Page::Project(slug))),
    );

    let mut rendered = 0;
    for target in targets {
        if let Some(document) = render(gateway, &target).await {
            store(&target.to_path(), &document);
            rendered += 1;
        }
    }
    rendered
}
