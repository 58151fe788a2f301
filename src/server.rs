use std::{io::Result, num::NonZeroUsize, sync::Arc};

use actix_cors::Cors;
use actix_web::{
    http::header::{self, ContentType},
    middleware::{Logger, NormalizePath},
    web::{self, resource, scope, Bytes, Path, Query},
    App, HttpRequest, HttpResponse, HttpServer,
};
use serde_json::json;

use crate::{
    auth::SECRET_HEADER,
    contact::{self, Mailer, ResendMailer},
    content::{cache::PageCache, data::ContentGateway},
    pages::{self, Page, SitePath},
    revalidate::{self, ManualQuery},
    settings::Settings,
    types::Locale,
};

/// Shared state handed to every worker.
#[derive(Clone)]
pub struct AppState {
    pub gateway: ContentGateway,
    pub pages: Arc<PageCache>,
    pub mailer: Arc<dyn Mailer>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn from_settings(settings: Settings) -> Self {
        let max_entries =
            NonZeroUsize::new(settings.page_cache_max_entries).unwrap_or(NonZeroUsize::MIN);
        AppState {
            gateway: ContentGateway::from_settings(&settings),
            pages: Arc::new(PageCache::new(max_entries, settings.page_ttl())),
            mailer: Arc::new(ResendMailer::new(settings.mail.api_key.clone())),
            settings: Arc::new(settings),
        }
    }
}

pub async fn start_server(addr: String, state: AppState) -> Result<()> {
    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(routes)
            .wrap(NormalizePath::trim())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_header()
                    .allow_any_method(),
            )
            .wrap(Logger::default())
    })
    .bind(&addr)?
    .run()
    .await
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(resource("/health").route(web::get().to(status_handler)))
        .service(resource("/sitemap.xml").route(web::get().to(sitemap_handler)))
        .service(
            scope("/api")
                .service(
                    resource("/revalidate")
                        .route(web::post().to(revalidate_handler))
                        .route(web::get().to(manual_revalidate_handler)),
                )
                .service(resource("/contact").route(web::post().to(contact_handler))),
        )
        .service(resource("/").route(web::get().to(root_handler)))
        .service(resource("/{locale}").route(web::get().to(home_handler)))
        .service(resource("/{locale}/projects").route(web::get().to(projects_handler)))
        .service(resource("/{locale}/projects/{slug}").route(web::get().to(project_handler)))
        .service(resource("/{locale}/services").route(web::get().to(services_handler)))
        .service(resource("/{locale}/about").route(web::get().to(about_handler)));
}

/// Renders listing and detail pages in the background so the first visitors
/// hit a warm cache.
pub fn spawn_cache_warmup(state: AppState) {
    actix_web::rt::spawn(async move {
        let cache = state.pages.clone();
        let generation = cache.generation();
        let rendered = pages::prerender(&state.gateway, |path, document| {
            match serde_json::to_string(document) {
                Ok(body) => {
                    cache.put(path, body, generation);
                }
                Err(error) => tracing::error!(path, "Failed to serialize page: {}", error),
            }
        })
        .await;
        tracing::info!(pages = rendered, cached = cache.len(), "Page cache warmed");
    });
}

fn not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "message": message }))
}

fn page_response(body: String, cache_status: &'static str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::json())
        .insert_header(("x-cache", cache_status))
        .body(body)
}

async fn serve_page(state: &AppState, locale: &str, page: Page) -> HttpResponse {
    let Some(locale) = Locale::from_code(locale) else {
        return not_found("Page not found");
    };
    let site_path = SitePath::new(locale, page);
    let path = site_path.to_path();

    if let Some(body) = state.pages.get(&path) {
        return page_response(body, "HIT");
    }

    let generation = state.pages.generation();
    match pages::render(&state.gateway, &site_path).await {
        Some(document) => match serde_json::to_string(&document) {
            Ok(body) => {
                state.pages.put(&path, body.clone(), generation);
                page_response(body, "MISS")
            }
            Err(error) => {
                tracing::error!(path = %path, "Failed to serialize page: {}", error);
                HttpResponse::InternalServerError().json(json!({ "message": "Failed to render page" }))
            }
        },
        None => not_found("Project not found"),
    }
}

async fn root_handler() -> HttpResponse {
    HttpResponse::PermanentRedirect()
        .insert_header((header::LOCATION, format!("/{}", Locale::default())))
        .finish()
}

async fn home_handler(locale: Path<String>, state: web::Data<AppState>) -> HttpResponse {
    serve_page(&state, &locale, Page::Home).await
}

async fn projects_handler(locale: Path<String>, state: web::Data<AppState>) -> HttpResponse {
    serve_page(&state, &locale, Page::Projects).await
}

async fn project_handler(path: Path<(String, String)>, state: web::Data<AppState>) -> HttpResponse {
    let (locale, slug) = path.into_inner();
    serve_page(&state, &locale, Page::Project(slug)).await
}

async fn services_handler(locale: Path<String>, state: web::Data<AppState>) -> HttpResponse {
    serve_page(&state, &locale, Page::Services).await
}

async fn about_handler(locale: Path<String>, state: web::Data<AppState>) -> HttpResponse {
    serve_page(&state, &locale, Page::About).await
}

async fn revalidate_handler(
    request: HttpRequest,
    body: Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    let presented = request
        .headers()
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    revalidate::handle_notification(
        state.settings.revalidate_secret.as_deref(),
        presented,
        &body,
        state.pages.as_ref(),
    )
}

async fn manual_revalidate_handler(
    query: Query<ManualQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    revalidate::handle_manual(
        state.settings.revalidate_secret.as_deref(),
        &query,
        state.pages.as_ref(),
    )
}

async fn contact_handler(body: Bytes, state: web::Data<AppState>) -> HttpResponse {
    contact::relay(&body, &state.settings.mail, state.mailer.as_ref()).await
}

async fn sitemap_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::xml())
        .body(pages::sitemap(&state.settings.site_url))
}

async fn status_handler() -> HttpResponse {
    HttpResponse::Ok().body("celikon is running")
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use actix_web::{body::to_bytes, http::StatusCode, rt, test};
    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::{
        contact::tests::RecordingMailer,
        content::{
            cache::PageInvalidator,
            contentful::{ContentSource, EntryCollection, EntryQuery, Includes},
            data::tests::{project_entry, FakeSource},
        },
        error::ContentError,
        settings::MailSettings,
    };

    const SECRET: &str = "s3cret";

    fn state_with(gateway: ContentGateway) -> AppState {
        let settings = Settings {
            contentful: None,
            revalidate_secret: Some(SECRET.to_string()),
            mail: MailSettings {
                api_key: None,
                from: "Site <site@example.com>".to_string(),
                to: "info@example.com".to_string(),
            },
            site_url: "https://example.com".to_string(),
            page_revalidate_seconds: 3600,
            page_cache_max_entries: 64,
        };
        AppState {
            gateway,
            pages: Arc::new(PageCache::new(
                NonZeroUsize::new(64).unwrap(),
                Duration::from_secs(3600),
            )),
            mailer: Arc::new(RecordingMailer::default()),
            settings: Arc::new(settings),
        }
    }

    fn state() -> AppState {
        state_with(ContentGateway::new(Arc::new(FakeSource::new(vec![
            project_entry("a", "steel-bridge-x", 2022, true),
            project_entry("b", "depo-y", 2020, false),
        ]))))
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .configure(routes)
                    .wrap(NormalizePath::trim()),
            )
            .await
        };
    }

    fn warm(state: &AppState, paths: &[&str]) {
        for path in paths {
            state.pages.put(path, "{}".to_string(), state.pages.generation());
        }
    }

    /// Reads the current title, then stalls like a slow CMS round trip.
    struct SlowSource {
        title: Mutex<String>,
    }

    #[async_trait(?Send)]
    impl ContentSource for SlowSource {
        async fn fetch_entries(
            &self,
            _query: &EntryQuery,
        ) -> std::result::Result<EntryCollection, ContentError> {
            let title = self.title.lock().unwrap().clone();
            rt::time::sleep(Duration::from_millis(100)).await;
            let mut entry = project_entry("a", "steel-bridge-x", 2022, true);
            entry["fields"]["title"] = json!(title);
            Ok(EntryCollection {
                items: vec![entry],
                includes: Includes::default(),
            })
        }
    }

    #[actix_web::test]
    async fn test_root_redirects_to_default_locale() {
        let app = app!(state());
        let response = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/tr");
    }

    #[actix_web::test]
    async fn test_page_is_cached_after_first_render() {
        let state = state();
        let app = app!(state.clone());

        let request = test::TestRequest::get().uri("/en/projects").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-cache").unwrap(), "MISS");
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["projects"].as_array().unwrap().len(), 2);

        let request = test::TestRequest::get().uri("/en/projects/").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.headers().get("x-cache").unwrap(), "HIT");
        assert!(state.pages.contains("/en/projects"));
    }

    #[actix_web::test]
    async fn test_invalidation_during_render_is_not_lost() {
        let source = Arc::new(SlowSource {
            title: Mutex::new("old".to_string()),
        });
        let state = state_with(ContentGateway::new(source.clone()));

        let pending = rt::spawn({
            let state = state.clone();
            async move { serve_page(&state, "en", Page::Projects).await.status() }
        });
        rt::time::sleep(Duration::from_millis(20)).await;
        *source.title.lock().unwrap() = "new".to_string();
        state.pages.invalidate("/en/projects");

        assert_eq!(pending.await.unwrap(), StatusCode::OK);
        assert_eq!(state.pages.get("/en/projects"), None);

        let response = serve_page(&state, "en", Page::Projects).await;
        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body()).await.unwrap()).unwrap();
        assert_eq!(body["projects"][0]["title"], "new");
        assert!(state.pages.get("/en/projects").unwrap().contains("\"new\""));
    }

    #[actix_web::test]
    async fn test_missing_project_and_unknown_locale() {
        let state = state();
        let app = app!(state.clone());

        let request = test::TestRequest::get().uri("/tr/projects/nope").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["message"], "Project not found");
        assert!(!state.pages.contains("/tr/projects/nope"));

        let request = test::TestRequest::get().uri("/de/projects").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_project_detail_page() {
        let app = app!(state());
        let request = test::TestRequest::get()
            .uri("/en/projects/steel-bridge-x")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["page"], "project");
        assert_eq!(body["project"]["slug"], "steel-bridge-x");
        assert_eq!(body["project"]["categoryLabel"], "Bridge");
    }

    #[actix_web::test]
    async fn test_pages_render_empty_without_backend() {
        let app = app!(state_with(ContentGateway::unconfigured()));

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/tr").to_request(),
        )
        .await;
        assert_eq!(body["featuredProjects"], json!([]));

        let request = test::TestRequest::get().uri("/tr/projects/x").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_webhook_invalidates_project_pages_only() {
        let state = state();
        let app = app!(state.clone());
        warm(
            &state,
            &[
                "/tr",
                "/en",
                "/tr/projects",
                "/en/projects",
                "/tr/projects/steel-bridge-x",
                "/en/projects/steel-bridge-x",
                "/en/projects/depo-y",
                "/tr/about",
            ],
        );

        let request = test::TestRequest::post()
            .uri("/api/revalidate")
            .insert_header((SECRET_HEADER, SECRET))
            .set_json(json!({
                "sys": {
                    "contentType": { "sys": { "id": "project" } },
                    "id": "a",
                    "locale": "en-US"
                },
                "fields": { "slug": { "en-US": "steel-bridge-x" } }
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["revalidated"], true);
        assert_eq!(body["entryId"], "a");

        assert_eq!(state.pages.len(), 2);
        assert!(state.pages.contains("/en/projects/depo-y"));
        assert!(state.pages.contains("/tr/about"));
    }

    #[actix_web::test]
    async fn test_webhook_with_wrong_secret_keeps_cache() {
        let state = state();
        let app = app!(state.clone());
        warm(&state, &["/tr", "/en/projects"]);

        let request = test::TestRequest::post()
            .uri("/api/revalidate")
            .insert_header((SECRET_HEADER, "guess"))
            .set_json(json!({ "sys": { "contentType": { "sys": { "id": "project" } } } }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(state.pages.len(), 2);
    }

    #[actix_web::test]
    async fn test_manual_revalidation_clears_main_pages() {
        let state = state();
        let app = app!(state.clone());
        warm(
            &state,
            &["/tr", "/en/services", "/tr/about", "/en/projects/depo-y"],
        );

        let request = test::TestRequest::get()
            .uri("/api/revalidate?secret=s3cret")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["message"], "All pages revalidated");
        assert_eq!(state.pages.len(), 1);
        assert!(state.pages.contains("/en/projects/depo-y"));

        let request = test::TestRequest::get()
            .uri("/api/revalidate?secret=s3cret&path=/en/projects/depo-y/")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.pages.is_empty());
    }

    #[actix_web::test]
    async fn test_contact_route() {
        let app = app!(state());
        let request = test::TestRequest::post()
            .uri("/api/contact")
            .set_json(json!({ "name": "Ali", "email": "not-an-email", "subject": "S", "message": "M" }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["error"], "Invalid email format");

        let request = test::TestRequest::post()
            .uri("/api/contact")
            .set_json(json!({ "name": "Ali", "email": "ali@example.com", "subject": "S", "message": "M" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
    }

    #[actix_web::test]
    async fn test_sitemap_and_health() {
        let app = app!(state());

        let request = test::TestRequest::get().uri("/sitemap.xml").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = test::read_body(response).await;
        let xml = String::from_utf8(body.to_vec()).unwrap();
        assert!(xml.contains("<loc>https://example.com/en/about</loc>"));

        let request = test::TestRequest::get().uri("/health").to_request();
        let body = test::call_and_read_body(&app, request).await;
        assert_eq!(body, Bytes::from_static(b"celikon is running"));
    }
}
