//! Contact form relay through the Resend HTTP API.

use std::sync::OnceLock;

use actix_web::HttpResponse;
use async_trait::async_trait;
use awc::Client;
use maud::{html, Markup};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{error::MailError, settings::MailSettings};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Deserialize, Debug, Default)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// A contact request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactRejection {
    InvalidBody,
    MissingFields,
    InvalidEmail,
}

impl ContactRejection {
    pub fn message(self) -> &'static str {
        match self {
            ContactRejection::InvalidBody => "Invalid request body",
            ContactRejection::MissingFields => "Missing required fields",
            ContactRejection::InvalidEmail => "Invalid email format",
        }
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"))
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ContactRequest {
    pub fn validate(self) -> Result<ContactMessage, ContactRejection> {
        let (Some(name), Some(email), Some(subject), Some(message)) = (
            required(self.name),
            required(self.email),
            required(self.subject),
            required(self.message),
        ) else {
            return Err(ContactRejection::MissingFields);
        };
        if !email_pattern().is_match(&email) {
            return Err(ContactRejection::InvalidEmail);
        }
        Ok(ContactMessage {
            name,
            email,
            phone: required(self.phone),
            subject,
            message,
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub reply_to: String,
    pub subject: String,
    pub html: String,
}

fn render_body(contact: &ContactMessage) -> Markup {
    html! {
        div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;" {
            h2 style="color: #1f2937; border-bottom: 3px solid #fbbf24; padding-bottom: 10px;" {
                "Yeni İletişim Formu Mesajı"
            }
            div style="margin: 20px 0;" {
                p style="margin: 10px 0;" { strong { "İsim:" } " " (contact.name) }
                p style="margin: 10px 0;" { strong { "E-posta:" } " " (contact.email) }
                @if let Some(phone) = &contact.phone {
                    p style="margin: 10px 0;" { strong { "Telefon:" } " " (phone) }
                }
                p style="margin: 10px 0;" { strong { "Konu:" } " " (contact.subject) }
            }
            div style="background-color: #f9fafb; padding: 20px; border-radius: 8px; margin: 20px 0;" {
                p style="margin: 0; white-space: pre-wrap;" { strong { "Mesaj:" } }
                p style="margin: 10px 0 0 0; white-space: pre-wrap;" { (contact.message) }
            }
            div style="margin-top: 30px; padding-top: 20px; border-top: 1px solid #e5e7eb; color: #6b7280; font-size: 12px;" {
                p { "Bu mesaj Celikon İnşaat web sitesi iletişim formu üzerinden gönderilmiştir." }
            }
        }
    }
}

pub fn compose(contact: &ContactMessage, settings: &MailSettings) -> OutgoingEmail {
    OutgoingEmail {
        from: settings.from.clone(),
        to: vec![settings.to.clone()],
        reply_to: contact.email.clone(),
        subject: format!("İletişim Formu: {}", contact.subject),
        html: render_body(contact).into_string(),
    }
}

/// Outbound email delivery. Returns the provider's message id.
#[async_trait(?Send)]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailError>;
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

pub struct ResendMailer {
    api_key: Option<String>,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>) -> Self {
        ResendMailer { api_key }
    }
}

#[async_trait(?Send)]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailError> {
        let api_key = self.api_key.as_deref().ok_or(MailError::NotConfigured)?;
        let client = Client::default();
        let mut response = client
            .post(RESEND_ENDPOINT)
            .bearer_auth(api_key)
            .insert_header(("Idempotency-Key", Uuid::new_v4().to_string()))
            .send_json(email)
            .await
            .map_err(|error| MailError::Request(error.to_string()))?;
        let body = response
            .body()
            .await
            .map_err(|error| MailError::Decode(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Status {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        serde_json::from_slice::<SendResponse>(&body)
            .map(|sent| sent.id)
            .map_err(|error| MailError::Decode(error.to_string()))
    }
}

fn rejected(rejection: ContactRejection) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "error": rejection.message() }))
}

/// Validates a raw contact body and relays it.
pub async fn relay(body: &[u8], settings: &MailSettings, mailer: &dyn Mailer) -> HttpResponse {
    let request: ContactRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(_) => return rejected(ContactRejection::InvalidBody),
    };
    let contact = match request.validate() {
        Ok(contact) => contact,
        Err(rejection) => return rejected(rejection),
    };

    let email = compose(&contact, settings);
    match mailer.send(&email).await {
        Ok(id) => {
            tracing::info!(id = %id, "Contact message sent");
            HttpResponse::Ok().json(json!({ "success": true, "id": id }))
        }
        Err(error) => {
            tracing::error!("Contact form error: {}", error);
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to send email" }))
        }
    }
}
