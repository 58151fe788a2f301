use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Contentful credentials not configured")]
    NotConfigured,

    #[error("Failed to connect to Contentful: {0}")]
    Request(String),

    #[error("Contentful responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Contentful response could not be read: {0}")]
    Payload(String),

    #[error("Contentful response structure is incorrect: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email service API key not configured")]
    NotConfigured,

    #[error("Failed to connect to email service: {0}")]
    Request(String),

    #[error("Email service responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Email service response is incorrect: {0}")]
    Decode(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Revalidation secret is not configured")]
    NotConfigured,

    #[error("Authorization secret is incorrect")]
    Mismatch,
}
