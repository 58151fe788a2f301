use crate::error::AuthError;

/// Header carrying the CMS webhook secret.
pub const SECRET_HEADER: &str = "x-contentful-webhook-secret";

/// Exact-match check of a presented secret. A missing configured secret
/// rejects everything.
pub fn check_secret(expected: Option<&str>, presented: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected.filter(|secret| !secret.is_empty()) else {
        tracing::warn!("Rejected revalidation request: no secret configured");
        return Err(AuthError::NotConfigured);
    };
    if presented == Some(expected) {
        tracing::debug!("Accepted revalidation secret");
        Ok(())
    } else {
        let error = AuthError::Mismatch;
        tracing::warn!("Failed to authorize: {}", error);
        Err(error)
    }
}
