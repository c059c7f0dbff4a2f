use crate::error::ServiceError;

/// Syntactic check on a contact address; accepted addresses may still
/// bounce, which surfaces later as a side-effect failure.
pub fn validate_email(address: &str) -> Result<(), ServiceError> {
    let invalid = || ServiceError::Validation(format!("invalid email format: {}", address));

    if address.is_empty() || address.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let mut parts = address.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(invalid()),
    };

    if local.is_empty() || domain.is_empty() {
        return Err(invalid());
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }

    Ok(())
}
