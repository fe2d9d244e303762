use crate::models::Event;

/// Why an admission attempt was turned away. `MissingFields` is deliberately
/// silent at the surface: the signup button stays disabled for blank input,
/// so a blank submission gets no message, only a refusal to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    MissingFields,
    InvalidEmail,
    AlreadyRegistered,
}

/// Matches the `local@domain.tld` shape: no whitespace, exactly one `@`,
/// and at least one dot with text on both sides in the domain part.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// The pure admission precheck, first failure wins. Capacity is NOT checked
/// here; the store's transactional insert owns that ceiling. `is_full` only
/// drives whether the signup form is shown at all.
pub fn check_admission(event: &Event, name: &str, email: &str) -> Result<(), AdmissionError> {
    if name.trim().is_empty() || email.trim().is_empty() {
        return Err(AdmissionError::MissingFields);
    }
    if !is_valid_email(email) {
        return Err(AdmissionError::InvalidEmail);
    }
    if event
        .attendees
        .iter()
        .any(|a| a.email.eq_ignore_ascii_case(email))
    {
        return Err(AdmissionError::AlreadyRegistered);
    }
    Ok(())
}
