// src/classify.rs

use crate::error::ProviderError;

/// HTTP status the provider uses for quota and rate limiting.
pub const QUOTA_STATUS: u16 = 429;

/// Lower-case message fragments that mark a quota failure when no 429 status is present.
pub const QUOTA_MARKERS: [&str; 3] = ["quota", "rate limit", "exhausted"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The key ran out of quota; another key may succeed.
    QuotaExhausted,
    /// Anything else. Never retried.
    Fatal,
}

/// Decides whether a provider error warrants switching to the next key.
///
/// The status code is checked first; the message match is a fallback for
/// transports that only surface text.
pub fn classify(err: &ProviderError) -> ErrorClass {
    if err.status == Some(QUOTA_STATUS) {
        return ErrorClass::QuotaExhausted;
    }
    let message = err.message.to_lowercase();
    if QUOTA_MARKERS.iter().any(|marker| message.contains(marker)) {
        ErrorClass::QuotaExhausted
    } else {
        ErrorClass::Fatal
    }
}
