//! Log Redaction
//!
//! Scrubs bot tokens, bearer tokens and phone numbers from strings before
//! they are logged.

use regex::Regex;
use std::sync::LazyLock;

static TELEPHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}").unwrap()
});
static BOT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[MNO][A-Za-z\d_-]{23,27}\.[A-Za-z\d_-]{6}\.[A-Za-z\d_-]{27,}").unwrap());
static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Bot|Bearer)\s+[A-Za-z0-9\-._~+/]{20,}=*").unwrap());

/// Redact sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, "$1 [REDACTED_TOKEN]");
    let redacted = BOT_TOKEN_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    TELEPHONE_RE
        .replace_all(&redacted, "[REDACTED_PHONE]")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrubs_tokens_and_phone_numbers() {
        let raw = "call +1-555-123-4567 with Bearer eyJhbGciOiJIUzI1NiJ9 and \
                   MTExMTExMTExMTExMTExMTEx.GaBcDe.abcdefghijklmnopqrstuvwxyz0123";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("555-123-4567"), "{clean}");
        assert!(!clean.contains("eyJhbGciOiJIUzI1NiJ9"), "{clean}");
        assert!(!clean.contains("GaBcDe"), "{clean}");
        assert!(clean.contains("Bearer [REDACTED_TOKEN]"));
    }

    #[test]
    fn leaves_ordinary_text_alone() {
        assert_eq!(redact_sensitive_data("!ping 42 now"), "!ping 42 now");
        assert_eq!(redact_sensitive_data("Bot responds"), "Bot responds");
    }
}
