use once_cell::sync::Lazy;
use regex::Regex;

/// PII scrubber for SQL text headed to logs or telemetry storage.
///
/// ### WARNING
/// Regex-based scrubbing is a **best-effort** defense. It does not guarantee
/// complete sanitization of literals in every SQL dialect; for
/// high-compliance environments, disable literal logging entirely.
static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").unwrap());

static SSN_REGEX: Lazy<Regex> = Lazy::new(|| {
    // US SSN pattern: XXX-XX-XXXX
    Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap()
});

static CARD_REGEX: Lazy<Regex> = Lazy::new(|| {
    // 13-16 digit runs, optionally grouped by hyphens or spaces
    Regex::new(r"\b(?:\d[ -]*?){13,16}\b").unwrap()
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    // (XXX) XXX-XXXX / XXX-XXX-XXXX and +1 prefixed variants
    Regex::new(r"(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}").unwrap()
});

pub fn scrub(input: &str) -> String {
    let mut scrubbed = input.to_string();

    scrubbed = EMAIL_REGEX.replace_all(&scrubbed, "[EMAIL]").to_string();
    scrubbed = SSN_REGEX.replace_all(&scrubbed, "[SSN]").to_string();
    // May catch long numeric IDs too; acceptable for an audit surface.
    scrubbed = CARD_REGEX.replace_all(&scrubbed, "[CARD]").to_string();
    scrubbed = PHONE_REGEX.replace_all(&scrubbed, "[PHONE]").to_string();

    scrubbed
}
