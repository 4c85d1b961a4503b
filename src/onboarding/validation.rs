//! Validation gate: pure field validators and per-step gates.
//!
//! Nothing in here panics or touches I/O. Every check returns a
//! [`ValidationResult`] whose messages are ready to show next to the field.
//! The deny-lists are small safety nets; output encoding is still the
//! renderer's job.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::config::ValidationConfig;
use crate::profile::{Consent, LinkEntry, ProfileDraft, ProfileField};

pub const EMAIL_MAX_LENGTH: usize = 320;
pub const URL_MAX_LENGTH: usize = 2000;
pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 100;
pub const PHONE_MIN_DIGITS: usize = 10;
pub const PHONE_MAX_DIGITS: usize = 15;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 128;
pub const BIO_MIN_WORDS: usize = 5;
pub const BIO_MAX_WORDS: usize = 50;
/// Words before the bio limit at which the "approaching limit" hint starts.
pub const BIO_WARNING_WINDOW: usize = 5;

/// Substrings rejected in display names (matched case-insensitively).
const NAME_DENY_LIST: [&str; 4] = ["<script", "javascript:", "data:", "vbscript:"];

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static TRIVIAL_PASSWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(123456|password|qwerty)").unwrap());

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Blocking messages, in the order they were found.
    pub errors: Vec<String>,
    /// Non-blocking hints.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
            warnings: vec![],
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![message.into()],
            warnings: vec![],
        }
    }

    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings: vec![],
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Fold another result into this one. Invalid wins.
    pub fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Run `check` only when `input` is non-blank; blank optional input is valid.
pub fn optional(input: Option<&str>, check: impl FnOnce(&str) -> ValidationResult) -> ValidationResult {
    match input.map(str::trim) {
        Some(value) if !value.is_empty() => check(value),
        _ => ValidationResult::valid(),
    }
}

// ── Field validators ───────────────────────────────────────────────────

pub fn validate_email(input: &str) -> ValidationResult {
    let email = input.trim();
    if email.is_empty() {
        return ValidationResult::invalid("Email is required");
    }
    if email.chars().count() > EMAIL_MAX_LENGTH {
        return ValidationResult::invalid(format!(
            "Email must be at most {EMAIL_MAX_LENGTH} characters"
        ));
    }
    if !EMAIL_RE.is_match(email) {
        return ValidationResult::invalid("Please enter a valid email address");
    }
    ValidationResult::valid()
}

pub fn validate_phone(input: &str) -> ValidationResult {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if cleaned.is_empty() {
        return ValidationResult::invalid("Mobile number is required");
    }

    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return ValidationResult::invalid("Mobile number may only contain digits");
    }

    let count = digits.len();
    if !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&count) {
        return ValidationResult::invalid(format!(
            "Mobile number must have between {PHONE_MIN_DIGITS} and {PHONE_MAX_DIGITS} digits"
        ));
    }
    ValidationResult::valid()
}

pub fn validate_url(input: &str) -> ValidationResult {
    let raw = input.trim();
    if raw.is_empty() {
        return ValidationResult::invalid("URL is required");
    }
    if raw.chars().count() > URL_MAX_LENGTH {
        return ValidationResult::invalid(format!(
            "URL must be at most {URL_MAX_LENGTH} characters"
        ));
    }

    let Ok(url) = Url::parse(raw) else {
        return ValidationResult::invalid("Please enter a valid URL (e.g. https://example.com)");
    };

    let well_formed = match url.scheme() {
        "mailto" | "tel" => !url.path().is_empty(),
        _ => url.host_str().is_some_and(|h| !h.is_empty()),
    };
    if !well_formed {
        return ValidationResult::invalid("Please enter a valid URL (e.g. https://example.com)");
    }
    ValidationResult::valid()
}

pub fn validate_name(input: &str) -> ValidationResult {
    let name = input.trim();
    if name.is_empty() {
        return ValidationResult::invalid("Name is required");
    }

    let mut errors = Vec::new();
    let length = name.chars().count();
    if length < NAME_MIN_LENGTH {
        errors.push(format!("Name must be at least {NAME_MIN_LENGTH} characters"));
    }
    if length > NAME_MAX_LENGTH {
        errors.push(format!("Name must be at most {NAME_MAX_LENGTH} characters"));
    }

    let lowered = name.to_lowercase();
    if NAME_DENY_LIST.iter().any(|bad| lowered.contains(bad)) {
        errors.push("Name contains disallowed content".to_string());
    }
    ValidationResult::from_errors(errors)
}

/// Bio word-count rules. Valid bios near the upper limit carry a warning.
pub fn validate_bio(input: &str) -> ValidationResult {
    let words = input.split_whitespace().count();

    if words == 0 {
        return ValidationResult::invalid("Bio is required");
    }
    if words < BIO_MIN_WORDS {
        return ValidationResult::invalid(format!(
            "Bio must be at least {BIO_MIN_WORDS} words ({words} so far)"
        ));
    }
    if words > BIO_MAX_WORDS {
        return ValidationResult::invalid(format!(
            "Bio must be at most {BIO_MAX_WORDS} words ({words} entered)"
        ));
    }

    let result = ValidationResult::valid();
    if words > BIO_MAX_WORDS - BIO_WARNING_WINDOW {
        result.with_warning(format!(
            "Bio is approaching the {BIO_MAX_WORDS} word limit ({words}/{BIO_MAX_WORDS})"
        ))
    } else {
        result
    }
}

/// `YYYY-MM-DD`, not after `today`.
pub fn validate_date_of_birth(input: &str, today: NaiveDate) -> ValidationResult {
    let raw = input.trim();
    if raw.is_empty() {
        return ValidationResult::invalid("Date of birth is required");
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) if date > today => {
            ValidationResult::invalid("Date of birth cannot be in the future")
        }
        Ok(_) => ValidationResult::valid(),
        Err(_) => ValidationResult::invalid("Date of birth must be a date like 1990-04-23"),
    }
}

// ── Password strength ──────────────────────────────────────────────────

/// Scored password strength.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    /// 0–5.
    pub score: u8,
    pub feedback: Vec<String>,
    pub is_valid: bool,
}

pub fn password_strength(password: &str, config: &ValidationConfig) -> PasswordStrength {
    let length = password.chars().count();
    let mut score: i32 = 0;
    let mut feedback = Vec::new();

    let mut award = |ok: bool, message: &str| {
        if ok {
            score += 1;
        } else {
            feedback.push(message.to_string());
        }
    };
    award(
        length >= PASSWORD_MIN_LENGTH,
        "Use at least 8 characters",
    );
    award(
        password.chars().any(|c| c.is_uppercase()),
        "Add an uppercase letter",
    );
    award(
        password.chars().any(|c| c.is_lowercase()),
        "Add a lowercase letter",
    );
    award(password.chars().any(|c| c.is_ascii_digit()), "Add a number");

    let has_symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if has_symbol {
        score += 1;
    } else if config.require_symbols {
        feedback.push("Add a symbol".to_string());
    }

    if length > PASSWORD_MAX_LENGTH {
        score -= 1;
        feedback.push(format!("Use at most {PASSWORD_MAX_LENGTH} characters"));
    }
    if is_trivial_password(password) {
        score -= 1;
        feedback.push("Avoid common patterns and repeated characters".to_string());
    }

    let score = score.clamp(0, 5) as u8;
    let is_valid = score >= config.required_password_score() && feedback.is_empty();
    PasswordStrength {
        score,
        feedback,
        is_valid,
    }
}

pub fn validate_password(password: &str, config: &ValidationConfig) -> ValidationResult {
    let strength = password_strength(password, config);
    ValidationResult {
        is_valid: strength.is_valid,
        errors: strength.feedback,
        warnings: vec![],
    }
}

fn is_trivial_password(password: &str) -> bool {
    TRIVIAL_PASSWORD_RE.is_match(password) || has_repeated_run(password, 4)
}

/// Any character repeated at least `run` times in a row.
fn has_repeated_run(input: &str, run: usize) -> bool {
    let mut previous = None;
    let mut count = 0;
    for c in input.chars() {
        if Some(c) == previous {
            count += 1;
        } else {
            previous = Some(c);
            count = 1;
        }
        if count >= run {
            return true;
        }
    }
    false
}

// ── Sanitization ───────────────────────────────────────────────────────

/// Trim and drop control characters (newlines and tabs are kept).
pub fn sanitize_text(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}

/// [`sanitize_text`] applied to every field of a link.
pub fn sanitize_link(link: &LinkEntry) -> LinkEntry {
    LinkEntry {
        label: sanitize_text(&link.label),
        url: sanitize_text(&link.url),
        category: sanitize_text(&link.category),
        description: sanitize_text(&link.description),
    }
}

// ── Step gates ─────────────────────────────────────────────────────────

/// Every personal field must be present; format checks are advisory here.
pub fn personal_details_gate(draft: &ProfileDraft) -> ValidationResult {
    let errors = ProfileField::PERSONAL
        .iter()
        .filter(|f| draft.present(**f).is_none())
        .map(|f| format!("{} is required", f.label()))
        .collect();
    ValidationResult::from_errors(errors)
}

/// At least one slot with label, url and category filled in.
pub fn links_gate(links: &[LinkEntry]) -> ValidationResult {
    let mut result = if links.iter().any(LinkEntry::is_complete) {
        ValidationResult::valid()
    } else {
        ValidationResult::invalid("Add at least one link with a label, URL and category")
    };

    for (index, link) in links.iter().enumerate() {
        if !link.is_blank() && !link.is_complete() {
            result = result.with_warning(format!(
                "Link {} is incomplete and will not be saved",
                index + 1
            ));
        }
    }
    result
}

pub fn photo_bio_gate(draft: &ProfileDraft) -> ValidationResult {
    validate_bio(draft.bio.as_deref().unwrap_or_default())
}

pub fn terms_gate(draft: &ProfileDraft) -> ValidationResult {
    let mut errors = Vec::new();
    if !draft.consent(Consent::Terms) {
        errors.push("You must accept the terms of service".to_string());
    }
    if !draft.consent(Consent::Privacy) {
        errors.push("You must accept the privacy policy".to_string());
    }
    ValidationResult::from_errors(errors)
}
