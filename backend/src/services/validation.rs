//! Input rules checked before anything is sent to a backend
//!
//! Rules append to a [`Violations`] list so one response can report every
//! problem with an input at once.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{GatewayError, GatewayResult};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static username pattern"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static email pattern")
});

static PERSON_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L} ]+$").expect("static name pattern"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("static phone pattern"));

pub const MAX_QUERY_CHARS: usize = 100;
pub const MAX_PAGE_SIZE: i32 = 100;

#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` unless `ok`
    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.0.push(format!("{}: {}", field, message));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> GatewayResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::Validation(self.0.join(", ")))
        }
    }
}

fn chars(value: &str) -> usize {
    value.chars().count()
}

pub fn required_id(v: &mut Violations, field: &str, value: &str) {
    v.check(!value.trim().is_empty(), field, "must not be empty");
}

pub fn max_chars(v: &mut Violations, field: &str, value: &str, max: usize) {
    v.check(
        chars(value) <= max,
        field,
        &format!("must be at most {} characters", max),
    );
}

pub fn page(v: &mut Violations, limit: i32, offset: i32) {
    v.check(
        (1..=MAX_PAGE_SIZE).contains(&limit),
        "limit",
        &format!("must be between 1 and {}", MAX_PAGE_SIZE),
    );
    v.check(offset >= 0, "offset", "must not be negative");
}

pub fn username(v: &mut Violations, value: &str) {
    v.check(
        (3..=50).contains(&chars(value)),
        "username",
        "must be between 3 and 50 characters",
    );
    v.check(
        USERNAME_RE.is_match(value),
        "username",
        "may only contain letters, digits and underscores",
    );
}

pub fn email(v: &mut Violations, value: &str) {
    v.check(EMAIL_RE.is_match(value), "email", "must be a valid email address");
    max_chars(v, "email", value, 100);
}

pub fn person_name(v: &mut Violations, field: &str, value: &str) {
    v.check(
        (1..=50).contains(&chars(value)),
        field,
        "must be between 1 and 50 characters",
    );
    v.check(
        value.is_empty() || PERSON_NAME_RE.is_match(value),
        field,
        "may only contain letters and spaces",
    );
}

pub fn phone(v: &mut Violations, value: &str) {
    v.check(PHONE_RE.is_match(value), "phone", "must be a valid phone number");
}

pub fn address(v: &mut Violations, value: &str) {
    max_chars(v, "address", value, 200);
}

pub fn future_date(v: &mut Violations, field: &str, value: DateTime<Utc>, now: DateTime<Utc>) {
    v.check(value > now, field, "must be in the future");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn run(rule: impl FnOnce(&mut Violations)) -> GatewayResult<()> {
        let mut v = Violations::new();
        rule(&mut v);
        v.finish()
    }

    #[test]
    fn test_usernames() {
        assert!(run(|v| username(v, "alice_01")).is_ok());
        assert!(run(|v| username(v, "al")).is_err());
        assert!(run(|v| username(v, "alice smith")).is_err());
        assert!(run(|v| username(v, &"a".repeat(51))).is_err());
    }

    #[test]
    fn test_emails() {
        assert!(run(|v| email(v, "alice@library.example")).is_ok());
        assert!(run(|v| email(v, "alice@library")).is_err());
        assert!(run(|v| email(v, "not-an-email")).is_err());
    }

    #[test]
    fn test_person_names_allow_spaces_and_accents() {
        assert!(run(|v| person_name(v, "firstName", "Mary Ann")).is_ok());
        assert!(run(|v| person_name(v, "firstName", "Zoë")).is_ok());
        assert!(run(|v| person_name(v, "firstName", "R2D2")).is_err());
        assert!(run(|v| person_name(v, "firstName", "")).is_err());
    }

    #[test]
    fn test_phone_numbers() {
        assert!(run(|v| phone(v, "+14155550100")).is_ok());
        assert!(run(|v| phone(v, "0123")).is_err());
        assert!(run(|v| phone(v, "555-0100")).is_err());
    }

    #[test]
    fn test_paging_bounds() {
        assert!(run(|v| page(v, 10, 0)).is_ok());
        assert!(run(|v| page(v, 0, 0)).is_err());
        assert!(run(|v| page(v, 101, 0)).is_err());
        assert!(run(|v| page(v, 10, -1)).is_err());
    }

    #[test]
    fn test_future_dates() {
        let now = Utc::now();
        assert!(run(|v| future_date(v, "dueDate", now + Duration::days(1), now)).is_ok());
        assert!(run(|v| future_date(v, "dueDate", now - Duration::days(1), now)).is_err());
    }

    #[test]
    fn test_violations_are_joined_into_one_error() {
        let result = run(|v| {
            required_id(v, "bookId", "");
            required_id(v, "userId", " ");
        });
        assert_matches!(
            result,
            Err(GatewayError::Validation(msg)) if msg == "bookId: must not be empty, userId: must not be empty"
        );
    }
}
