//! Field-level rules shared by patch validation and integrity checks.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$")
    .expect("domain pattern compiles")
});

pub const MIN_PROBABILITY: i64 = 0;
pub const MAX_PROBABILITY: i64 = 100;

/// `local@host.tld` with no whitespace.
pub fn is_valid_email(email: &str) -> bool { EMAIL.is_match(email) }

/// A bare hostname such as `acme.com`; no scheme, path or port.
pub fn is_valid_domain(domain: &str) -> bool { DOMAIN.is_match(domain) }

pub fn is_valid_probability(probability: i64) -> bool {
  (MIN_PROBABILITY..=MAX_PROBABILITY).contains(&probability)
}

/// Amounts may be absent but never negative or NaN.
pub fn is_valid_amount(amount: Option<f64>) -> bool {
  amount.is_none_or(|a| a.is_finite() && a >= 0.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn email_format() {
    assert!(is_valid_email("ada@example.com"));
    assert!(!is_valid_email("ada@example"));
    assert!(!is_valid_email("ada example@example.com"));
    assert!(!is_valid_email(""));
  }

  #[test]
  fn domain_format() {
    assert!(is_valid_domain("acme.com"));
    assert!(is_valid_domain("eu.sales.acme.co"));
    assert!(!is_valid_domain("https://acme.com"));
    assert!(!is_valid_domain("acme"));
    assert!(!is_valid_domain("-acme.com"));
  }

  #[test]
  fn probability_and_amount_bounds() {
    assert!(is_valid_probability(0));
    assert!(is_valid_probability(100));
    assert!(!is_valid_probability(101));
    assert!(!is_valid_probability(-1));
    assert!(is_valid_amount(None));
    assert!(is_valid_amount(Some(0.0)));
    assert!(!is_valid_amount(Some(-5.0)));
    assert!(!is_valid_amount(Some(f64::NAN)));
  }
}
