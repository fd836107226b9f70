//! Display formatting and value normalization for emitted records.

use serde::{Deserialize, Serialize};

/// Template that turns first/last name into a display name.
///
/// The template contains the bare tokens `firstname` and `lastname`, e.g.
/// `"firstname lastname"` or `"lastname, firstname"`. Any other text is copied
/// through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullnameFormat(String);

impl FullnameFormat {
    pub const FIRSTNAME: &'static str = "firstname";
    pub const LASTNAME: &'static str = "lastname";

    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn template(&self) -> &str {
        &self.0
    }

    /// Render a display name. Tokens are substituted in a single pass, so a
    /// name that itself contains "lastname" is never re-expanded.
    pub fn format(&self, firstname: &str, lastname: &str) -> String {
        let mut out = String::with_capacity(self.0.len() + firstname.len() + lastname.len());
        let mut rest = self.0.as_str();

        loop {
            let first = rest.find(Self::FIRSTNAME);
            let last = rest.find(Self::LASTNAME);
            let (pos, token, value) = match (first, last) {
                (Some(f), Some(l)) if l < f => (l, Self::LASTNAME, lastname),
                (Some(f), _) => (f, Self::FIRSTNAME, firstname),
                (None, Some(l)) => (l, Self::LASTNAME, lastname),
                (None, None) => break,
            };
            out.push_str(&rest[..pos]);
            out.push_str(value);
            rest = &rest[pos + token.len()..];
        }
        out.push_str(rest);

        out.trim().to_string()
    }
}

impl Default for FullnameFormat {
    fn default() -> Self {
        Self::new("firstname lastname")
    }
}

/// Keep only ASCII digits, e.g. "123.456.789-00" becomes "12345678900".
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format() {
        let format = FullnameFormat::default();
        assert_eq!(format.format("Ana", "Lima"), "Ana Lima");
    }

    #[test]
    fn test_lastname_first_format() {
        let format = FullnameFormat::new("lastname, firstname");
        assert_eq!(format.format("Ana", "Lima"), "Lima, Ana");
    }

    #[test]
    fn test_tokens_in_names_are_not_expanded() {
        let format = FullnameFormat::default();
        assert_eq!(format.format("lastname", "Lima"), "lastname Lima");
    }

    #[test]
    fn test_empty_parts_are_trimmed() {
        let format = FullnameFormat::default();
        assert_eq!(format.format("", "Lima"), "Lima");
    }

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("123.456.789-00"), "12345678900");
        assert_eq!(digits_only(" 987 654 "), "987654");
        assert_eq!(digits_only("n/a"), "");
        assert_eq!(digits_only(""), "");
    }
}
