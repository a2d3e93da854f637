// SPDX-License-Identifier: MPL-2.0

//! Classification of decoded payloads
//!
//! A payload is a hand-off request when it starts with [`FIDO_PREFIX`]
//! (ignoring ASCII case) and is a syntactically valid URL. Everything else is
//! ignored by the scanner.

use crate::constants::FIDO_PREFIX;
use crate::errors::PayloadError;
use std::fmt;
use url::Url;

/// A validated hand-off URL
///
/// Keeps the decoded string verbatim. [`Url`] is only used to validate it, as
/// it normalises the scheme to lower case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffUrl {
    raw: String,
}

impl HandoffUrl {
    /// Parse a payload into a hand-off URL
    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        if !has_fido_prefix(payload) {
            return Err(PayloadError::NotFido);
        }

        if let Some(bad) = first_illegal_char(payload) {
            return Err(PayloadError::MalformedUrl(format!(
                "illegal character {:?}",
                bad
            )));
        }

        Url::parse(payload).map_err(|e| PayloadError::MalformedUrl(e.to_string()))?;

        Ok(Self {
            raw: payload.to_string(),
        })
    }

    /// The URL exactly as it was decoded
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for HandoffUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Case-insensitive check for the FIDO scheme token
pub fn has_fido_prefix(payload: &str) -> bool {
    payload
        .get(..FIDO_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(FIDO_PREFIX))
}

/// Find the first character that cannot appear unescaped in a URI
/// (RFC 3986 unreserved + reserved + well-formed percent escapes)
fn first_illegal_char(payload: &str) -> Option<char> {
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' => {}
            '-' | '.' | '_' | '~' => {}
            ':' | '/' | '?' | '#' | '[' | ']' | '@' => {}
            '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | ';' | '=' => {}
            '%' => {
                let hi = chars.next();
                let lo = chars.next();
                let valid = matches!((hi, lo), (Some(h), Some(l)) if h.is_ascii_hexdigit() && l.is_ascii_hexdigit());
                if !valid {
                    return Some('%');
                }
            }
            other => return Some(other),
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_payload_verbatim() {
        let url = HandoffUrl::parse("FIDO:/1234567890ABCDEF").unwrap();
        assert_eq!(url.as_str(), "FIDO:/1234567890ABCDEF");
        assert_eq!(url.to_string(), "FIDO:/1234567890ABCDEF");
    }

    #[test]
    fn test_prefix_match_ignores_case() {
        assert!(has_fido_prefix("fido:/123"));
        assert!(has_fido_prefix("FiDo:/123"));
        assert!(has_fido_prefix("FIDO:/"));
        assert!(HandoffUrl::parse("fido:/0042").is_ok());
    }

    #[test]
    fn test_non_fido_payloads_are_rejected() {
        for payload in ["hello world", "", "FIDO:", "FIDO:123", "https://example.com", " FIDO:/1"] {
            assert_eq!(
                HandoffUrl::parse(payload),
                Err(PayloadError::NotFido),
                "payload {:?}",
                payload
            );
        }
    }

    #[test]
    fn test_prefix_check_does_not_split_characters() {
        // Multi-byte character straddling the prefix length
        assert!(!has_fido_prefix("FIDO:é"));
        assert!(!has_fido_prefix("日本語"));
    }

    #[test]
    fn test_illegal_characters_are_malformed() {
        for payload in [
            "FIDO:/12 34",
            "FIDO:/abc<def>",
            "FIDO:/quote\"d",
            "FIDO:/caf\u{e9}",
            "FIDO:/tab\there",
            "FIDO:/pipe|",
        ] {
            assert!(
                matches!(HandoffUrl::parse(payload), Err(PayloadError::MalformedUrl(_))),
                "payload {:?}",
                payload
            );
        }
    }

    #[test]
    fn test_percent_escapes() {
        assert!(HandoffUrl::parse("FIDO:/a%20b").is_ok());
        assert!(matches!(
            HandoffUrl::parse("FIDO:/a%2"),
            Err(PayloadError::MalformedUrl(_))
        ));
        assert!(matches!(
            HandoffUrl::parse("FIDO:/a%zz"),
            Err(PayloadError::MalformedUrl(_))
        ));
    }
}
