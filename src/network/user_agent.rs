//! Browser-like header values
//!
//! The discovery APIs sit behind web dashboards and expect requests that look
//! like they come from one.

/// Desktop Chrome user agent sent by default
pub const DESKTOP_CHROME: &str = concat!(
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) ",
    "Chrome/134.0.0.0 Safari/537.36"
);

/// Standard accept header for JSON APIs
pub fn accept_json() -> &'static str {
    "application/json, text/plain, */*"
}

/// Standard accept-language header
pub fn accept_language(lang: &str) -> String {
    if lang.is_empty() {
        "en-US,en;q=0.9".to_string()
    } else {
        format!("{},en-US;q=0.9,en;q=0.8", lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_language() {
        assert_eq!(accept_language(""), "en-US,en;q=0.9");
        assert!(accept_language("en-GB").starts_with("en-GB,"));
    }
}
