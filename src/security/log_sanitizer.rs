use axum::{body::Body, http::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::Instrument;

use super::auth::AuthenticatedUser;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z0-9._%+\-]{1,2})[A-Za-z0-9._%+\-]*@([A-Za-z0-9.\-]+)")
        .expect("email pattern is a valid regex")
});

static SANITIZATION_PATTERNS: [(&str, &str); 6] = [
    ("\n", "\\n"),
    ("\r", "\\r"),
    ("\t", "\\t"),
    ("\"", "\\\""),
    ("\x00", "\\x00"),
    ("\x1B", "\\x1B"),
];

const MAX_LOG_VALUE_LEN: usize = 1000;

/// Keeps the first two characters of each email's local part.
pub fn mask_email(text: &str) -> String {
    EMAIL_PATTERN.replace_all(text, "${1}***@${2}").into_owned()
}

/// Escapes control characters and truncates long values before they reach a log line.
pub fn sanitize_for_log(input: &str) -> String {
    let mut result = input.to_string();

    for (pattern, replacement) in SANITIZATION_PATTERNS.iter() {
        result = result.replace(pattern, replacement);
    }

    if result.len() > MAX_LOG_VALUE_LEN {
        let mut cut = MAX_LOG_VALUE_LEN;
        while !result.is_char_boundary(cut) {
            cut -= 1;
        }
        result.truncate(cut);
        result.push_str("... [truncated]");
    }

    result
}

/// Runs the rest of the request inside a span naming the masked user and session.
pub async fn request_log_context_middleware(request: Request<Body>, next: Next) -> Response {
    let (user_id, session_id) = match request.extensions().get::<AuthenticatedUser>() {
        Some(user) => (mask_email(&user.email), user.session_id.clone()),
        None => ("-".to_string(), "-".to_string()),
    };

    let span = tracing::info_span!(
        "request",
        method = %request.method(),
        path = %sanitize_for_log(request.uri().path()),
        user_id = %user_id,
        session_id = %session_id,
    );

    next.run(request).instrument(span).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("user@example.com"), "us***@example.com");
        assert_eq!(mask_email("a@x.com"), "a***@x.com");
        assert_eq!(mask_email("a@x"), "a***@x");
        assert_eq!(mask_email("user+tag@example.com"), "us***@example.com");
    }

    #[test]
    fn test_mask_email_preserves_case() {
        assert_eq!(mask_email("JOHN.doe@Example.COM"), "JO***@Example.COM");
    }

    #[test]
    fn test_mask_email_in_text() {
        assert_eq!(
            mask_email("sent from alice@one.org to bob@two.org"),
            "sent from al***@one.org to bo***@two.org"
        );
        assert_eq!(mask_email("no address here"), "no address here");
        assert_eq!(mask_email(""), "");
    }

    #[test]
    fn test_sanitize_for_log() {
        assert_eq!(sanitize_for_log("line1\nline2"), "line1\\nline2");
        assert_eq!(sanitize_for_log("tab\there"), "tab\\there");

        let long = "x".repeat(MAX_LOG_VALUE_LEN + 50);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.ends_with("... [truncated]"));
        assert!(sanitized.len() < long.len());
    }
}
