//! Stable event field names.
//!
//! Downstream consumers query on these names; renaming one is a breaking change.

/// Kind of event; always [`META_TYPE_HTTP_REQUEST`] for this crate.
pub const META_TYPE: &str = "meta.type";
pub const META_TYPE_HTTP_REQUEST: &str = "http_request";

pub const REQUEST_METHOD: &str = "request.method";
pub const REQUEST_PATH: &str = "request.path";
pub const REQUEST_QUERY: &str = "request.query";
pub const REQUEST_URL: &str = "request.url";
pub const REQUEST_HOST: &str = "request.host";
pub const REQUEST_HTTP_VERSION: &str = "request.http_version";
pub const REQUEST_CONTENT_LENGTH: &str = "request.content_length";
pub const REQUEST_REMOTE_ADDR: &str = "request.remote_addr";
pub const REQUEST_ID: &str = "request.id";
/// Prefix for captured headers, e.g. `request.header.user_agent`.
pub const REQUEST_HEADER_PREFIX: &str = "request.header.";

pub const RESPONSE_STATUS_CODE: &str = "response.status_code";
pub const RESPONSE_SIZE: &str = "response.size";
/// `false` when the body was dropped before its end (tower path only).
pub const RESPONSE_COMPLETED: &str = "response.completed";
pub const RESPONSE_ERROR: &str = "response.error";

/// Elapsed time in fractional milliseconds.
pub const DURATION_MS: &str = "duration_ms";

pub const HANDLER_NAME: &str = "handler.name";
pub const HANDLER_PATTERN: &str = "handler.pattern";
pub const HANDLER_PANICKED: &str = "handler.panicked";
pub const HANDLER_PANIC_MESSAGE: &str = "handler.panic_message";
pub const HANDLER_ERROR: &str = "handler.error";

/// Field name for a captured header: `User-Agent` → `request.header.user_agent`.
pub fn header_field(header: &str) -> String {
    let mut name = String::with_capacity(REQUEST_HEADER_PREFIX.len() + header.len());
    name.push_str(REQUEST_HEADER_PREFIX);
    name.extend(
        header
            .chars()
            .map(|c| if c == '-' { '_' } else { c.to_ascii_lowercase() }),
    );
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_field() {
        assert_eq!(header_field("User-Agent"), "request.header.user_agent");
        assert_eq!(header_field("x-forwarded-for"), "request.header.x_forwarded_for");
    }
}
