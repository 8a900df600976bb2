use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left as-is when encoding an original filename. Everything
/// else, including `/`, `?`, `#` and `%`, is percent-encoded so the result
/// is a single safe URL path segment.
const NAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b',')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$');

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Strips any client-side directory components from an uploaded filename.
fn base_name(original: &str) -> &str {
    original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
}

/// Replaces spaces with underscores, then percent-encodes the result.
pub fn sanitize(original: &str) -> String {
    let replaced = base_name(original).replace(' ', "_");
    utf8_percent_encode(&replaced, NAME_ENCODE_SET).to_string()
}

/// Builds the stored name `{millis}_{sanitized original}`.
pub fn generated_name(millis: i64, original: &str) -> String {
    format!("{}_{}", millis, sanitize(original))
}
