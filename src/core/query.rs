//! Query string parsing.

use std::borrow::Cow;
use std::collections::HashMap;

/// Decode one form-encoded component: `+` is a space, `%XX` escapes are decoded.
#[inline]
pub fn form_decode(s: &str) -> String {
    let s: Cow<'_, str> = if s.contains('+') {
        Cow::Owned(s.replace('+', " "))
    } else {
        Cow::Borrowed(s)
    };

    if s.contains('%') {
        percent_encoding::percent_decode_str(&s)
            .decode_utf8_lossy()
            .into_owned()
    } else {
        s.into_owned()
    }
}

/// Parse a query string. Repeated keys keep every value, in order.
pub fn parse_query_string(query: &str) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = match pair.find('=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, ""),
        };

        if !key.is_empty() {
            params
                .entry(form_decode(key))
                .or_default()
                .push(form_decode(value));
        }
    }

    params
}
