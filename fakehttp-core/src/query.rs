//! Query-string parsing into ordered multi-value parameters.

use std::collections::BTreeMap;

/// Query parameters: each key maps to its values in the order they appeared.
pub type QueryParams = BTreeMap<String, Vec<String>>;

/// Parse a raw query string (`a=x&b=y&a=z`). Keys and values are
/// percent-decoded and `+` reads as a space. Empty keys are skipped; a key
/// without `=` gets an empty value. `None` or `""` yields an empty map.
pub fn parse_query(query: Option<&str>) -> QueryParams {
    let mut params = QueryParams::new();
    let Some(query) = query else {
        return params;
    };
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}
