//! Referral code extraction from the page query string

/// Read the referral parameter from a query string
///
/// Parsing follows `URLSearchParams`: a leading `?` is ignored, `+` means a
/// space, values are percent-decoded and the first occurrence wins. One
/// single quote is stripped from each end of the value. A missing, empty or
/// quote-only value yields `default`.
pub fn parse_referral(query: &str, parameter: &str, default: &str) -> String {
    query_param(query, parameter)
        .map(|raw| strip_quotes(&raw).to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// First value of `name` in `query`, decoded
pub fn query_param(query: &str, name: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode_component(key), decode_component(value)),
            None => (decode_component(pair), String::new()),
        })
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        // Malformed UTF-8 escapes are kept as typed
        Err(_) => spaced,
    }
}

fn strip_quotes(value: &str) -> &str {
    let value = value.strip_prefix('\'').unwrap_or(value);
    value.strip_suffix('\'').unwrap_or(value)
}
