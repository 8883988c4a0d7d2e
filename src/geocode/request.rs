//! Request URL construction from a provider's template.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except RFC 3986 unreserved characters is encoded.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// The query as sent to providers: country context appended to the free text.
pub fn augment_query(query: &str, country_code: &str) -> String {
    if country_code.is_empty() {
        query.to_string()
    } else {
        format!("{}, {}", query, country_code)
    }
}

/// Substitute `:q`, `:api` and `:countryCode` in `template`.
///
/// The query is augmented with the country code first. Every value is
/// percent-encoded, and substituted text is never scanned for placeholders again.
/// Unknown `:name` sequences are left untouched.
pub fn build_url(template: &str, query: &str, api_key: &str, country_code: &str) -> String {
    let q = encode(&augment_query(query, country_code));
    let api = encode(api_key);
    let cc = encode(country_code);

    let mut out = String::with_capacity(template.len() + q.len() + api.len());
    let mut rest = template;
    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let ident_len = after
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after.len());
        let value = match &after[..ident_len] {
            "q" => Some(&q),
            "api" => Some(&api),
            "countryCode" => Some(&cc),
            _ => None,
        };
        match value {
            Some(v) => {
                out.push_str(v);
                rest = &after[ident_len..];
            }
            None => {
                out.push(':');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
