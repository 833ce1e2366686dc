// src/utils/html.rs

/// Sanitizes model-generated markup before it is stored or shown.
///
/// Generated passages and question stems may carry simple HTML (tables for
/// "match the following" items, `<b>`, `<br>`). Whitelisted tags survive;
/// scripts, iframes and event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
