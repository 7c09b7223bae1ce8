// src/utils/html.rs

/// Sanitizes rich text from the about-page editor before it is stored.
///
/// Whitelist based: formatting tags such as `<p>`, `<b>` and links survive, while
/// `<script>` (with its content), `<iframe>` and event-handler attributes are removed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Empty optional strings are treated as absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
