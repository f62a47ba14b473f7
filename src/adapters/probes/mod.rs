pub mod adobe;
pub mod google;
pub mod gravatar;
pub mod site_template;

pub use adobe::AdobeProbe;
pub use google::GoogleProbe;
pub use gravatar::GravatarProbe;
pub use site_template::{SiteTemplate, SiteTemplateProbe};

use scraper::Html;

/// Longest page excerpt kept as evidence.
pub const SNIPPET_LEN: usize = 300;

/// Lowercases and trims an address for services that ignore case and padding.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Visible text of an HTML (or plain text) body with whitespace collapsed.
pub fn page_text(body: &str) -> String {
    let document = Html::parse_document(body);
    document
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First `SNIPPET_LEN` characters of `text`.
pub fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LEN).collect()
}

/// Joins a base URL and a path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
