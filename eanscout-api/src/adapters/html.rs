//! HTML extraction helpers shared by the adapters

use scraper::{ElementRef, Selector};
use url::Url;

/// Text of the first element matching any of `selectors`, tried in order
///
/// Whitespace runs collapse to a single space. Empty text counts as no match.
pub(crate) fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        scope
            .select(&selector)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    })
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `src`, falling back to the lazy-loading `data-src`
pub(crate) fn image_source(img: ElementRef<'_>) -> Option<String> {
    ["src", "data-src"]
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Make an image reference absolute against `https://{host}/`
///
/// Already-absolute http(s) URLs pass through unchanged.
pub(crate) fn absolute_url(src: &str, host: &str) -> String {
    if let Ok(url) = Url::parse(src) {
        if url.scheme() == "http" || url.scheme() == "https" {
            return url.to_string();
        }
    }

    let base = Url::parse(&format!("https://{}/", host));
    match base.and_then(|base| base.join(src)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("https://{}{}", host, src),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_first_text_tries_selectors_in_order() {
        let doc = Html::parse_document(
            r#"<div class="product-description">second</div><p class="description">  first
               line </p>"#,
        );
        let text = first_text(doc.root_element(), &[".description", ".product-description"]);
        assert_eq!(text.as_deref(), Some("first line"));
    }

    #[test]
    fn test_first_text_skips_empty_elements() {
        let doc = Html::parse_document(r#"<h1>   </h1>"#);
        assert_eq!(first_text(doc.root_element(), &["h1"]), None);
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(
            absolute_url("/media/a.jpg", "celiostore.cz"),
            "https://celiostore.cz/media/a.jpg"
        );
        assert_eq!(
            absolute_url("//cdn.example.com/a.jpg", "celiostore.cz"),
            "https://cdn.example.com/a.jpg"
        );
        assert_eq!(
            absolute_url("http://img.example.com/a.jpg", "celiostore.cz"),
            "http://img.example.com/a.jpg"
        );
    }
}
