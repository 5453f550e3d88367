use scraper::{ElementRef, Html, Selector};

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::parser::Fragment;

/// One post's body, ready for extraction.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub root: Fragment,
}

/// Select every post in a page and convert its body into a fragment tree.
pub fn load_posts(html: &str, config: &SourceConfig) -> Result<Vec<Post>, SourceError> {
    let post_selector = parse_selector(&config.post_selector)?;
    let title_selector = parse_selector(&config.title_selector)?;
    let body_selector = config
        .body_selector
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_selector)
        .transpose()?;

    let document = Html::parse_document(html);
    let posts = document
        .select(&post_selector)
        .enumerate()
        .map(|(i, post)| {
            let id = post
                .select(&title_selector)
                .next()
                .map(collapsed_text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("post-{}", i + 1));
            let body = body_selector
                .as_ref()
                .and_then(|s| post.select(s).next())
                .unwrap_or(post);
            Post {
                id,
                root: Fragment::from_element(body),
            }
        })
        .collect();

    Ok(posts)
}

fn parse_selector(selector: &str) -> Result<Selector, SourceError> {
    Selector::parse(selector).map_err(|e| SourceError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
