pub mod attribution;
pub mod extractor;
pub mod flatten;
pub mod fragment;

pub use extractor::{ParsedQuote, QuoteExtractor, State};
pub use flatten::{BlockRenderer, MarkupFlattener, Renderer};
pub use fragment::{Element, Fragment, Piece};

use crate::config::Settings;
use crate::diagnostics::DiagnosticsSink;
use crate::error::SetupError;
use crate::output::QuoteRecord;
use crate::source::Post;

/// Extractor wired from loaded settings with the default block renderer.
pub fn build_extractor(settings: &Settings) -> Result<QuoteExtractor, SetupError> {
    QuoteExtractor::new(&settings.extractor, MarkupFlattener::from_config(&settings.render))
}

/// Post body → quote records tagged with the post's identifier.
pub fn process_post(
    extractor: &QuoteExtractor,
    post: &Post,
    sink: &dyn DiagnosticsSink,
) -> Vec<QuoteRecord> {
    extractor
        .extract(&post.id, &post.root, sink)
        .into_iter()
        .map(|quote| QuoteRecord {
            post: post.id.clone(),
            quote,
        })
        .collect()
}

// ── Tests ──
