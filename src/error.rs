use thiserror::Error;

/// Why a candidate quote block produced no quote. Never fatal: the block is
/// dropped, the failure goes to the diagnostics sink, and extraction moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ParseFailure {
    #[error("last line does not start with expected author marker")]
    NoAttributionLine,
    #[error("no quote lines left after stripping")]
    EmptyQuoteBody,
    #[error("unknown format, no quote blocks found")]
    UnknownFormat,
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no author prefixes configured")]
    NoAuthorPrefixes,
    #[error("invalid author line pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}
