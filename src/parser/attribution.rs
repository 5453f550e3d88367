use std::sync::LazyLock;

use regex::Regex;

use crate::error::SetupError;

static BLOCKQUOTE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:>\s*)+").unwrap());

const TITLE_SEPARATOR: &str = ", ";

/// Anchored matcher for the line that names a quote's author: any run of
/// `>` markers (nested block quotes stack them), then one of the
/// configured prefixes.
#[derive(Debug, Clone)]
pub struct AuthorLine {
    pattern: Regex,
}

impl AuthorLine {
    pub fn new<S: AsRef<str>>(prefixes: &[S]) -> Result<Self, SetupError> {
        let mut prefixes: Vec<&str> = prefixes
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !p.is_empty())
            .collect();
        if prefixes.is_empty() {
            return Err(SetupError::NoAuthorPrefixes);
        }
        // Alternation is leftmost-first: "-" must not shadow "-- ".
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));

        let alternatives: Vec<String> = prefixes.iter().map(|p| regex::escape(p)).collect();
        let pattern = Regex::new(&format!(r"^\s*(?:>\s*)*(?:{})", alternatives.join("|")))?;
        Ok(AuthorLine { pattern })
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    /// The line with marker and prefix cut off, or `None` when it is not an
    /// author line.
    pub fn strip<'l>(&self, line: &'l str) -> Option<&'l str> {
        self.pattern.find(line).map(|m| &line[m.end()..])
    }
}

/// The set of characters treated as quotation marks at line edges.
#[derive(Debug, Clone)]
pub struct QuoteMarks {
    marks: Vec<char>,
}

impl QuoteMarks {
    pub fn new(marks: &str) -> Self {
        QuoteMarks {
            marks: marks.chars().collect(),
        }
    }

    fn is_mark(&self, c: char) -> bool {
        self.marks.contains(&c)
    }

    pub fn starts_with_mark(&self, s: &str) -> bool {
        s.chars().next().is_some_and(|c| self.is_mark(c))
    }

    pub fn ends_with_mark(&self, s: &str) -> bool {
        s.chars().next_back().is_some_and(|c| self.is_mark(c))
    }

    pub fn strip_leading<'s>(&self, s: &'s str) -> &'s str {
        s.trim_start_matches(|c| self.is_mark(c))
    }

    pub fn strip_trailing<'s>(&self, s: &'s str) -> &'s str {
        s.trim_end_matches(|c| self.is_mark(c))
    }

    pub fn strip<'s>(&self, s: &'s str) -> &'s str {
        self.strip_leading(self.strip_trailing(s))
    }
}

/// Remove leading `>` block-quote markers, nested ones included.
pub fn strip_blockquote_marker(line: &str) -> &str {
    match BLOCKQUOTE_MARKER_RE.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// `_The Message_` → `The Message`.
pub fn strip_markdown_italics(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('_') && s.ends_with('_') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Split what follows the author prefix into author and optional title at
/// the first `", "`.
pub fn split_author_title(rest: &str, marks: &QuoteMarks) -> (String, Option<String>) {
    match rest.split_once(TITLE_SEPARATOR) {
        None => (rest.trim().to_string(), None),
        Some((author, title)) => {
            let title = strip_markdown_italics(marks.strip(title.trim())).trim();
            let title = (!title.is_empty()).then(|| title.to_string());
            (author.trim().to_string(), title)
        }
    }
}
