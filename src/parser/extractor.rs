use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ExtractorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::error::{ParseFailure, SetupError};

use super::attribution::{split_author_title, strip_blockquote_marker, AuthorLine, QuoteMarks};
use super::flatten::MarkupFlattener;
use super::fragment::{Fragment, Piece};

/// Fragments believed to hold one quote followed by its attribution line.
type QuoteBlock<'a> = Vec<Piece<'a>>;

/// Child index at each level of unpacking, from the post root down.
/// Lexicographic order is document order.
type Position = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedQuote {
    pub quote: String,
    pub author: String,
    pub title: Option<String>,
}

/// Extraction stages, used to label diagnostics and trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Initial,
    FilterData,
    GatherQuoteBlocks,
    ProcessAndStripQuoteBlocks,
    ParseQuote,
    Final,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Initial => "initial",
            State::FilterData => "filter_data",
            State::GatherQuoteBlocks => "gather_quote_blocks",
            State::ProcessAndStripQuoteBlocks => "process_and_strip_quote_blocks",
            State::ParseQuote => "parse_quote",
            State::Final => "final",
        };
        f.write_str(name)
    }
}

/// Pulls `(quote, author, title)` triples out of a post body.
///
/// Markup is unwrapped one layer at a time, only where an attribution line
/// sits in the middle of a fragment, until every attribution line ends the
/// fragment it was found in. Each such fragment, together with the
/// fragments before it, forms a quote block that is then parsed into a
/// quote. Holds no per-call state, so one extractor can serve many threads.
pub struct QuoteExtractor {
    flattener: MarkupFlattener,
    author_line: AuthorLine,
    marks: QuoteMarks,
    noise_classes: Vec<String>,
}

impl QuoteExtractor {
    pub fn new(config: &ExtractorConfig, flattener: MarkupFlattener) -> Result<Self, SetupError> {
        Ok(QuoteExtractor {
            flattener,
            author_line: AuthorLine::new(&config.author_prefixes)?,
            marks: QuoteMarks::new(&config.quotation_marks),
            noise_classes: config.noise_classes.clone(),
        })
    }

    pub fn flattener(&self) -> &MarkupFlattener {
        &self.flattener
    }

    pub fn extract(
        &self,
        post: &str,
        root: &Fragment,
        sink: &dyn DiagnosticsSink,
    ) -> Vec<ParsedQuote> {
        trace!(post, state = %State::Initial, "extracting quotes");
        let blocks = self.gather_quote_blocks(post, Piece::Node(root));
        if blocks.is_empty() {
            sink.report(Diagnostic::new(
                post,
                State::GatherQuoteBlocks,
                ParseFailure::UnknownFormat,
            ));
            return Vec::new();
        }

        trace!(post, state = %State::ProcessAndStripQuoteBlocks, blocks = blocks.len(), "stripping blocks");
        let blocks: Vec<QuoteBlock<'_>> = blocks
            .into_iter()
            .map(|block| self.strip_quote_block(block))
            .collect();

        trace!(post, state = %State::ParseQuote, "parsing blocks");
        let mut quotes = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let lines = self.block_lines(block);
            match self.parse_lines(&lines) {
                Ok(quote) => quotes.push(quote),
                Err(failure) => sink.report(
                    Diagnostic::new(post, State::ParseQuote, failure).with_snapshot(lines),
                ),
            }
        }

        trace!(post, state = %State::Final, quotes = quotes.len(), "done");
        quotes
    }

    /// Drop comments, headings, bylines, share widgets and pieces that
    /// render to no text.
    pub fn filter_data<'a>(&self, pieces: Vec<Piece<'a>>) -> Vec<Piece<'a>> {
        pieces.into_iter().filter(|p| !self.is_noise(p)).collect()
    }

    fn is_noise(&self, piece: &Piece<'_>) -> bool {
        if let Piece::Node(fragment) = piece {
            match fragment {
                Fragment::Comment(_) => return true,
                Fragment::Element(element)
                    if element.is_heading()
                        || self.noise_classes.iter().any(|c| element.has_class(c)) =>
                {
                    return true
                }
                _ => {}
            }
        }
        self.flattener.flatten(piece).is_empty()
    }

    /// Scan the working list for attribution lines until nothing is left to
    /// unpack. A pass only rescans the children of what it unpacked, so the
    /// loop ends once the deepest unpacked layer holds no buried attribution.
    /// Blocks are returned in document order, whichever pass closed them.
    fn gather_quote_blocks<'a>(&self, post: &str, root: Piece<'a>) -> Vec<QuoteBlock<'a>> {
        let mut blocks: Vec<(Position, QuoteBlock<'a>)> = Vec::new();
        let mut working: Vec<(Position, Piece<'a>)> = vec![(Vec::new(), root)];
        let mut pass = 0usize;

        loop {
            pass += 1;
            let mut unpacked = Vec::new();
            // Start of the next attribution-only block.
            let mut boundary = 0;

            for (i, (position, piece)) in working.iter().enumerate() {
                let lines = self.flattener.flatten(piece);
                let Some(at) = lines.iter().position(|l| self.author_line.is_match(l)) else {
                    continue;
                };

                if at + 1 == lines.len() {
                    if lines.len() == 1 {
                        let span = &working[boundary..=i];
                        blocks.push((
                            span[0].0.clone(),
                            span.iter().map(|(_, p)| p.clone()).collect(),
                        ));
                    } else {
                        blocks.push((position.clone(), vec![piece.clone()]));
                    }
                } else {
                    // Attribution buried mid-fragment; its children go to the next pass.
                    let children = self.filter_data(piece.unpack());
                    unpacked.extend(children.into_iter().enumerate().map(|(j, child)| {
                        let mut child_position = position.clone();
                        child_position.push(j);
                        (child_position, child)
                    }));
                }
                boundary = i + 1;
            }

            debug!(
                post,
                state = %State::GatherQuoteBlocks,
                pass,
                pieces = working.len(),
                blocks = blocks.len(),
                unpacked = unpacked.len(),
                "gather pass"
            );

            if unpacked.is_empty() {
                blocks.sort_by(|a, b| a.0.cmp(&b.0));
                return blocks.into_iter().map(|(_, block)| block).collect();
            }
            trace!(post, state = %State::FilterData, pass, pieces = unpacked.len(), "unpacked pieces filtered");
            working = unpacked;
        }
    }

    /// Peel wrappers off a block while it is a single element.
    fn strip_quote_block<'a>(&self, block: QuoteBlock<'a>) -> QuoteBlock<'a> {
        let mut block = self.filter_data(block);
        while let [piece @ Piece::Node(Fragment::Element(_))] = block.as_slice() {
            let inner = self.filter_data(piece.unpack());
            if inner.is_empty() {
                break;
            }
            block = inner;
        }
        block
    }

    /// Flatten a block to trimmed lines without block-quote markers.
    fn block_lines(&self, block: &[Piece<'_>]) -> Vec<String> {
        block
            .iter()
            .flat_map(|piece| self.flattener.flatten(piece))
            .map(|line| strip_blockquote_marker(&line).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Parse the flattened lines of one block: everything but the last line
    /// is the quote, the last line is the attribution.
    pub fn parse_lines(&self, lines: &[String]) -> Result<ParsedQuote, ParseFailure> {
        let Some((attribution, mut body)) = lines.split_last() else {
            return Err(ParseFailure::EmptyQuoteBody);
        };
        let (Some(first), Some(last)) = (body.first(), body.last()) else {
            return Err(ParseFailure::EmptyQuoteBody);
        };

        // Closing mark at the end but no opening mark up front: the block
        // starts with lead-in prose. Keep from the first line that opens a quote.
        if self.marks.ends_with_mark(last) && !self.marks.starts_with_mark(first) {
            let candidates = &body[..body.len() - 1];
            if let Some(start) = candidates.iter().position(|l| self.marks.starts_with_mark(l)) {
                body = &body[start..];
            }
        }

        let mut quote_lines = body.to_vec();
        quote_lines[0] = self.marks.strip_leading(&quote_lines[0]).trim().to_string();
        let end = quote_lines.len() - 1;
        quote_lines[end] = self.marks.strip_trailing(&quote_lines[end]).trim().to_string();

        let quote = quote_lines.join("\n");
        if quote.trim().is_empty() {
            return Err(ParseFailure::EmptyQuoteBody);
        }

        let rest = self
            .author_line
            .strip(attribution)
            .ok_or(ParseFailure::NoAttributionLine)?;
        let (author, title) = split_author_title(rest, &self.marks);

        Ok(ParsedQuote {
            quote,
            author,
            title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractorConfig, RenderConfig};
    use crate::diagnostics::CollectingSink;

    fn extractor() -> QuoteExtractor {
        QuoteExtractor::new(&ExtractorConfig::default(), MarkupFlattener::default()).unwrap()
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    fn quote(q: &str, author: &str, title: Option<&str>) -> ParsedQuote {
        ParsedQuote {
            quote: q.to_string(),
            author: author.to_string(),
            title: title.map(str::to_string),
        }
    }

    fn run(html: &str) -> (Vec<ParsedQuote>, Vec<Diagnostic>) {
        let root = Fragment::parse_html(html);
        let sink = CollectingSink::new();
        let quotes = extractor().extract("test post", &root, &sink);
        (quotes, sink.take())
    }

    #[test]
    fn attribution_with_title() {
        let q = extractor()
            .parse_lines(&lines(&["Hard knock life", "— Jay-Z, Hard Knock Life"]))
            .unwrap();
        assert_eq!(q.author, "Jay-Z");
        assert_eq!(q.title.as_deref(), Some("Hard Knock Life"));
    }

    #[test]
    fn author_only_attribution() {
        let q = extractor()
            .parse_lines(&lines(&["Take care of the people.", "-- Ben Horowitz"]))
            .unwrap();
        assert_eq!(q, quote("Take care of the people.", "Ben Horowitz", None));
    }

    #[test]
    fn strips_edge_quotation_marks() {
        let q = extractor()
            .parse_lines(&lines(&["“Started from the bottom”", "— Drake"]))
            .unwrap();
        assert_eq!(q.quote, "Started from the bottom");
    }

    #[test]
    fn discards_lead_in() {
        let q = extractor()
            .parse_lines(&lines(&[
                "Some intro.",
                "“Real quote starts here",
                "and ends here.”",
                "-- Author, Title",
            ]))
            .unwrap();
        assert_eq!(q, quote("Real quote starts here\nand ends here.", "Author", Some("Title")));
    }

    #[test]
    fn keeps_paragraphs_when_first_line_opens_the_quote() {
        let q = extractor()
            .parse_lines(&lines(&["“First paragraph.", "“Second paragraph.”", "— Someone"]))
            .unwrap();
        assert_eq!(q.quote, "First paragraph.\n“Second paragraph.");
    }

    #[test]
    fn markdown_italics_title() {
        let q = extractor()
            .parse_lines(&lines(&["The message", "— Grandmaster Flash, _The Message_"]))
            .unwrap();
        assert_eq!(q.title.as_deref(), Some("The Message"));
    }

    #[test]
    fn parse_failures() {
        let ex = extractor();
        assert_eq!(ex.parse_lines(&[]), Err(ParseFailure::EmptyQuoteBody));
        assert_eq!(ex.parse_lines(&lines(&["— Lonely"])), Err(ParseFailure::EmptyQuoteBody));
        assert_eq!(ex.parse_lines(&lines(&["”", "— Marks"])), Err(ParseFailure::EmptyQuoteBody));
        assert_eq!(
            ex.parse_lines(&lines(&["A quote", "Not an attribution"])),
            Err(ParseFailure::NoAttributionLine)
        );
    }

    #[test]
    fn quote_and_attribution_in_one_paragraph() {
        let (quotes, diagnostics) =
            run("<p>“Started from the bottom now we’re here”<br>— Drake, Started From the Bottom</p>");
        assert_eq!(
            quotes,
            vec![quote(
                "Started from the bottom now we’re here",
                "Drake",
                Some("Started From the Bottom")
            )]
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn attribution_only_fragment_closes_preceding_block() {
        let (quotes, _) = run(
            "<div>\
               <p>— First, One</p>\
               <p>“Line one</p><p>line two”</p><p>-- Second</p>\
               <p>Unrelated.</p>\
             </div>",
        );
        // The first attribution has no body of its own and yields nothing.
        assert_eq!(quotes, vec![quote("Line one\nline two", "Second", None)]);
    }

    #[test]
    fn blocks_do_not_reuse_the_previous_attribution() {
        let (quotes, _) = run(
            "<div><p>Body A</p><p>— A</p><p>Body B</p><p>— B, Song</p></div>",
        );
        assert_eq!(
            quotes,
            vec![quote("Body A", "A", None), quote("Body B", "B", Some("Song"))]
        );
    }

    #[test]
    fn blockquote_wrapped_quote() {
        let (quotes, _) = run(
            "<blockquote><p>“Hard knock life<br>for us”</p><p>— Jay-Z, <em>Hard Knock Life</em></p></blockquote>",
        );
        assert_eq!(
            quotes,
            vec![quote("Hard knock life\nfor us", "Jay-Z", Some("Hard Knock Life"))]
        );
    }

    #[test]
    fn blockquote_block_among_siblings_keeps_markers_out() {
        let (quotes, _) = run(
            "<div><p>Intro</p><blockquote>“Mo money<br>mo problems”<br>— The Notorious B.I.G.</blockquote></div>",
        );
        assert_eq!(quotes, vec![quote("Mo money\nmo problems", "The Notorious B.I.G.", None)]);
    }

    #[test]
    fn nested_blockquote() {
        let (quotes, diagnostics) = run(
            "<blockquote><blockquote>“Deep words”<br>— Nested Author</blockquote></blockquote>",
        );
        assert!(diagnostics.is_empty());
        assert_eq!(quotes, vec![quote("Deep words", "Nested Author", None)]);
    }

    #[test]
    fn nested_blockquote_among_siblings() {
        let (quotes, diagnostics) = run(
            "<div><p>Intro</p><blockquote><blockquote>“Deep<br>words”<br>— Nested Author, Track</blockquote></blockquote></div>",
        );
        assert!(diagnostics.is_empty());
        assert_eq!(quotes, vec![quote("Deep\nwords", "Nested Author", Some("Track"))]);
    }

    #[test]
    fn blocks_come_out_in_document_order() {
        // The first quote is only reached after two more unpacking passes.
        let (quotes, _) = run(
            "<div><div><p>“First”<br>— One<br>tail</p></div><p>“Second”<br>— Two</p></div>",
        );
        let authors: Vec<&str> = quotes.iter().map(|q| q.author.as_str()).collect();
        assert_eq!(authors, vec!["One", "Two"]);
    }

    #[test]
    fn inline_markup_stays_on_its_line() {
        let (quotes, _) = run(
            "<div><p>Wait, <a href=\"#\">what</a> did <em>you</em> say?<br>— Someone, Song</p><p>More text</p></div>",
        );
        assert_eq!(quotes, vec![quote("Wait, what did you say?", "Someone", Some("Song"))]);
    }

    #[test]
    fn mid_fragment_attribution_is_unpacked() {
        let (quotes, _) = run(
            "<div><p>“Quote one”<br>— One<br>“Quote two”<br>— Two, Track<br>trailing words</p></div>",
        );
        assert_eq!(
            quotes,
            vec![quote("Quote one", "One", None), quote("Quote two", "Two", Some("Track"))]
        );
    }

    #[test]
    fn deep_nesting_reaches_a_fixed_point() {
        let depth = 60;
        let html = format!(
            "{}<p>“Deep”<br>— Diver<br>after</p>{}",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        let (quotes, diagnostics) = run(&html);
        assert_eq!(quotes, vec![quote("Deep", "Diver", None)]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn noise_is_ignored() {
        let (quotes, _) = run(
            "<div>\
               <h2>Title — with a dash</h2>\
               <p class=\"byline\">— by the Author</p>\
               <div class=\"share-tools\">-- share</div>\
               <!-- — comment -->\
               <p>“Real”<br>— Real Author</p>\
             </div>",
        );
        assert_eq!(quotes, vec![quote("Real", "Real Author", None)]);
    }

    #[test]
    fn no_quote_case() {
        let (quotes, diagnostics) = run("<div><p>Just prose.</p><p>More prose.</p></div>");
        assert!(quotes.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].failure, ParseFailure::UnknownFormat);
        assert_eq!(diagnostics[0].state, State::GatherQuoteBlocks);
        assert_eq!(diagnostics[0].post, "test post");
    }

    #[test]
    fn failed_blocks_do_not_stop_siblings() {
        let (quotes, diagnostics) = run(
            "<div>\
               <div><p>“Q”</p><p>Body</p><h4>— Lost</h4></div>\
               <p>Fine</p><p>— Kept</p>\
             </div>",
        );
        assert_eq!(quotes, vec![quote("Fine", "Kept", None)]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].failure, ParseFailure::NoAttributionLine);
        assert_eq!(diagnostics[0].state, State::ParseQuote);
        assert_eq!(
            diagnostics[0].snapshot.as_deref(),
            Some(&["“Q”".to_string(), "Body".to_string()][..])
        );
    }

    #[test]
    fn lone_attribution_reports_empty_body() {
        let (quotes, diagnostics) = run("<div><p>— Lonely</p><p>x</p></div>");
        assert!(quotes.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].failure, ParseFailure::EmptyQuoteBody);
    }

    #[test]
    fn filtering_is_idempotent() {
        let root = Fragment::parse_html(
            "<h1>t</h1><p class=\"byline\">b</p><!-- c --><p> </p><p>keep</p> <span>too</span>",
        );
        let ex = extractor();
        let once = ex.filter_data(Piece::Node(&root).unpack());
        let twice = ex.filter_data(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn filter_drops_markup_that_renders_empty() {
        let root = Fragment::parse_html(
            "<script>var a = \"— Fake\";</script><style>p { color: red }</style><p>kept</p>",
        );
        let kept = extractor().filter_data(Piece::Node(&root).unpack());
        assert_eq!(kept.len(), 1);
        assert!(matches!(&kept[0], Piece::Node(Fragment::Element(e)) if e.name == "p"));
    }

    #[test]
    fn emphasis_markers_feed_title_stripping() {
        let flattener = MarkupFlattener::from_config(&RenderConfig {
            blockquote_markers: true,
            emphasis_markers: true,
        });
        let ex = QuoteExtractor::new(&ExtractorConfig::default(), flattener).unwrap();
        let root = Fragment::parse_html("<p>Broken glass everywhere<br>— Grandmaster Flash, <em>The Message</em></p>");
        let quotes = ex.extract("post", &root, &CollectingSink::new());
        assert_eq!(
            quotes,
            vec![quote("Broken glass everywhere", "Grandmaster Flash", Some("The Message"))]
        );
    }

    #[test]
    fn extractor_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QuoteExtractor>();
    }
}
