use crate::config::RenderConfig;

use super::fragment::{Element, Fragment, Piece};

/// Content of these elements is never visible text.
const SKIPPED_ELEMENTS: &[&str] = &[
    "head", "iframe", "noscript", "script", "style", "svg", "template", "title",
];

/// Markup-to-text converter. Output uses `\n` for every line break the
/// markup implies; link targets are never rendered.
pub trait Renderer: Send + Sync {
    fn render(&self, fragments: &[&Fragment]) -> String;
}

/// Default converter: browser-like whitespace collapsing with block-level
/// layout folded into newlines.
#[derive(Debug, Clone, Default)]
pub struct BlockRenderer {
    blockquote_markers: bool,
    emphasis_markers: bool,
}

impl BlockRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        BlockRenderer {
            blockquote_markers: config.blockquote_markers,
            emphasis_markers: config.emphasis_markers,
        }
    }

    fn render_node(&self, fragment: &Fragment, out: &mut TextBuffer) {
        match fragment {
            Fragment::Text(text) => out.push_text(text),
            Fragment::Comment(_) => {}
            Fragment::Element(element) => self.render_element(element, out),
        }
    }

    fn render_element(&self, element: &Element, out: &mut TextBuffer) {
        match element.name.as_str() {
            name if SKIPPED_ELEMENTS.contains(&name) => {}
            "br" => out.line_break(),
            "blockquote" => {
                let mut inner = TextBuffer::default();
                self.render_children(&element.children, &mut inner);
                out.block_break();
                for line in inner.out.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    if self.blockquote_markers {
                        out.push_line(&format!("> {}", line));
                    } else {
                        out.push_line(line);
                    }
                }
            }
            "em" | "i" if self.emphasis_markers => {
                out.push_text("_");
                self.render_children(&element.children, out);
                out.push_text("_");
            }
            _ if element.is_block() => {
                out.block_break();
                self.render_children(&element.children, out);
                out.block_break();
            }
            _ => self.render_children(&element.children, out),
        }
    }

    fn render_children(&self, children: &[Fragment], out: &mut TextBuffer) {
        for child in children {
            self.render_node(child, out);
        }
    }
}

impl Renderer for BlockRenderer {
    fn render(&self, fragments: &[&Fragment]) -> String {
        let mut out = TextBuffer::default();
        for fragment in fragments {
            self.render_node(fragment, &mut out);
        }
        out.out
    }
}

#[derive(Default)]
struct TextBuffer {
    out: String,
    pending_space: bool,
}

impl TextBuffer {
    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    /// Whitespace runs collapse to one space, dropped at line starts.
    fn push_text(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            if self.pending_space && !self.at_line_start() {
                self.out.push(' ');
            }
            self.pending_space = false;
            self.out.push(c);
        }
    }

    fn push_line(&mut self, line: &str) {
        self.block_break();
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn line_break(&mut self) {
        self.out.push('\n');
        self.pending_space = false;
    }

    fn block_break(&mut self) {
        if !self.at_line_start() {
            self.out.push('\n');
        }
        self.pending_space = false;
    }
}

/// Turns fragments into trimmed, non-empty text lines through a pluggable
/// [`Renderer`].
pub struct MarkupFlattener {
    renderer: Box<dyn Renderer>,
}

impl MarkupFlattener {
    pub fn new(renderer: impl Renderer + 'static) -> Self {
        MarkupFlattener {
            renderer: Box::new(renderer),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        MarkupFlattener::new(BlockRenderer::new(config))
    }

    pub fn flatten(&self, piece: &Piece<'_>) -> Vec<String> {
        split_lines(&self.renderer.render(piece.fragments()))
    }

    pub fn flatten_fragment(&self, fragment: &Fragment) -> Vec<String> {
        split_lines(&self.renderer.render(&[fragment]))
    }

    pub fn flatten_str(&self, text: &str) -> Vec<String> {
        split_lines(text)
    }
}

impl Default for MarkupFlattener {
    fn default() -> Self {
        MarkupFlattener::from_config(&RenderConfig::default())
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
