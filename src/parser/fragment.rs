use scraper::node::Node;
use scraper::{ElementRef, Html};

/// Elements that start and end on their own line when rendered.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "html", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "th", "thead", "tr", "ul",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Element(Element),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub classes: Vec<String>,
    pub children: Vec<Fragment>,
}

impl Element {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// `h1` through `h9`.
    pub fn is_heading(&self) -> bool {
        let mut chars = self.name.chars();
        chars.next() == Some('h') && matches!(chars.next(), Some('1'..='9'))
    }

    pub fn is_block(&self) -> bool {
        BLOCK_ELEMENTS.contains(&self.name.as_str())
    }
}

impl Fragment {
    /// Convert a parsed element subtree. Doctypes and processing
    /// instructions are dropped; everything else keeps document order.
    pub fn from_element(element: ElementRef<'_>) -> Self {
        let children = element
            .children()
            .filter_map(|child| match child.value() {
                Node::Text(text) => Some(Fragment::Text(String::from(&**text))),
                Node::Comment(comment) => Some(Fragment::Comment(String::from(&**comment))),
                Node::Element(_) => ElementRef::wrap(child).map(Fragment::from_element),
                _ => None,
            })
            .collect();

        Fragment::Element(Element {
            name: element.value().name().to_ascii_lowercase(),
            classes: element.value().classes().map(str::to_string).collect(),
            children,
        })
    }

    /// Parse a markup snippet. The result is the `html` wrapper element the
    /// HTML parser puts around fragment content.
    pub fn parse_html(html: &str) -> Self {
        let document = Html::parse_fragment(html);
        Fragment::from_element(document.root_element())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Fragment::Element(element) => Some(element),
            _ => None,
        }
    }

    fn is_line_break(&self) -> bool {
        matches!(self, Fragment::Element(element) if element.name == "br")
    }

    fn is_block(&self) -> bool {
        matches!(self, Fragment::Element(element) if element.is_block())
    }
}

/// One entry of a working list or quote block: either a single node, or a
/// run of inline siblings (text, links, emphasis) that render onto the same
/// line and must be flattened together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece<'a> {
    Node(&'a Fragment),
    Run(Vec<&'a Fragment>),
}

impl<'a> Piece<'a> {
    pub fn fragments(&self) -> &[&'a Fragment] {
        match self {
            Piece::Node(fragment) => std::slice::from_ref(fragment),
            Piece::Run(members) => members,
        }
    }

    /// Replace this piece with the next structural layer down. Text and
    /// comments have nothing below them.
    pub fn unpack(&self) -> Vec<Piece<'a>> {
        match self {
            Piece::Node(fragment) => match *fragment {
                Fragment::Element(element) => group_children(&element.children),
                _ => Vec::new(),
            },
            Piece::Run(members) => members.iter().map(|&member| Piece::Node(member)).collect(),
        }
    }
}

/// Split an element's children into pieces. Block-level children stand
/// alone, `<br>` ends the current inline run, comments are skipped.
pub fn group_children(children: &[Fragment]) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut run: Vec<&Fragment> = Vec::new();

    for child in children {
        match child {
            Fragment::Comment(_) => {}
            _ if child.is_line_break() => flush_run(&mut run, &mut pieces),
            _ if child.is_block() => {
                flush_run(&mut run, &mut pieces);
                pieces.push(Piece::Node(child));
            }
            _ => run.push(child),
        }
    }
    flush_run(&mut run, &mut pieces);

    pieces
}

fn flush_run<'a>(run: &mut Vec<&'a Fragment>, pieces: &mut Vec<Piece<'a>>) {
    match run.len() {
        0 => {}
        1 => pieces.push(Piece::Node(run[0])),
        _ => pieces.push(Piece::Run(std::mem::take(run))),
    }
    run.clear();
}
