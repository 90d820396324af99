//! Tolerant parser for the Vasari markup vocabulary.
//!
//! Documents look like JSX without expressions:
//!
//! ```text
//! <View id="root" x={0} y={40}>
//!   <Rect fill style="#00000060" width={36} height={36} click="goBack" />
//!   <Event id="goBack">back</Event>
//! </View>
//! ```
//!
//! The parser never fails. Attributes are kept as the raw source string so
//! the runtime can apply its own extraction rules; unclosed elements are
//! closed at end of input and stray closing tags are ignored. `Event` and
//! `Declare` bodies are raw text (markup inside them is not interpreted).

use ego_tree::{NodeId, NodeRef, Tree};

/// Tags whose content is captured verbatim up to the matching close tag.
const RAW_TEXT_TAGS: &[&str] = &["event", "declare"];

/// One node of a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    /// Synthetic container at the root of every tree.
    Fragment,
    Element(Element),
    Text(String),
}

/// An element with its tag name as written and its raw attribute source.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub raw_attributes: String,
}

impl Element {
    pub fn tag_upper(&self) -> String {
        self.tag.to_ascii_uppercase()
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }
}

impl MarkupNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            MarkupNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MarkupNode::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Arena-backed document tree. Parent links are traversal-only.
#[derive(Debug, Clone)]
pub struct MarkupTree {
    tree: Tree<MarkupNode>,
}

/// Parse a document into a tree.
pub fn parse(source: &str) -> MarkupTree {
    Parser::new(source).run()
}

impl MarkupTree {
    /// The synthetic fragment holding all top-level nodes.
    pub fn fragment(&self) -> NodeRef<'_, MarkupNode> {
        self.tree.root()
    }

    /// The first top-level element, which the runtime renders as the document root.
    pub fn root_element(&self) -> Option<NodeRef<'_, MarkupNode>> {
        self.tree
            .root()
            .children()
            .find(|child| matches!(child.value(), MarkupNode::Element(_)))
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_, MarkupNode>> {
        self.tree.get(id)
    }

    /// Iterate every element in document order.
    pub fn elements(&self) -> impl Iterator<Item = NodeRef<'_, MarkupNode>> {
        self.tree
            .root()
            .descendants()
            .filter(|node| matches!(node.value(), MarkupNode::Element(_)))
    }

    /// Detach every element whose tag matches one of `tags` (case-insensitive),
    /// together with its subtree. Returns how many elements were removed.
    pub fn strip_elements(&mut self, tags: &[&str]) -> usize {
        let doomed: Vec<NodeId> = self
            .elements()
            .filter(|node| {
                node.value()
                    .as_element()
                    .is_some_and(|el| tags.iter().any(|tag| el.is(tag)))
            })
            .map(|node| node.id())
            .collect();
        let mut removed = 0;
        for id in doomed {
            if let Some(mut node) = self.tree.get_mut(id) {
                node.detach();
                removed += 1;
            }
        }
        removed
    }

    /// Serialize the tree back to markup.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for child in self.tree.root().children() {
            write_node(child, &mut out);
        }
        out
    }
}

/// Concatenated text of a node's direct text children.
pub fn text_content(node: NodeRef<'_, MarkupNode>) -> String {
    let mut text = String::new();
    for child in node.children() {
        if let MarkupNode::Text(chunk) = child.value() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(chunk);
        }
    }
    text
}

fn write_node(node: NodeRef<'_, MarkupNode>, out: &mut String) {
    match node.value() {
        MarkupNode::Fragment => {
            for child in node.children() {
                write_node(child, out);
            }
        }
        MarkupNode::Text(text) => out.push_str(text),
        MarkupNode::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            if !el.raw_attributes.is_empty() {
                out.push(' ');
                out.push_str(&el.raw_attributes);
            }
            if node.has_children() {
                out.push('>');
                for child in node.children() {
                    write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            } else {
                out.push_str(" />");
            }
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    tree: Tree<MarkupNode>,
    stack: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        let tree = Tree::new(MarkupNode::Fragment);
        let root = tree.root().id();
        Self {
            src,
            pos: 0,
            tree,
            stack: vec![root],
        }
    }

    fn run(mut self) -> MarkupTree {
        let src = self.src;
        while self.pos < src.len() {
            let rest = &src[self.pos..];
            let Some(lt) = rest.find('<') else {
                self.push_text(rest);
                break;
            };
            if lt > 0 {
                self.push_text(&rest[..lt]);
            }
            self.pos += lt;
            self.markup();
        }
        if self.stack.len() > 1 {
            tracing::debug!(open = self.stack.len() - 1, "markup: closing unterminated elements at end of input");
        }
        MarkupTree { tree: self.tree }
    }

    /// Consume one construct starting at `<`.
    fn markup(&mut self) {
        let src = self.src;
        let rest = &src[self.pos..];
        if let Some(comment) = rest.strip_prefix("<!--") {
            let skip = comment.find("-->").map_or(rest.len(), |end| 4 + end + 3);
            self.pos += skip;
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            let skip = rest.find('>').map_or(rest.len(), |end| end + 1);
            self.pos += skip;
        } else if let Some(close) = rest.strip_prefix("</") {
            let end = close.find('>').unwrap_or(close.len());
            let name = close[..end].trim();
            self.close(name);
            self.pos += 2 + (end + 1).min(close.len());
        } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            self.open_tag();
        } else {
            self.push_text("<");
            self.pos += 1;
        }
    }

    fn open_tag(&mut self) {
        let src = self.src;
        let start = self.pos + 1;
        let bytes = src.as_bytes();
        let mut i = start;
        while i < bytes.len() && !matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>') {
            i += 1;
        }
        let tag = src[start..i].to_string();

        // Attribute region ends at the first `>` outside quotes and braces.
        let attr_start = i;
        let mut quote: Option<u8> = None;
        let mut depth = 0usize;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None => match b {
                    b'"' | b'\'' => quote = Some(b),
                    b'{' => depth += 1,
                    b'}' => depth = depth.saturating_sub(1),
                    b'>' if depth == 0 => break,
                    _ => {}
                },
            }
            i += 1;
        }
        let mut raw = src[attr_start..i].trim();
        let self_closing = raw.ends_with('/');
        if self_closing {
            raw = raw[..raw.len() - 1].trim_end();
        }
        self.pos = (i + 1).min(src.len());

        let element = MarkupNode::Element(Element {
            tag: tag.clone(),
            raw_attributes: raw.to_string(),
        });
        let parent = self.current();
        let Some(id) = self.tree.get_mut(parent).map(|mut p| p.append(element).id()) else {
            return;
        };
        if self_closing {
            return;
        }
        if RAW_TEXT_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t)) {
            self.raw_text_body(id, &tag);
        } else {
            self.stack.push(id);
        }
    }

    /// Capture everything up to `</tag>` as a single text child.
    fn raw_text_body(&mut self, id: NodeId, tag: &str) {
        let src = self.src;
        let rest = &src[self.pos..];
        let lower = rest.to_ascii_lowercase();
        let needle = format!("</{}", tag.to_ascii_lowercase());
        let (body, consumed) = match lower.find(&needle) {
            Some(end) => {
                let after = rest[end..].find('>').map_or(rest.len(), |gt| end + gt + 1);
                (&rest[..end], after)
            }
            None => (rest, rest.len()),
        };
        let body = body.trim();
        if !body.is_empty() {
            if let Some(mut node) = self.tree.get_mut(id) {
                node.append(MarkupNode::Text(body.to_string()));
            }
        }
        self.pos += consumed;
    }

    fn close(&mut self, name: &str) {
        // Never pop the fragment.
        let found = self.stack.iter().skip(1).rposition(|id| {
            self.tree
                .get(*id)
                .and_then(|node| node.value().as_element().map(|el| el.is(name)))
                .unwrap_or(false)
        });
        match found {
            Some(index) => self.stack.truncate(index + 1),
            None => tracing::debug!(tag = name, "markup: ignoring stray closing tag"),
        }
    }

    fn push_text(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        let parent = self.current();
        if let Some(mut node) = self.tree.get_mut(parent) {
            node.append(MarkupNode::Text(trimmed.to_string()));
        }
    }

    fn current(&self) -> NodeId {
        // The fragment id is pushed in `new` and never popped.
        *self.stack.last().unwrap_or(&self.tree.root().id())
    }
}
