//! HTML parsing (structured HTML → Comrak AST)
//!
//! Parses the fragment a rich-text widget hands back with `html5ever`, then walks the RcDom and
//! builds the equivalent Comrak tree. Markdown is stricter than HTML about what may contain
//! what, so the walk keeps two modes:
//! - block mode: elements become block nodes; loose inline content is gathered into an
//!   implicit paragraph (widgets often emit text directly inside `<li>` or `<div>`),
//! - inline mode: formatting elements become inline nodes; block elements met here are
//!   unwrapped and only their content is kept.
//!
//! Anything not recognised is transparent: its children are processed in place.

use comrak::nodes::{
    Ast, AstNode, ListDelimType, ListType, NodeCode, NodeCodeBlock, NodeHeading, NodeLink,
    NodeList, NodeTable, NodeValue, TableAlignment,
};
use comrak::Arena;
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::cell::RefCell;

/// Elements handled in block mode.
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "center",
    "dd",
    "details",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "html",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "summary",
    "table",
    "ul",
];

/// Elements whose content is never document text.
const IGNORED_TAGS: &[&str] = &[
    "head", "link", "meta", "script", "style", "template", "title",
];

/// Parse an HTML fragment into a DOM. HTML parsing never fails; malformed input is repaired.
pub fn parse_html(html: &str) -> RcDom {
    parse_document(RcDom::default(), ParseOpts::default()).one(html)
}

/// The `<body>` element of a parsed document.
pub fn find_body(dom: &RcDom) -> Option<Handle> {
    find_element(&dom.document, "body")
}

fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if element_name(handle) == Some(tag) {
        return Some(handle.clone());
    }
    for child in handle.children.borrow().iter() {
        if let Some(found) = find_element(child, tag) {
            return Some(found);
        }
    }
    None
}

fn element_name(handle: &Handle) -> Option<&str> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

fn attr(handle: &Handle, key: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attribute| &*attribute.name.local == key)
            .map(|attribute| attribute.value.to_string()),
        _ => None,
    }
}

/// Concatenated text of a subtree, `<br>` as newline.
fn text_content(handle: &Handle) -> String {
    let mut output = String::new();
    collect_text(handle, &mut output);
    output
}

fn collect_text(handle: &Handle, output: &mut String) {
    match &handle.data {
        NodeData::Text { contents } => output.push_str(&contents.borrow()),
        NodeData::Element { name, .. } if &*name.local == "br" => output.push('\n'),
        NodeData::Element { name, .. } if IGNORED_TAGS.contains(&&*name.local) => {}
        _ => {
            for child in handle.children.borrow().iter() {
                collect_text(child, output);
            }
        }
    }
}

/// Text nodes and attribute values of a document, one element boundary per line.
///
/// Names of tags and attributes, comments and doctypes are left out, so a string found
/// here is something a reader or a link target carries, not markup.
pub fn content_text(html: &str) -> String {
    let dom = parse_html(html);
    let mut output = String::new();
    collect_content(&dom.document, &mut output);
    output
}

fn collect_content(handle: &Handle, output: &mut String) {
    match &handle.data {
        NodeData::Text { contents } => output.push_str(&contents.borrow()),
        NodeData::Element { attrs, .. } => {
            for attribute in attrs.borrow().iter() {
                output.push('\n');
                output.push_str(&attribute.value);
            }
            output.push('\n');
            for child in handle.children.borrow().iter() {
                collect_content(child, output);
            }
            output.push('\n');
        }
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                collect_content(child, output);
            }
        }
        _ => {}
    }
}

/// Plain text of a subtree with blocks separated by blank lines.
///
/// Used when the structured form cannot be turned into markdown.
pub fn plain_text(handle: &Handle) -> String {
    let mut output = String::new();
    collect_plain(handle, &mut output);
    let mut text = output
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

fn collect_plain(handle: &Handle, output: &mut String) {
    match &handle.data {
        NodeData::Text { contents } => output.push_str(&contents.borrow()),
        NodeData::Element { name, .. } => {
            let tag: &str = &name.local;
            if IGNORED_TAGS.contains(&tag) {
                return;
            }
            if tag == "br" {
                output.push('\n');
                return;
            }
            let block = BLOCK_TAGS.contains(&tag);
            if block {
                output.push_str("\n\n");
            }
            for child in handle.children.borrow().iter() {
                collect_plain(child, output);
            }
            if block {
                output.push_str("\n\n");
            }
        }
        _ => {
            for child in handle.children.borrow().iter() {
                collect_plain(child, output);
            }
        }
    }
}

/// Builds a Comrak document tree from an HTML DOM
pub struct AstBuilder<'a> {
    arena: &'a Arena<AstNode<'a>>,
}

impl<'a> AstBuilder<'a> {
    pub fn new(arena: &'a Arena<AstNode<'a>>) -> Self {
        Self { arena }
    }

    /// Build the Comrak document for the children of `body`.
    pub fn build(&self, body: &Handle) -> &'a AstNode<'a> {
        let root = self.alloc(NodeValue::Document);
        self.blocks(root, body);
        root
    }

    fn alloc(&self, value: NodeValue) -> &'a AstNode<'a> {
        self.arena
            .alloc(AstNode::new(RefCell::new(Ast::new(value, (0, 0).into()))))
    }

    /// Children of `handle` in block mode.
    fn blocks(&self, parent: &'a AstNode<'a>, handle: &Handle) {
        let mut paragraph: Option<&'a AstNode<'a>> = None;

        for child in handle.children.borrow().iter() {
            match &child.data {
                NodeData::Element { name, .. } if IGNORED_TAGS.contains(&&*name.local) => {}
                NodeData::Element { name, .. } if BLOCK_TAGS.contains(&&*name.local) => {
                    if let Some(open) = paragraph.take() {
                        close_paragraph(open);
                    }
                    self.block(parent, child, &name.local);
                }
                NodeData::Element { .. } => {
                    let open = *paragraph.get_or_insert_with(|| self.open_paragraph(parent));
                    self.inline(open, child);
                }
                NodeData::Text { contents } => {
                    let contents = contents.borrow();
                    if paragraph.is_none() && is_blank(&contents) {
                        continue;
                    }
                    let open = *paragraph.get_or_insert_with(|| self.open_paragraph(parent));
                    self.text(open, &contents);
                }
                _ => {}
            }
        }

        if let Some(open) = paragraph {
            close_paragraph(open);
        }
    }

    fn open_paragraph(&self, parent: &'a AstNode<'a>) -> &'a AstNode<'a> {
        let paragraph = self.alloc(NodeValue::Paragraph);
        parent.append(paragraph);
        paragraph
    }

    fn block(&self, parent: &'a AstNode<'a>, handle: &Handle, tag: &str) {
        match tag {
            "p" => {
                let paragraph = self.open_paragraph(parent);
                self.inline_children(paragraph, handle);
                close_paragraph(paragraph);
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<u8>().unwrap_or(1);
                let heading = self.alloc(NodeValue::Heading(NodeHeading {
                    level,
                    setext: false,
                }));
                parent.append(heading);
                self.inline_children(heading, handle);
                close_paragraph(heading);
            }
            "ul" => self.list(parent, handle, false),
            "ol" => self.list(parent, handle, true),
            "blockquote" => {
                let quote = self.alloc(NodeValue::BlockQuote);
                parent.append(quote);
                self.blocks(quote, handle);
                if quote.first_child().is_none() {
                    quote.detach();
                }
            }
            "pre" => self.code_block(parent, handle),
            "hr" => parent.append(self.alloc(NodeValue::ThematicBreak)),
            "table" => self.table(parent, handle),
            _ => self.blocks(parent, handle),
        }
    }

    fn list(&self, parent: &'a AstNode<'a>, handle: &Handle, ordered: bool) {
        let items: Vec<Handle> = handle
            .children
            .borrow()
            .iter()
            .filter(|child| element_name(child) == Some("li"))
            .cloned()
            .collect();

        // Quill writes bullet lists as <ol> with data-list="bullet" on every item
        let bullets_in_ol = ordered
            && !items.is_empty()
            && items
                .iter()
                .all(|item| attr(item, "data-list").as_deref() == Some("bullet"));
        let ordered = ordered && !bullets_in_ol;

        let start = if ordered {
            attr(handle, "start")
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(1)
        } else {
            1
        };
        let make_list = || NodeList {
            list_type: if ordered {
                ListType::Ordered
            } else {
                ListType::Bullet
            },
            marker_offset: 0,
            padding: 0,
            start,
            delimiter: ListDelimType::Period,
            bullet_char: b'-',
            tight: true,
        };

        let list = self.alloc(NodeValue::List(make_list()));
        parent.append(list);

        for child in handle.children.borrow().iter() {
            match element_name(child) {
                Some("li") => {
                    let item = self.alloc(NodeValue::Item(make_list()));
                    list.append(item);
                    self.blocks(item, child);
                }
                Some("ul") | Some("ol") => {
                    // Sub-list written as a sibling of <li>: hang it off the previous item
                    let item = match list.last_child() {
                        Some(last) => last,
                        None => {
                            let item = self.alloc(NodeValue::Item(make_list()));
                            list.append(item);
                            item
                        }
                    };
                    self.list(item, child, element_name(child) == Some("ol"));
                }
                _ => {}
            }
        }

        if list.first_child().is_none() {
            list.detach();
        }
    }

    fn code_block(&self, parent: &'a AstNode<'a>, handle: &Handle) {
        let mut literal = text_content(handle);
        if !literal.ends_with('\n') {
            literal.push('\n');
        }

        let info = handle
            .children
            .borrow()
            .iter()
            .find(|child| element_name(child) == Some("code"))
            .and_then(|code| attr(code, "class"))
            .and_then(|class| {
                class
                    .split_whitespace()
                    .find_map(|name| name.strip_prefix("language-").map(str::to_string))
            })
            .unwrap_or_default();

        parent.append(self.alloc(NodeValue::CodeBlock(NodeCodeBlock {
            fenced: true,
            fence_char: b'`',
            fence_length: 3,
            fence_offset: 0,
            info,
            literal,
        })));
    }

    fn table(&self, parent: &'a AstNode<'a>, handle: &Handle) {
        let mut rows = Vec::new();
        collect_rows(handle, &mut rows);

        let grid: Vec<Vec<Handle>> = rows
            .iter()
            .map(|row| {
                row.children
                    .borrow()
                    .iter()
                    .filter(|cell| matches!(element_name(cell), Some("td") | Some("th")))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .filter(|cells| !cells.is_empty())
            .collect();

        let columns = grid.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }

        let table = self.alloc(NodeValue::Table(NodeTable {
            alignments: vec![TableAlignment::None; columns],
            num_columns: columns,
            num_rows: grid.len(),
            num_nonempty_cells: 0,
        }));
        parent.append(table);

        let mut nonempty = 0;
        for (index, cells) in grid.iter().enumerate() {
            let row = self.alloc(NodeValue::TableRow(index == 0));
            table.append(row);
            for column in 0..columns {
                let cell = self.alloc(NodeValue::TableCell);
                row.append(cell);
                if let Some(source) = cells.get(column) {
                    self.inline_children(cell, source);
                    flatten_breaks(cell);
                    trim_edges(cell);
                    if cell.first_child().is_some() {
                        nonempty += 1;
                    }
                }
            }
        }

        if let NodeValue::Table(ref mut node) = table.data.borrow_mut().value {
            node.num_nonempty_cells = nonempty;
        }
    }

    fn inline_children(&self, parent: &'a AstNode<'a>, handle: &Handle) {
        for child in handle.children.borrow().iter() {
            self.inline(parent, child);
        }
    }

    /// One node in inline mode.
    fn inline(&self, parent: &'a AstNode<'a>, handle: &Handle) {
        match &handle.data {
            NodeData::Text { contents } => self.text(parent, &contents.borrow()),
            NodeData::Element { name, .. } => match &*name.local {
                "strong" | "b" => self.wrap(parent, handle, NodeValue::Strong),
                "em" | "i" => self.wrap(parent, handle, NodeValue::Emph),
                "s" | "del" | "strike" => self.wrap(parent, handle, NodeValue::Strikethrough),
                "code" => {
                    let literal = text_content(handle);
                    if !literal.is_empty() {
                        parent.append(self.alloc(NodeValue::Code(NodeCode {
                            num_backticks: 1,
                            literal,
                        })));
                    }
                }
                "a" => match attr(handle, "href").filter(|href| !href.is_empty()) {
                    // Kept even without text: the target may be all that is left of it
                    Some(url) => {
                        let title = attr(handle, "title").unwrap_or_default();
                        let link = self.alloc(NodeValue::Link(NodeLink { url, title }));
                        parent.append(link);
                        self.inline_children(link, handle);
                    }
                    None => self.inline_children(parent, handle),
                },
                "img" => {
                    let Some(url) = attr(handle, "src") else {
                        return;
                    };
                    let title = attr(handle, "title").unwrap_or_default();
                    let image = self.alloc(NodeValue::Image(NodeLink { url, title }));
                    parent.append(image);
                    let alt = attr(handle, "alt").unwrap_or_default();
                    if !alt.is_empty() {
                        image.append(self.alloc(NodeValue::Text(alt)));
                    }
                }
                "br" => parent.append(self.alloc(NodeValue::LineBreak)),
                tag if IGNORED_TAGS.contains(&tag) => {}
                _ => self.inline_children(parent, handle),
            },
            _ => {}
        }
    }

    fn wrap(&self, parent: &'a AstNode<'a>, handle: &Handle, value: NodeValue) {
        let node = self.alloc(value);
        parent.append(node);
        self.inline_children(node, handle);
        if node.first_child().is_none() {
            node.detach();
        }
    }

    /// Text with HTML whitespace rules: runs collapse to one space, newlines become soft breaks.
    fn text(&self, parent: &'a AstNode<'a>, raw: &str) {
        for (index, line) in raw.split('\n').enumerate() {
            if index > 0 {
                parent.append(self.alloc(NodeValue::SoftBreak));
            }
            let collapsed = collapse_whitespace(line);
            if !collapsed.is_empty() {
                parent.append(self.alloc(NodeValue::Text(collapsed)));
            }
        }
    }
}

fn collect_rows(handle: &Handle, rows: &mut Vec<Handle>) {
    for child in handle.children.borrow().iter() {
        match element_name(child) {
            Some("tr") => rows.push(child.clone()),
            Some("thead") | Some("tbody") | Some("tfoot") => collect_rows(child, rows),
            _ => {}
        }
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_whitespace())
}

fn collapse_whitespace(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                output.push(' ');
            }
            in_space = true;
        } else {
            output.push(c);
            in_space = false;
        }
    }
    output
}

/// Trim edge breaks and whitespace, and drop the node if nothing is left.
fn close_paragraph(node: &AstNode<'_>) {
    trim_edges(node);
    if node.first_child().is_none() {
        node.detach();
    }
}

fn trim_edges(node: &AstNode<'_>) {
    while let Some(first) = node.first_child() {
        if trim_text_node(first, str::trim_start) {
            first.detach();
        } else {
            break;
        }
    }
    while let Some(last) = node.last_child() {
        if trim_text_node(last, str::trim_end) {
            last.detach();
        } else {
            break;
        }
    }
}

/// Trims a text node in place; true when the node should be removed.
fn trim_text_node(node: &AstNode<'_>, trim: fn(&str) -> &str) -> bool {
    let mut data = node.data.borrow_mut();
    match data.value {
        NodeValue::SoftBreak | NodeValue::LineBreak => true,
        NodeValue::Text(ref mut text) => {
            let trimmed = trim(text).to_string();
            *text = trimmed;
            text.is_empty()
        }
        _ => false,
    }
}

/// Table cells live on one markdown line.
fn flatten_breaks<'a>(node: &'a AstNode<'a>) {
    for descendant in node.descendants() {
        let mut data = descendant.data.borrow_mut();
        if matches!(data.value, NodeValue::SoftBreak | NodeValue::LineBreak) {
            data.value = NodeValue::Text(" ".to_string());
        }
    }
}
