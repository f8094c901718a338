//! Navigation tree module.
//!
//! The table of contents is a typed, arena-backed tree built once at startup
//! and immutable afterwards. Only render-time annotations (active/expanded)
//! change between pages, and those live in the sidebar widget, never here.
//!
//! Trees come from two channels: the [`TocBuilder`] for programmatic
//! construction, and [`Toc::from_summary`] which walks an mdBook `SUMMARY.md`
//! with pulldown-cmark.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Opaque identifier of a node within its [`Toc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// A single navigation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocNode {
    /// Display label. Empty for spacers.
    pub label: String,
    /// Book-relative target path (e.g. `05-led-roulette/build-it.html`).
    /// `None` for draft chapters and spacers.
    pub target: Option<String>,
    /// Rendered section number with trailing dot (e.g. `5.4.`).
    /// `None` for affix items and spacers.
    pub number: Option<String>,
    /// Pinned outside the numbered chapter hierarchy (introduction,
    /// appendices).
    pub affix: bool,
    /// Visual separator between chapter groups.
    pub spacer: bool,
    /// Child entries, in document order.
    pub children: Vec<NodeId>,
    /// Enclosing chapter, `None` for top-level items.
    pub parent: Option<NodeId>,
}

impl TocNode {
    fn leaf(label: String, target: Option<String>) -> Self {
        Self {
            label,
            target,
            number: None,
            affix: false,
            spacer: false,
            children: Vec::new(),
            parent: None,
        }
    }
}

/// The navigation tree: an ordered arena of [`TocNode`]s.
///
/// Node storage order is document order (parents precede children, siblings
/// are in source order), so iteration is a plain index scan.
#[derive(Debug, Clone)]
pub struct Toc {
    nodes: Vec<TocNode>,
    roots: Vec<NodeId>,
    title: Option<String>,
}

impl Toc {
    pub fn node(&self, id: NodeId) -> &TocNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level items in document order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Book title taken from the summary's heading, if there was one.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// All nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TocNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Nodes that carry a target, in document order. This is the order the
    /// active-entry scan walks.
    pub fn links(&self) -> impl Iterator<Item = (NodeId, &str)> {
        self.iter()
            .filter_map(|(id, n)| n.target.as_deref().map(|t| (id, t)))
    }

    /// Walk from `id`'s parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            toc: self,
            next: self.node(id).parent,
        }
    }

    /// Build a tree from mdBook `SUMMARY.md` source.
    ///
    /// Links outside any list become affix items (prefix chapters before the
    /// first list, suffix chapters after it), list items become numbered
    /// chapters with nesting, `---` rules become spacers, and links with an
    /// empty destination become draft chapters without a target.
    pub fn from_summary(source: &str) -> Toc {
        let mut builder = TocBuilder::new();

        let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
        let parser = Parser::new_ext(source, options);

        let mut list_depth: usize = 0;
        let mut in_link: Option<String> = None; // destination
        let mut link_text = String::new();
        let mut in_heading = false;
        let mut heading_text = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::List(_)) => {
                    if list_depth > 0 {
                        builder.begin_section();
                    }
                    list_depth += 1;
                }
                Event::End(TagEnd::List(_)) => {
                    list_depth = list_depth.saturating_sub(1);
                    if list_depth > 0 {
                        builder.end_section();
                    }
                }
                Event::Start(Tag::Link { dest_url, .. }) => {
                    in_link = Some(dest_url.to_string());
                    link_text.clear();
                }
                Event::End(TagEnd::Link) => {
                    if let Some(dest) = in_link.take() {
                        let label = link_text.trim().to_owned();
                        let target = page_target(&dest);
                        if list_depth == 0 {
                            builder.push_affix(label, target);
                        } else {
                            builder.push_entry(label, target);
                        }
                    }
                }
                Event::Start(Tag::Heading { .. }) => {
                    in_heading = true;
                    heading_text.clear();
                }
                Event::End(TagEnd::Heading(_)) => {
                    in_heading = false;
                    if builder.title.is_none() && !heading_text.trim().is_empty() {
                        builder.title = Some(heading_text.trim().to_owned());
                    }
                }
                Event::Rule => {
                    if list_depth == 0 {
                        builder.push_spacer();
                    }
                }
                Event::Text(text) | Event::Code(text) => {
                    if in_link.is_some() {
                        link_text.push_str(&text);
                    } else if in_heading {
                        heading_text.push_str(&text);
                    }
                }
                _ => {}
            }
        }

        builder.build()
    }
}

/// Iterator over a node's ancestors, nearest first.
pub struct Ancestors<'a> {
    toc: &'a Toc,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.toc.node(current).parent;
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Incremental [`Toc`] construction.
///
/// Numbered entries are auto-numbered from their nesting position; affix
/// items and spacers stay unnumbered. `begin_section` opens a child section
/// under the most recently pushed entry at the current depth.
pub struct TocBuilder {
    nodes: Vec<TocNode>,
    roots: Vec<NodeId>,
    /// Open sections: the anchor entry each one hangs off. `None` when a
    /// section had no preceding entry to attach to.
    open: Vec<Option<NodeId>>,
    /// Numbering counters, one per open depth plus the top level.
    counters: Vec<u64>,
    /// Last entry pushed at each depth, the anchor for `begin_section`.
    last_at_depth: Vec<Option<NodeId>>,
    title: Option<String>,
}

impl TocBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            open: Vec::new(),
            counters: vec![0],
            last_at_depth: vec![None],
            title: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn parent(&self) -> Option<NodeId> {
        self.open.iter().rev().find_map(|anchor| *anchor)
    }

    fn attach(&mut self, node: TocNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = node;
        node.parent = self.parent();
        match node.parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        self.nodes.push(node);
        id
    }

    /// Push a numbered chapter entry at the current depth.
    pub fn push_entry(
        &mut self,
        label: impl Into<String>,
        target: Option<String>,
    ) -> NodeId {
        *self.counters.last_mut().unwrap() += 1;
        let number = self
            .counters
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".")
            + ".";
        let mut node = TocNode::leaf(label.into(), target);
        node.number = Some(number);
        let id = self.attach(node);
        *self.last_at_depth.last_mut().unwrap() = Some(id);
        id
    }

    /// Push an unnumbered affix item (introduction, appendix).
    pub fn push_affix(&mut self, label: impl Into<String>, target: Option<String>) -> NodeId {
        let mut node = TocNode::leaf(label.into(), target);
        node.affix = true;
        let id = self.attach(node);
        *self.last_at_depth.last_mut().unwrap() = Some(id);
        id
    }

    /// Push a visual separator.
    pub fn push_spacer(&mut self) -> NodeId {
        let mut node = TocNode::leaf(String::new(), None);
        node.spacer = true;
        self.attach(node)
    }

    /// Open a child section under the last entry pushed at this depth.
    /// A section with no preceding entry attaches to the enclosing level.
    pub fn begin_section(&mut self) {
        let anchor = *self.last_at_depth.last().unwrap();
        self.open.push(anchor);
        self.counters.push(0);
        self.last_at_depth.push(None);
    }

    pub fn end_section(&mut self) {
        if self.open.pop().is_some() {
            self.counters.pop();
            self.last_at_depth.pop();
        }
    }

    pub fn build(mut self) -> Toc {
        while !self.open.is_empty() {
            self.end_section();
        }
        Toc {
            nodes: self.nodes,
            roots: self.roots,
            title: self.title,
        }
    }
}

impl Default for TocBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Target mapping
// ---------------------------------------------------------------------------

/// Markdown source candidates for a rendered page URL, in resolution order.
///
/// The inverse of [`page_target`]: `index.html` pages may come from
/// `index.md` or the `README.md` alias; every other page has exactly one
/// source. Non-page URLs have none.
pub fn source_candidates(url: &str) -> Vec<String> {
    let Some(stem) = url.strip_suffix(".html") else {
        return Vec::new();
    };
    let mut candidates = vec![format!("{stem}.md")];
    if stem == "index" {
        candidates.push("README.md".to_owned());
    } else if let Some(dir) = stem.strip_suffix("/index") {
        candidates.push(format!("{dir}/README.md"));
    }
    candidates
}

/// Map a SUMMARY.md link destination to the rendered page target.
///
/// Markdown sources become their rendered `.html` counterparts, with
/// `README.md` aliased to `index.html` the way the generator lays pages out.
/// External URLs pass through untouched; an empty destination is a draft
/// chapter (no target).
fn page_target(dest: &str) -> Option<String> {
    if dest.is_empty() {
        return None;
    }
    let dest = dest.strip_prefix("./").unwrap_or(dest);
    if dest == "README.md" {
        return Some("index.html".to_owned());
    }
    if let Some(dir) = dest.strip_suffix("/README.md") {
        return Some(format!("{dir}/index.html"));
    }
    if let Some(stem) = dest.strip_suffix(".md") {
        return Some(format!("{stem}.html"));
    }
    Some(dest.to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
