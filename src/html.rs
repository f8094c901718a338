//! HTML rendering for serve mode.
//!
//! Two halves: the sidebar fragment (the `<ol class="chapter">` navigation
//! markup with active/expanded annotations baked in per request) and the
//! page pipeline (comrak GFM rendering of a chapter's markdown source,
//! wrapped in the page shell that hosts the sidebar).
//!
//! The TUI path (`page.rs`, `sidebar.rs`) does not go through here.

use std::collections::HashMap;

use comrak::{
    format_html,
    nodes::{AstNode, NodeValue},
    parse_document, Arena, Options,
};

use crate::active::{self, ActiveMarks};
use crate::page;
use crate::toc::{NodeId, Toc};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A heading extracted from a page for anchor injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingEntry {
    /// Heading level (1–6).
    pub level: u8,
    /// Plain-text content of the heading.
    pub text: String,
    /// URL-safe anchor ID, deduplicated within the document.
    pub anchor_id: String,
}

/// A rendered chapter body plus its metadata.
pub struct RenderedHtml {
    pub body: String,
    pub headings: Vec<HeadingEntry>,
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// Sidebar fragment
// ---------------------------------------------------------------------------

/// Render the navigation tree as the sidebar's `<ol class="chapter">`
/// fragment.
///
/// Entries carry the `chapter-item` class, plus `expanded` / `affix` when
/// applicable; the active link gets `class="active"`; spacers become
/// `<li class="spacer">`; a child section renders as a nested
/// `<ol class="section">` inside its own bare `<li>`. Links are resolved
/// against `path_to_root` server-side, so the emitted hrefs are final.
pub fn render_toc_fragment(toc: &Toc, marks: &ActiveMarks, path_to_root: &str) -> String {
    let mut out = String::from("<ol class=\"chapter\">");
    render_items(toc, marks, path_to_root, toc.roots(), &mut out);
    out.push_str("</ol>");
    out
}

fn render_items(
    toc: &Toc,
    marks: &ActiveMarks,
    path_to_root: &str,
    ids: &[NodeId],
    out: &mut String,
) {
    for &id in ids {
        let node = toc.node(id);
        if node.spacer {
            out.push_str("<li class=\"spacer\"></li>");
            continue;
        }

        let mut classes = String::from("chapter-item");
        if marks.is_expanded(id) {
            classes.push_str(" expanded");
        }
        if node.affix {
            classes.push_str(" affix");
        }
        out.push_str(&format!("<li class=\"{classes}\">"));

        let number = node
            .number
            .as_ref()
            .map(|n| format!("<strong aria-hidden=\"true\">{n}</strong> "))
            .unwrap_or_default();

        match &node.target {
            Some(target) => {
                let href = active::resolve_href(target, path_to_root);
                let active_attr = if marks.is_active(id) {
                    " class=\"active\""
                } else {
                    ""
                };
                out.push_str(&format!(
                    "<a href=\"{}\"{active_attr}>{number}{}</a>",
                    html_escape(&href),
                    html_escape(&node.label),
                ));
            }
            // Draft chapter: present in the tree but not navigable.
            None => {
                out.push_str(&format!("<div>{number}{}</div>", html_escape(&node.label)));
            }
        }

        if !node.children.is_empty() {
            out.push_str("<a class=\"toggle\"><div>\u{276f}</div></a>");
        }
        out.push_str("</li>");

        if !node.children.is_empty() {
            out.push_str("<li><ol class=\"section\">");
            render_items(toc, marks, path_to_root, &node.children, out);
            out.push_str("</ol></li>");
        }
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Minimal HTML entity escaping for text content and attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build comrak render options: GFM extensions, raw HTML stripped.
fn make_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    // Raw HTML from chapter sources is never passed through.
    options.render.unsafe_ = false;
    options
}

/// Convert heading text to a URL-safe anchor slug.
///
/// Lowercase, spaces/hyphens/underscores map to `-`, other non-alphanumerics
/// drop, consecutive hyphens collapse, leading/trailing hyphens trim.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if c == ' ' || c == '-' || c == '_' {
            if !slug.ends_with('-') {
                slug.push('-');
            }
        }
    }
    slug.trim_matches('-').to_owned()
}

/// Recursively collect plain-text content of a heading AST node.
fn collect_heading_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(s) => text.push_str(s),
            NodeValue::Code(c) => text.push_str(&c.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
            _ => text.push_str(&collect_heading_text(child)),
        }
    }
    text
}

/// Split a URL into its base path and trailing suffix (query and/or
/// fragment). The suffix may be empty.
fn split_url_suffix(url: &str) -> (&str, &str) {
    match url.find(|c| c == '?' || c == '#') {
        Some(pos) => (&url[..pos], &url[pos..]),
        None => (url, ""),
    }
}

/// Rewrite a chapter-local markdown href into the rendered `.html` URL
/// space, preserving any query/fragment suffix.
///
/// Returns `None` for external, protocol-relative, absolute, and
/// fragment-only URLs, and for anything not pointing at a markdown source —
/// those stay as written.
fn rewrite_url(url: &str) -> Option<String> {
    if url.starts_with('#') || url.starts_with('/') || active::is_external(url) {
        return None;
    }
    if url.starts_with("mailto:") {
        return None;
    }

    let (base, suffix) = split_url_suffix(url);
    let base = base.strip_prefix("./").unwrap_or(base);
    if base == "README.md" {
        return Some(format!("index.html{suffix}"));
    }
    if let Some(dir) = base.strip_suffix("/README.md") {
        return Some(format!("{dir}/index.html{suffix}"));
    }
    let stem = base.strip_suffix(".md")?;
    Some(format!("{stem}.html{suffix}"))
}

/// Traverse the AST and rewrite local `.md` links (and images) in-place so
/// rendered pages navigate within the book's `.html` URL space.
fn rewrite_local_links<'a>(root: &'a AstNode<'a>) -> usize {
    let mut rewritten = 0usize;
    for node in root.descendants() {
        let mut data = node.data.borrow_mut();
        let url = match &mut data.value {
            NodeValue::Link(nl) => &mut nl.url,
            NodeValue::Image(ni) => &mut ni.url,
            _ => continue,
        };
        if let Some(new_url) = rewrite_url(url) {
            *url = new_url;
            rewritten += 1;
        }
    }
    rewritten
}

/// Inject `id` attributes into heading elements in the rendered fragment.
///
/// Sequential first-occurrence replacement `<hN>` → `<hN id="…">`. With
/// `render.unsafe_` off, comrak never emits bare `<hN>` from raw-HTML input,
/// so only genuine headings are hit.
fn inject_heading_ids(html: &str, headings: &[HeadingEntry]) -> String {
    let mut result = html.to_owned();
    for heading in headings {
        let tag = format!("<h{}>", heading.level);
        let with_id = format!("<h{} id=\"{}\">", heading.level, heading.anchor_id);
        result = result.replacen(&tag, &with_id, 1);
    }
    result
}

// ---------------------------------------------------------------------------
// Page rendering
// ---------------------------------------------------------------------------

/// Render a chapter's markdown source to an HTML fragment.
///
/// Strips YAML frontmatter (its `title` key overrides the page title),
/// rewrites local `.md` links into the `.html` URL space, injects heading
/// anchors, and extracts the title (frontmatter, else first H1).
pub fn render_markdown(source: &str) -> RenderedHtml {
    let (frontmatter, body) = page::strip_frontmatter(source);
    let options = make_options();

    let arena = Arena::new();
    let root = parse_document(&arena, body, &options);

    rewrite_local_links(root);

    // Collect headings with deduplicated anchor slugs.
    let mut headings: Vec<HeadingEntry> = Vec::new();
    let mut slug_counts: HashMap<String, usize> = HashMap::new();
    let mut title: Option<String> = None;
    for node in root.descendants() {
        if let NodeValue::Heading(heading) = &node.data.borrow().value {
            let text = collect_heading_text(node);
            let base = slugify(&text);
            let count = slug_counts.entry(base.clone()).or_insert(0);
            let anchor_id = if *count == 0 {
                base.clone()
            } else {
                format!("{base}-{count}")
            };
            *count += 1;
            if heading.level == 1 && title.is_none() {
                title = Some(text.clone());
            }
            headings.push(HeadingEntry {
                level: heading.level,
                text,
                anchor_id,
            });
        }
    }

    let mut out = Vec::new();
    let body_html = match format_html(root, &options, &mut out) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => String::new(),
    };
    let body_html = inject_heading_ids(&body_html, &headings);

    let title = frontmatter
        .as_ref()
        .and_then(|v| v.get("title"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_owned())
        .or(title);

    RenderedHtml {
        body: body_html,
        headings,
        title,
    }
}

// ---------------------------------------------------------------------------
// Page shell
// ---------------------------------------------------------------------------

/// Wrap a rendered chapter body and the sidebar fragment into a full page.
///
/// The shell links the embedded assets through `path_to_root` and hands the
/// same prefix to the client script, which needs it for scroll persistence
/// and toggle wiring.
pub fn build_page_shell(
    body_html: &str,
    toc_fragment: &str,
    page_title: Option<&str>,
    book_title: Option<&str>,
    path_to_root: &str,
) -> String {
    let title = match (page_title, book_title) {
        (Some(page), Some(book)) => format!("{} - {}", html_escape(page), html_escape(book)),
        (Some(page), None) => html_escape(page),
        (None, Some(book)) => html_escape(book),
        (None, None) => "Documentation".to_owned(),
    };
    let prefix = html_escape(path_to_root);

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n\
         <link rel=\"stylesheet\" href=\"{prefix}assets/mdtoc.css\">\n\
         </head>\n\
         <body>\n\
         <nav id=\"sidebar\" class=\"sidebar\" aria-label=\"Table of contents\">\n\
         {toc_fragment}\n\
         </nav>\n\
         <main id=\"content\" class=\"content\">\n\
         {body_html}\n\
         </main>\n\
         <script>var path_to_root = \"{prefix}\";</script>\n\
         <script src=\"{prefix}assets/mdtoc.js\"></script>\n\
         </body>\n\
         </html>\n"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
