//! Active-entry resolution.
//!
//! Pure functions over the navigation tree: given the current document
//! location and the root-relative prefix the hosting page supplies, compute
//! which node is active and which nodes must be expanded to reveal it.
//! Nothing here touches widget or render state; callers apply the returned
//! marks however they present the tree.

use std::collections::BTreeSet;

use crate::toc::{NodeId, Toc};

/// Default document name appended to directory locations.
pub const INDEX_PAGE: &str = "index.html";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The set of node identifiers a render pass must mark.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveMarks {
    /// The entry matching the current page, if any.
    pub active: Option<NodeId>,
    /// The active entry plus every ancestor chapter on its path to the root.
    pub expanded: BTreeSet<NodeId>,
}

impl ActiveMarks {
    pub fn is_active(&self, id: NodeId) -> bool {
        self.active == Some(id)
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.contains(&id)
    }
}

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

/// Canonicalize the current document location: strip any `#fragment`, and
/// treat a directory location as its implicit index document.
pub fn canonical_location(location: &str) -> String {
    let mut canonical = match location.split_once('#') {
        Some((before, _)) => before.to_owned(),
        None => location.to_owned(),
    };
    if canonical.ends_with('/') {
        canonical.push_str(INDEX_PAGE);
    }
    canonical
}

/// True for scheme-absolute (`https://…`, `git+ssh://…`) and
/// protocol-relative (`//…`) references, which are never resolved against
/// the root prefix.
pub fn is_external(href: &str) -> bool {
    if href.starts_with("//") {
        return true;
    }
    match href.find(':') {
        Some(0) | None => false,
        Some(colon) => {
            let scheme = &href[..colon];
            scheme
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b == b'+')
                && href[colon + 1..].starts_with("//")
        }
    }
}

/// Resolve a tree link against the root-relative prefix. Fragment-only and
/// external references pass through untouched.
pub fn resolve_href(href: &str, path_to_root: &str) -> String {
    if href.starts_with('#') || is_external(href) {
        href.to_owned()
    } else {
        format!("{path_to_root}{href}")
    }
}

/// Root-relative prefix for a page at `url`: one `../` per directory level.
pub fn path_to_root_for(url: &str) -> String {
    "../".repeat(url.matches('/').count())
}

/// The last `count` `/`-separated segments of `path`. The whole path when it
/// has fewer segments.
fn tail_segments(path: &str, count: usize) -> &str {
    let mut idx = path.len();
    let mut remaining = count;
    while remaining > 0 {
        match path[..idx].rfind('/') {
            Some(pos) => {
                idx = pos;
                remaining -= 1;
            }
            None => return path,
        }
    }
    &path[idx + 1..]
}

// ---------------------------------------------------------------------------
// Mark computation
// ---------------------------------------------------------------------------

/// Compute the marks for a render pass.
///
/// Links are scanned in document order; the first one naming the current
/// location wins. The landing page aliases the first chapter: when
/// `path_to_root` is empty and the canonical location is the root index
/// document, the first link is active even though its target may differ.
/// That special case is deliberately not generalized.
///
/// A location no link names yields empty marks; that is the normal
/// degradation, not an error.
pub fn compute_marks(toc: &Toc, location: &str, path_to_root: &str) -> ActiveMarks {
    let canonical = canonical_location(location);
    let root_index = path_to_root.is_empty()
        && (canonical == INDEX_PAGE || canonical.ends_with("/index.html"));

    // The prefix places every resolved link at the book root, so resolved
    // equality reduces to comparing the location's root-relative tail: the
    // current page sits `depth` directories below the root.
    let depth = path_to_root.matches("../").count();
    let current_rel = tail_segments(&canonical, depth + 1);

    let mut marks = ActiveMarks::default();
    for (i, (id, target)) in toc.links().enumerate() {
        let matched = if target.starts_with('#') || is_external(target) {
            // Untouched by prefix resolution; only a verbatim hit counts.
            canonical == target
        } else {
            current_rel == target
        };
        if matched || (i == 0 && root_index) {
            marks.active = Some(id);
            break;
        }
    }

    if let Some(active) = marks.active {
        marks.expanded.insert(active);
        marks.expanded.extend(toc.ancestors(active));
    }

    marks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
