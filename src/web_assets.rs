//! Embedded static web assets for the mdtoc serve mode.
//!
//! Both files are compiled into the binary via `include_str!` so the binary
//! is fully self-contained; no external asset files need to be distributed.

/// Stylesheet for the served book pages (sidebar layout, collapsed-section
/// rules, content typography).
///
/// Loaded from `src/assets/mdtoc.css` at compile time.
pub const CSS: &str = include_str!("assets/mdtoc.css");

/// Client-side script for the served book pages.
///
/// Carries the in-browser half of the sidebar behavior: claim-once scroll
/// persistence through `sessionStorage`, centering the active entry when no
/// stored offset exists, and toggle wiring.
/// Loaded from `src/assets/mdtoc.js` at compile time.
pub const JS: &str = include_str!("assets/mdtoc.js");
