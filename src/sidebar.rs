//! Sidebar widget module.
//!
//! Owns everything that changes between pages: per-node expansion state, the
//! current active marks, the selection cursor, and the viewport scroll. The
//! navigation tree itself stays immutable; a render pass only rewrites these
//! annotations.
//!
//! Scroll position survives page navigations through [`ScrollState`], an
//! explicit claim-once cell: the navigate handler saves the offset, the next
//! attach reads and clears it. A single UI thread owns the cell, so there is
//! no concurrent-writer protection, just best-effort claim-once.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use crate::active::{self, ActiveMarks};
use crate::toc::{NodeId, Toc};

// ---------------------------------------------------------------------------
// Scroll persistence
// ---------------------------------------------------------------------------

/// Claim-once scroll cell shared between the before-navigate handler and the
/// on-attach initializer.
#[derive(Debug, Default)]
pub struct ScrollState {
    stored: Option<usize>,
}

impl ScrollState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an offset, replacing any previous value.
    pub fn save(&mut self, offset: usize) {
        self.stored = Some(offset);
    }

    /// Read the stored offset and clear it immediately.
    pub fn take(&mut self) -> Option<usize> {
        self.stored.take()
    }
}

// ---------------------------------------------------------------------------
// Widget
// ---------------------------------------------------------------------------

/// A visible sidebar row after collapse filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row {
    pub id: NodeId,
    pub depth: usize,
}

/// How the next render pass positions the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingScroll {
    /// Keep the current offset (manual scrolling already happened).
    Keep,
    /// Apply a restored offset from the scroll cell.
    Restore(usize),
    /// Bring the active row to the vertical center of the viewport.
    CenterActive,
}

/// The navigation sidebar.
pub struct Sidebar {
    toc: Toc,
    /// Expansion flag per node, indexed by `NodeId`.
    expanded: Vec<bool>,
    marks: ActiveMarks,
    /// Cursor position as an index into the visible rows.
    selected: usize,
    /// First visible row of the viewport.
    scroll: usize,
    pending: PendingScroll,
    scroll_state: ScrollState,
}

impl Sidebar {
    /// Create a widget over `toc`. All sections start collapsed; the first
    /// [`attach`](Self::attach) reveals the active path.
    pub fn new(toc: Toc) -> Self {
        let expanded = vec![false; toc.len()];
        Self {
            toc,
            expanded,
            marks: ActiveMarks::default(),
            selected: 0,
            scroll: 0,
            pending: PendingScroll::CenterActive,
            scroll_state: ScrollState::new(),
        }
    }

    pub fn toc(&self) -> &Toc {
        &self.toc
    }

    pub fn marks(&self) -> &ActiveMarks {
        &self.marks
    }

    /// The render pass run on every page attachment.
    ///
    /// Recomputes the active marks for the new location, resets expansion to
    /// the marks (ancestors of the active page open, everything else
    /// closed), moves the cursor to the active row, and schedules scroll
    /// restoration: a stored offset applies directly, otherwise the active
    /// row is centered. Missing marks and missing stored offsets are normal
    /// and leave the widget in a plain collapsed state.
    pub fn attach(&mut self, location: &str, path_to_root: &str) {
        self.marks = active::compute_marks(&self.toc, location, path_to_root);

        self.expanded.fill(false);
        for id in &self.marks.expanded {
            self.expanded[id.0] = true;
        }

        self.pending = match self.scroll_state.take() {
            Some(offset) => PendingScroll::Restore(offset),
            None => PendingScroll::CenterActive,
        };

        if let Some(active) = self.marks.active {
            if let Some(row) = self.row_of(active) {
                self.selected = row;
            }
        } else {
            self.selected = 0;
        }
    }

    /// Before-navigate handler: persist the current scroll offset into the
    /// claim-once cell. Never blocks or delays the navigation itself.
    pub fn notify_navigate(&mut self) {
        self.scroll_state.save(self.scroll);
    }

    /// Flip one section's expansion without touching its siblings. Nodes
    /// without children ignore the toggle.
    pub fn toggle(&mut self, id: NodeId) {
        if !self.toc.node(id).children.is_empty() {
            self.expanded[id.0] = !self.expanded[id.0];
        }
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded[id.0]
    }

    /// Rows currently visible: collapsed sections contribute nothing below
    /// their chapter row.
    pub fn visible_rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        for &root in self.toc.roots() {
            self.collect_rows(root, 0, &mut rows);
        }
        rows
    }

    fn collect_rows(&self, id: NodeId, depth: usize, rows: &mut Vec<Row>) {
        rows.push(Row { id, depth });
        if self.expanded[id.0] {
            for &child in &self.toc.node(id).children {
                self.collect_rows(child, depth + 1, rows);
            }
        }
    }

    fn row_of(&self, id: NodeId) -> Option<usize> {
        self.visible_rows().iter().position(|row| row.id == id)
    }

    // -- cursor -------------------------------------------------------------

    pub fn select_next(&mut self) {
        let count = self.visible_rows().len();
        if count > 0 {
            self.selected = (self.selected + 1).min(count - 1);
            self.pending = PendingScroll::Keep;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.pending = PendingScroll::Keep;
    }

    /// The node under the cursor.
    pub fn selected_node(&self) -> Option<NodeId> {
        self.visible_rows().get(self.selected).map(|row| row.id)
    }

    /// Target of the entry under the cursor, if it has one.
    pub fn selected_target(&self) -> Option<String> {
        let id = self.selected_node()?;
        self.toc.node(id).target.clone()
    }

    /// Toggle the section under the cursor.
    pub fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_node() {
            self.toggle(id);
            let count = self.visible_rows().len();
            self.selected = self.selected.min(count.saturating_sub(1));
        }
    }

    // -- rendering ----------------------------------------------------------

    /// Resolve pending scroll against a concrete viewport and return the
    /// visible window of styled lines.
    pub fn render_lines(&mut self, viewport_height: usize) -> Vec<Line<'static>> {
        let rows = self.visible_rows();
        let max_scroll = rows.len().saturating_sub(viewport_height.max(1));

        match self.pending {
            PendingScroll::Restore(offset) => {
                self.scroll = offset.min(max_scroll);
            }
            PendingScroll::CenterActive => {
                if let Some(active) = self.marks.active {
                    if let Some(row) = rows.iter().position(|r| r.id == active) {
                        self.scroll = row.saturating_sub(viewport_height / 2).min(max_scroll);
                    }
                }
            }
            PendingScroll::Keep => {}
        }
        self.pending = PendingScroll::Keep;

        // Keep the cursor on screen.
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if viewport_height > 0 && self.selected >= self.scroll + viewport_height {
            self.scroll = self.selected + 1 - viewport_height;
        }
        self.scroll = self.scroll.min(max_scroll);

        rows.iter()
            .enumerate()
            .skip(self.scroll)
            .take(viewport_height)
            .map(|(i, row)| self.row_line(row, i == self.selected))
            .collect()
    }

    /// Current scroll offset (first visible row).
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    fn row_line(&self, row: &Row, selected: bool) -> Line<'static> {
        let node = self.toc.node(row.id);
        if node.spacer {
            return Line::default();
        }

        let mut spans: Vec<Span<'static>> = Vec::new();
        spans.push(Span::raw("  ".repeat(row.depth)));

        if !node.children.is_empty() {
            let glyph = if self.expanded[row.id.0] { "▾ " } else { "▸ " };
            spans.push(Span::styled(
                glyph.to_owned(),
                Style::default().fg(Color::DarkGray),
            ));
        } else {
            spans.push(Span::raw("  "));
        }

        if let Some(number) = &node.number {
            spans.push(Span::styled(
                format!("{number} "),
                Style::default().fg(Color::DarkGray),
            ));
        }

        let mut label_style = Style::default();
        if node.affix {
            label_style = label_style.add_modifier(Modifier::ITALIC);
        }
        if self.marks.is_active(row.id) {
            label_style = label_style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        if node.target.is_none() {
            // Draft chapter: present but not navigable.
            label_style = label_style.fg(Color::DarkGray);
        }
        spans.push(Span::styled(node.label.clone(), label_style));

        let mut line = Line::from(spans);
        if selected {
            line.style = Style::default().add_modifier(Modifier::REVERSED);
        }
        line
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
