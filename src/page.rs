//! Page rendering for the TUI content pane.
//!
//! Walks the pulldown-cmark event stream once and produces styled ratatui
//! text: colored heading hierarchy, bordered code blocks with syntect
//! highlighting, list bullets, quote bars, rules. Headings are collected
//! with their rendered line index so the event loop can jump to them.
//!
//! A leading YAML frontmatter block is stripped before parsing; its `title`
//! key overrides the page title (otherwise the first H1 wins).

use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};
use syntect::{
    easy::HighlightLines,
    highlighting::{Theme, ThemeSet},
    parsing::SyntaxSet,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A heading and the rendered line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingLine {
    pub level: u8,
    pub text: String,
    /// 0-based index into the rendered lines.
    pub line: usize,
}

/// A fully rendered page.
pub struct RenderedPage {
    pub text: Text<'static>,
    pub headings: Vec<HeadingLine>,
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// Split an optional leading `---` YAML frontmatter block off the source.
///
/// Returns the parsed mapping (if it parses; a malformed block is dropped
/// silently) and the remaining markdown body.
pub fn strip_frontmatter(source: &str) -> (Option<serde_yml::Value>, &str) {
    let Some(rest) = source.strip_prefix("---\n") else {
        return (None, source);
    };
    let Some(end) = rest.find("\n---") else {
        return (None, source);
    };
    let yaml = &rest[..end];
    let mut body = &rest[end + 4..];
    if let Some(stripped) = body.strip_prefix('\n') {
        body = stripped;
    }
    (serde_yml::from_str(yaml).ok(), body)
}

fn frontmatter_title(value: &Option<serde_yml::Value>) -> Option<String> {
    value
        .as_ref()?
        .get("title")?
        .as_str()
        .map(|s| s.to_owned())
}

// ---------------------------------------------------------------------------
// Syntax highlighting
// ---------------------------------------------------------------------------

fn syntax_set() -> &'static SyntaxSet {
    static SET: OnceLock<SyntaxSet> = OnceLock::new();
    SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn code_theme() -> &'static Theme {
    static THEMES: OnceLock<ThemeSet> = OnceLock::new();
    let themes = THEMES.get_or_init(ThemeSet::load_defaults);
    &themes.themes["base16-ocean.dark"]
}

/// Highlight one code line into spans, falling back to the plain code style
/// when the language is unknown.
fn highlight_code_line(line: &str, lang: &str) -> Vec<Span<'static>> {
    let plain = Style::default().fg(Color::Green);
    if lang.is_empty() {
        return vec![Span::styled(line.to_owned(), plain)];
    }
    let set = syntax_set();
    let Some(syntax) = set.find_syntax_by_token(lang) else {
        return vec![Span::styled(line.to_owned(), plain)];
    };

    // The newline-aware syntax set wants terminated lines.
    let with_newline = format!("{line}\n");
    let mut highlighter = HighlightLines::new(syntax, code_theme());
    match highlighter.highlight_line(&with_newline, set) {
        Ok(regions) => regions
            .into_iter()
            .filter_map(|(style, piece)| {
                let piece = piece.trim_end_matches('\n');
                if piece.is_empty() {
                    return None;
                }
                let fg = style.foreground;
                Some(Span::styled(
                    piece.to_owned(),
                    Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b)),
                ))
            })
            .collect(),
        Err(_) => vec![Span::styled(line.to_owned(), plain)],
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn heading_style(level: u8) -> Style {
    let base = Style::default().add_modifier(Modifier::BOLD);
    match level {
        1 => base.fg(Color::Magenta),
        2 => base.fg(Color::Cyan),
        3 => base.fg(Color::Green),
        4 => base.fg(Color::Yellow),
        _ => base.fg(Color::White),
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Single-pass assembler from markdown events to rendered lines.
struct PageAssembler {
    lines: Vec<Line<'static>>,
    headings: Vec<HeadingLine>,
    title: Option<String>,

    text_buf: String,
    in_code: bool,
    code_lang: String,
    code_buf: String,
    list_depth: usize,
    quote_depth: usize,
}

impl PageAssembler {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            headings: Vec::new(),
            title: None,
            text_buf: String::new(),
            in_code: false,
            code_lang: String::new(),
            code_buf: String::new(),
            list_depth: 0,
            quote_depth: 0,
        }
    }

    /// Blank separator before a new block, except at the very top.
    fn block_gap(&mut self) {
        if !self.lines.is_empty() {
            self.lines.push(Line::default());
        }
    }

    fn quote_prefix(&self) -> Vec<Span<'static>> {
        let bar = Style::default().fg(Color::DarkGray);
        (0..self.quote_depth)
            .map(|_| Span::styled("▌ ".to_owned(), bar))
            .collect()
    }

    fn emit_paragraph(&mut self) {
        let content = std::mem::take(&mut self.text_buf);
        let quoted = self.quote_depth > 0;
        let text_style = if quoted {
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC)
        } else {
            Style::default()
        };
        for text_line in content.lines() {
            let mut spans = self.quote_prefix();
            spans.push(Span::styled(text_line.to_owned(), text_style));
            self.lines.push(Line::from(spans));
        }
    }

    fn emit_heading(&mut self, level: u8) {
        let content = std::mem::take(&mut self.text_buf);
        let text = content.trim().to_owned();
        if level == 1 && self.title.is_none() {
            self.title = Some(text.clone());
        }
        self.headings.push(HeadingLine {
            level,
            text: text.clone(),
            line: self.lines.len(),
        });
        let style = heading_style(level);
        let prefix = "#".repeat(level as usize);
        self.lines
            .push(Line::from(Span::styled(format!("{prefix} {text}"), style)));
    }

    fn emit_list_item(&mut self) {
        let content = std::mem::take(&mut self.text_buf);
        let bullet_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
        let indent = "  ".repeat(self.list_depth.max(1));
        let mut first = true;
        for text_line in content.lines() {
            let trimmed = text_line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let marker = if first { "• " } else { "  " };
            first = false;
            self.lines.push(Line::from(vec![
                Span::raw(indent.clone()),
                Span::styled(marker.to_owned(), bullet_style),
                Span::raw(trimmed.to_owned()),
            ]));
        }
    }

    fn emit_code_block(&mut self) {
        let content = std::mem::take(&mut self.code_buf);
        let lang = std::mem::take(&mut self.code_lang);
        let border = Style::default().fg(Color::DarkGray);

        self.lines.push(Line::from(Span::styled("┌───", border)));
        for code_line in content.lines() {
            let mut spans = vec![Span::styled("│ ".to_owned(), border)];
            spans.extend(highlight_code_line(code_line, &lang));
            self.lines.push(Line::from(spans));
        }
        self.lines.push(Line::from(Span::styled("└───", border)));
    }

    fn emit_rule(&mut self) {
        self.block_gap();
        self.lines.push(Line::from(Span::styled(
            "────────────────────────────────────────",
            Style::default().fg(Color::DarkGray),
        )));
    }
}

/// Render a markdown page for the content pane.
pub fn render_page(source: &str) -> RenderedPage {
    let (frontmatter, body) = strip_frontmatter(source);

    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(body, options);

    let mut asm = PageAssembler::new();

    for event in parser {
        match event {
            Event::Start(tag) => match tag {
                Tag::Heading { .. } => {
                    asm.block_gap();
                    asm.text_buf.clear();
                }
                Tag::Paragraph => {
                    if asm.list_depth == 0 {
                        // The quote itself already opened the gap.
                        if asm.quote_depth == 0 {
                            asm.block_gap();
                        }
                        asm.text_buf.clear();
                    }
                }
                Tag::CodeBlock(kind) => {
                    asm.block_gap();
                    asm.in_code = true;
                    asm.code_lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .unwrap_or("")
                            .to_owned(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    asm.code_buf.clear();
                }
                Tag::List(_) => {
                    if asm.list_depth == 0 {
                        asm.block_gap();
                    } else {
                        // A nested list closes the parent item's text first.
                        asm.emit_list_item();
                    }
                    asm.list_depth += 1;
                }
                Tag::Item => {
                    asm.text_buf.clear();
                }
                Tag::BlockQuote(_) => {
                    asm.block_gap();
                    asm.quote_depth += 1;
                }
                _ => {}
            },

            Event::End(tag_end) => match tag_end {
                TagEnd::Heading(level) => {
                    asm.emit_heading(heading_level_to_u8(level));
                }
                TagEnd::Paragraph => {
                    if asm.list_depth == 0 {
                        asm.emit_paragraph();
                    } else if !asm.text_buf.is_empty() && !asm.text_buf.ends_with('\n') {
                        // Separate a loose item's paragraphs.
                        asm.text_buf.push('\n');
                    }
                }
                TagEnd::CodeBlock => {
                    asm.in_code = false;
                    asm.emit_code_block();
                }
                TagEnd::List(_) => {
                    asm.list_depth = asm.list_depth.saturating_sub(1);
                }
                TagEnd::Item => {
                    asm.emit_list_item();
                }
                TagEnd::BlockQuote(_) => {
                    asm.quote_depth = asm.quote_depth.saturating_sub(1);
                }
                _ => {}
            },

            Event::Text(text) | Event::Code(text) | Event::InlineHtml(text) => {
                if asm.in_code {
                    asm.code_buf.push_str(&text);
                } else {
                    asm.text_buf.push_str(&text);
                }
            }

            Event::SoftBreak | Event::HardBreak => {
                if asm.in_code {
                    asm.code_buf.push('\n');
                } else {
                    asm.text_buf.push('\n');
                }
            }

            Event::Rule => {
                asm.emit_rule();
            }

            Event::TaskListMarker(done) => {
                asm.text_buf.push_str(if done { "[x] " } else { "[ ] " });
            }

            _ => {}
        }
    }

    let title = frontmatter_title(&frontmatter).or(asm.title);
    RenderedPage {
        text: Text::from(asm.lines),
        headings: asm.headings,
        title,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
