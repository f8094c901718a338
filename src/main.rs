mod active;
mod html;
mod page;
mod serve;
mod sidebar;
mod toc;
mod web_assets;

use std::{
    fs, io,
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Text},
    widgets::{Block, Borders, Paragraph},
    DefaultTerminal, Frame,
};

use page::RenderedPage;
use sidebar::Sidebar;
use toc::Toc;

/// Explicit subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Browse a book directory in TUI mode (equivalent to legacy positional form)
    View {
        /// Path to the book directory (containing SUMMARY.md or src/SUMMARY.md)
        dir: String,
    },
    /// Serve a book directory over HTTP
    Serve {
        /// Path to the book directory (containing SUMMARY.md or src/SUMMARY.md)
        dir: String,
        /// Interface address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Starting port number for the HTTP server
        #[arg(long, default_value = "3333")]
        port: u16,
    },
}

/// Full CLI with explicit subcommands.
#[derive(Parser)]
#[command(
    name = "mdtoc",
    version,
    about = "A TUI and HTTP navigator for mdBook-style books",
    after_help = "INVOCATION FORMS:\n  mdtoc <dir>                      Browse book in TUI mode (legacy)\n  mdtoc view <dir>                 Browse book in TUI mode\n  mdtoc serve [OPTIONS] <dir>      Serve book over HTTP"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Legacy positional form: mdtoc <dir>
#[derive(Parser)]
#[command(name = "mdtoc", version, about = "A TUI and HTTP navigator for mdBook-style books")]
struct LegacyCli {
    /// Path to a book directory to browse
    dir: String,
}

/// Resolved dispatch mode after CLI argument parsing.
enum DispatchMode {
    Legacy {
        dir: String,
    },
    View {
        dir: String,
    },
    Serve {
        dir: String,
        bind: String,
        port: u16,
    },
}

fn resolve_dispatch_mode() -> DispatchMode {
    match Cli::try_parse() {
        Ok(cli) => match cli.command {
            Commands::View { dir } => DispatchMode::View { dir },
            Commands::Serve { dir, bind, port } => DispatchMode::Serve { dir, bind, port },
        },
        Err(clap_err) => {
            // Pass --help, --version, and subcommand-level help through to the full Cli handler.
            use clap::error::ErrorKind;
            if matches!(
                clap_err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                clap_err.exit();
            }
            // Fall back to legacy positional parse: mdtoc <dir>
            match LegacyCli::try_parse() {
                Ok(legacy) => DispatchMode::Legacy { dir: legacy.dir },
                Err(legacy_err) => legacy_err.exit(),
            }
        }
    }
}

fn main() -> io::Result<()> {
    match resolve_dispatch_mode() {
        DispatchMode::Legacy { dir } => {
            eprintln!("[legacy] TUI navigator dispatched for: {dir}");
            run_tui_book(&dir)
        }
        DispatchMode::View { dir } => {
            eprintln!("[view] TUI navigator dispatched for: {dir}");
            run_tui_book(&dir)
        }
        DispatchMode::Serve { dir, bind, port } => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            rt.block_on(serve::run_serve(dir, bind, port))
        }
    }
}

// ---------------------------------------------------------------------------
// TUI mode
// ---------------------------------------------------------------------------

/// Read the markdown source behind a page URL, trying each candidate the
/// URL maps to. `None` when no source exists; callers treat that as a
/// non-navigable entry.
fn load_page_source(book_root: &Path, url: &str) -> Option<String> {
    for candidate in toc::source_candidates(url) {
        let path = book_root.join(&candidate);
        if path.is_file() {
            if let Ok(content) = fs::read_to_string(&path) {
                return Some(content);
            }
        }
    }
    None
}

/// Render the page behind `url`, applying the landing-page alias: when the
/// root index has no source of its own, the first chapter's page shows in
/// its place.
fn render_location(book_root: &Path, url: &str, toc: &Toc) -> RenderedPage {
    if let Some(source) = load_page_source(book_root, url) {
        return page::render_page(&source);
    }
    if url == "index.html" {
        if let Some((_, first)) = toc.links().next() {
            if let Some(source) = load_page_source(book_root, first) {
                return page::render_page(&source);
            }
        }
    }
    page::render_page("")
}

fn run_tui_book(dir_arg: &str) -> io::Result<()> {
    let dir = Path::new(dir_arg);
    if !dir.is_dir() {
        eprintln!("Error: '{dir_arg}' is not a directory.");
        eprintln!("Expected a book directory containing SUMMARY.md (or src/SUMMARY.md).");
        process::exit(1);
    }

    let summary_path = serve::find_summary(dir).unwrap_or_else(|| {
        eprintln!("Error: no SUMMARY.md found under '{dir_arg}' (or its src/).");
        process::exit(1);
    });

    let summary = fs::read_to_string(&summary_path).unwrap_or_else(|e| {
        match e.kind() {
            io::ErrorKind::NotFound => {
                eprintln!("Error: file not found: {}", summary_path.display());
            }
            io::ErrorKind::PermissionDenied => {
                eprintln!("Error: permission denied: {}", summary_path.display());
            }
            _ => {
                eprintln!("Error reading '{}': {e}", summary_path.display());
            }
        }
        process::exit(1);
    });

    let toc = Toc::from_summary(&summary);
    if toc.links().next().is_none() {
        eprintln!(
            "Error: no navigable entries in {}",
            summary_path.display()
        );
        process::exit(1);
    }

    let book_root = summary_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    ratatui::run(|terminal| run(terminal, &book_root, toc))
}

fn run(terminal: &mut DefaultTerminal, book_root: &Path, toc: Toc) -> io::Result<()> {
    let book_title = toc
        .title()
        .filter(|t| !t.eq_ignore_ascii_case("summary"))
        .map(|t| t.to_owned());

    let mut location = String::from("index.html");
    let mut rendered = render_location(book_root, &location, &toc);
    let mut sidebar = Sidebar::new(toc);
    sidebar.attach(&location, &active::path_to_root_for(&location));
    let mut content_scroll: usize = 0;

    loop {
        terminal.draw(|frame| {
            ui(
                frame,
                &mut sidebar,
                &rendered,
                content_scroll,
                &location,
                book_title.as_deref(),
            );
        })?;

        let event = event::read()?;

        // Recalculate bounds and clamp the content scroll on every event,
        // including Event::Resize, so the view stays valid after terminal
        // resize.
        let viewport_height = terminal.size()?.height.saturating_sub(1) as usize;
        let total_lines = rendered.text.lines.len();
        let max_scroll = total_lines.saturating_sub(viewport_height);
        content_scroll = content_scroll.min(max_scroll);

        if let Event::Key(key) = event {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Char('q') => return Ok(()),

                // Sidebar cursor
                KeyCode::Char('j') | KeyCode::Down => sidebar.select_next(),
                KeyCode::Char('k') | KeyCode::Up => sidebar.select_prev(),

                // Expand / collapse the selected section
                KeyCode::Char(' ') => sidebar.toggle_selected(),

                // Open the selected page. External targets and drafts are
                // silently skipped.
                KeyCode::Enter => {
                    if let Some(target) = sidebar.selected_target() {
                        if !active::is_external(&target)
                            && load_page_source(book_root, &target).is_some()
                        {
                            sidebar.notify_navigate();
                            location = target;
                            rendered = render_location(book_root, &location, sidebar.toc());
                            content_scroll = 0;
                            let prefix = active::path_to_root_for(&location);
                            sidebar.attach(&location, &prefix);
                        }
                    }
                }

                // Content pane: half page down
                KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    content_scroll = (content_scroll + viewport_height / 2).min(max_scroll);
                }
                KeyCode::PageDown => {
                    content_scroll = (content_scroll + viewport_height / 2).min(max_scroll);
                }

                // Content pane: half page up
                KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    content_scroll = content_scroll.saturating_sub(viewport_height / 2);
                }
                KeyCode::PageUp => {
                    content_scroll = content_scroll.saturating_sub(viewport_height / 2);
                }

                // Content pane: top / bottom
                KeyCode::Char('g') | KeyCode::Home => content_scroll = 0,
                KeyCode::Char('G') | KeyCode::End => content_scroll = max_scroll,

                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Sidebar pane width in columns.
const SIDEBAR_WIDTH: u16 = 34;

fn ui(
    frame: &mut Frame,
    sidebar: &mut Sidebar,
    rendered: &RenderedPage,
    content_scroll: usize,
    location: &str,
    book_title: Option<&str>,
) {
    let area = frame.area();

    // Minimum usable terminal size: sidebar plus some content and a status bar.
    const MIN_WIDTH: u16 = 40;
    const MIN_HEIGHT: u16 = 5;
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = "Terminal too small";
        let msg_len = msg.len() as u16;
        let x = area.x + area.width.saturating_sub(msg_len) / 2;
        let y = area.y + area.height / 2;
        let w = msg_len.min(area.width);
        if w > 0 && area.height > 0 {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    msg,
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Rect::new(x, y, w, 1),
            );
        }
        return;
    }

    let rows = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
    let cols =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)]).split(rows[0]);

    // Sidebar pane
    let block = Block::new().borders(Borders::RIGHT);
    let inner = block.inner(cols[0]);
    frame.render_widget(block, cols[0]);
    let lines = sidebar.render_lines(inner.height as usize);
    frame.render_widget(Paragraph::new(Text::from(lines)), inner);

    // Content pane
    let content = Paragraph::new(rendered.text.clone()).scroll((content_scroll as u16, 0));
    frame.render_widget(content, cols[1]);

    // Status bar
    let total_lines = rendered.text.lines.len();
    let viewport_height = cols[1].height as usize;
    let position = if total_lines == 0 {
        "Empty".to_owned()
    } else if total_lines <= viewport_height {
        "All".to_owned()
    } else if content_scroll == 0 {
        "Top".to_owned()
    } else if content_scroll >= total_lines.saturating_sub(viewport_height) {
        "Bot".to_owned()
    } else {
        let pct = (content_scroll * 100) / total_lines;
        format!("{pct}%")
    };

    let page_title = rendered.title.as_deref().unwrap_or(location);
    let book_info = book_title
        .map(|t| format!("{t} \u{00b7} "))
        .unwrap_or_default();

    let status = format!(" {book_info}{page_title}  {location}  {position}");
    let status_bar = Paragraph::new(Span::styled(
        status,
        Style::default().fg(Color::Black).bg(Color::White),
    ))
    .style(Style::default().bg(Color::White));
    frame.render_widget(status_bar, rows[1]);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, content).expect("write file");
    }

    #[test]
    fn load_page_source_maps_html_to_md() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_file(&tmp.path().join("05-led-roulette/build-it.md"), "# Build it\n");

        let source = load_page_source(tmp.path(), "05-led-roulette/build-it.html");
        assert_eq!(source.as_deref(), Some("# Build it\n"));
        assert!(load_page_source(tmp.path(), "missing.html").is_none());
    }

    #[test]
    fn load_page_source_uses_readme_alias() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_file(&tmp.path().join("guide/README.md"), "# Guide\n");

        let source = load_page_source(tmp.path(), "guide/index.html");
        assert_eq!(source.as_deref(), Some("# Guide\n"));
    }

    #[test]
    fn render_location_aliases_root_to_first_chapter() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_file(&tmp.path().join("01-background/index.md"), "# Background\n");

        let toc = Toc::from_summary("- [Background](01-background/index.md)\n");
        let rendered = render_location(tmp.path(), "index.html", &toc);
        assert_eq!(rendered.title.as_deref(), Some("Background"));
    }

    #[test]
    fn render_location_missing_page_is_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let toc = Toc::from_summary("");
        let rendered = render_location(tmp.path(), "nope.html", &toc);
        assert!(rendered.text.lines.is_empty());
    }
}
