//! HTTP serve mode.
//!
//! Serves an mdBook-style book directory: chapter markdown sources render
//! to HTML pages wrapped in the sidebar shell, everything else serves as a
//! static asset. Requests live in the rendered `.html` URL space and are
//! mapped back to `.md` sources, so the book's source tree doubles as the
//! pre-rendered page tree the sidebar links into.

use std::io;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::Response,
    Router,
};
use tokio::signal;
use tower_http::compression::CompressionLayer;

use crate::active;
use crate::html;
use crate::toc::{NodeId, Toc};
use crate::web_assets;

/// Maximum number of consecutive ports to try before giving up.
const MAX_PORT_ATTEMPTS: u16 = 100;

/// Maximum file size that will be read and served (16 MiB).
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Shared application state passed to all request handlers via `Arc<AppState>`.
pub struct AppState {
    /// Directory holding `SUMMARY.md` and the chapter sources.
    pub book_root: PathBuf,
    /// Canonicalized `book_root` used for symlink-safe containment checks.
    pub canonical_root: PathBuf,
    /// The navigation tree, built once at startup.
    pub toc: Toc,
    /// Book title shown in page `<title>`s.
    pub book_title: Option<String>,
}

/// Attempt to bind a TCP listener on `bind_addr` starting at `start_port`.
///
/// On `EADDRINUSE` the port is incremented by one and the attempt is retried
/// up to `MAX_PORT_ATTEMPTS` times. Any other OS error causes an immediate
/// failure without further retries.
pub fn bind_with_retry(bind_addr: &str, start_port: u16) -> Result<(TcpListener, u16), String> {
    let mut port = start_port;
    eprintln!("[bind] trying port={}", port);
    for _ in 0..MAX_PORT_ATTEMPTS {
        let addr = format!("{}:{}", bind_addr, port);
        match TcpListener::bind(&addr) {
            Ok(listener) => {
                eprintln!("[bind] success port={}", port);
                return Ok((listener, port));
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                let next = port.wrapping_add(1);
                eprintln!("[bind] EADDRINUSE, trying {}", next);
                port = next;
            }
            Err(e) => {
                return Err(format!("bind {}:{} failed: {}", bind_addr, port, e));
            }
        }
    }
    Err(format!(
        "exhausted {} port candidates starting at {}; all ports in use",
        MAX_PORT_ATTEMPTS, start_port,
    ))
}

// ---------------------------------------------------------------------------
// Path resolution helpers
// ---------------------------------------------------------------------------

/// Percent-decode a URL path byte-by-byte (RFC 3986 §2.1).
///
/// Returns `Err(())` if the encoding is malformed (truncated `%XX` sequence
/// or non-hex digit) or if the decoded byte sequence is not valid UTF-8.
pub fn percent_decode(encoded: &str) -> Result<String, ()> {
    let bytes = encoded.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return Err(()); // truncated sequence
            }
            let hi = hex_digit(bytes[i + 1])?;
            let lo = hex_digit(bytes[i + 2])?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| ())
}

fn hex_digit(b: u8) -> Result<u8, ()> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(()),
    }
}

/// Normalize a decoded URL path, stripping `.` and `..` components.
///
/// Splits on `/`, ignores empty components and `.`, resolves `..` by popping
/// the stack. Returns `None` if a `..` would escape the root (stack
/// underflow), which signals a path-traversal attempt.
pub fn normalize_path(decoded: &str) -> Option<PathBuf> {
    let mut parts: Vec<&str> = Vec::new();
    for component in decoded.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return None;
                }
            }
            name => parts.push(name),
        }
    }
    let mut path = PathBuf::new();
    for part in &parts {
        path.push(part);
    }
    Some(path)
}

/// Derive the `Content-Type` value from a file extension (case-insensitive).
///
/// Returns `application/octet-stream` for any unrecognised extension so that
/// browsers never perform MIME sniffing on unknown types.
pub fn mime_for_ext(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "md" => "text/plain; charset=utf-8",
        "css" => "text/css",
        "js" => "text/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Forward-slash string form of a normalized relative path.
fn rel_url(rel: &Path) -> String {
    rel.iter()
        .map(|c| c.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// What a request path resolves to.
#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    /// A book page: the markdown source to render and the canonical page
    /// URL used for active-entry marking.
    Page {
        source: PathBuf,
        url: String,
        branch: &'static str,
    },
    /// A plain file served as-is.
    Asset(PathBuf),
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Resolve a normalized request path against the book root.
///
/// Resolution order:
/// 1. The root and directories resolve to their index page.
/// 2. `*.html` requests map to their markdown source candidates.
/// 3. For the root specifically, a missing index falls back to the first
///    tree entry's source (the landing page aliases the first chapter).
/// 4. Anything else that names an existing file is a static asset.
async fn resolve_request(
    root: &Path,
    rel: &Path,
    first_target: Option<&str>,
) -> Option<Resolved> {
    let rel_str = rel_url(rel);

    // Directory-ish requests become index pages.
    let page_url = if rel_str.is_empty() {
        Some("index.html".to_owned())
    } else if rel_str.ends_with(".html") {
        Some(rel_str.clone())
    } else {
        match tokio::fs::metadata(root.join(rel)).await {
            Ok(m) if m.is_dir() => Some(format!("{rel_str}/index.html")),
            Ok(m) if m.is_file() => return Some(Resolved::Asset(root.join(rel))),
            _ => None,
        }
    };

    let url = page_url?;

    for candidate in crate::toc::source_candidates(&url) {
        let path = root.join(&candidate);
        if is_file(&path).await {
            let branch = if candidate.ends_with("README.md") {
                "readme"
            } else {
                "page"
            };
            return Some(Resolved::Page {
                source: path,
                url,
                branch,
            });
        }
    }

    // Landing-page fallback: serve the first chapter at the root URL.
    if url == "index.html" {
        if let Some(target) = first_target {
            for candidate in crate::toc::source_candidates(target) {
                let path = root.join(&candidate);
                if is_file(&path).await {
                    return Some(Resolved::Page {
                        source: path,
                        url,
                        branch: "root-alias",
                    });
                }
            }
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// 404 Not Found with mandatory security headers.
fn not_found_response() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from("Not Found"))
        .expect("not_found_response builder is infallible")
}

/// 413 Content Too Large with mandatory security headers.
fn too_large_response(norm_path: &str, size: u64) -> Response {
    let body = format!(
        "Content Too Large: {} ({} bytes exceeds {} byte limit)",
        norm_path, size, MAX_FILE_SIZE
    );
    Response::builder()
        .status(StatusCode::PAYLOAD_TOO_LARGE)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from(body))
        .expect("too_large_response builder is infallible")
}

fn asset_response(content_type: &'static str, body: &'static str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from(body))
        .expect("asset_response builder is infallible")
}

/// `Last-Modified` header value for a file, when its mtime is readable.
async fn last_modified_for(path: &Path) -> Option<String> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    let mtime = meta.modified().ok()?;
    Some(httpdate::fmt_http_date(mtime))
}

// ---------------------------------------------------------------------------
// TOC JSON
// ---------------------------------------------------------------------------

fn node_json(toc: &Toc, id: NodeId) -> serde_json::Value {
    let node = toc.node(id);
    serde_json::json!({
        "label": node.label,
        "target": node.target,
        "number": node.number,
        "affix": node.affix,
        "spacer": node.spacer,
        "children": node
            .children
            .iter()
            .map(|&child| node_json(toc, child))
            .collect::<Vec<_>>(),
    })
}

/// The navigation tree as JSON, for tooling.
pub fn toc_json(toc: &Toc, book_title: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "title": book_title,
        "items": toc
            .roots()
            .iter()
            .map(|&id| node_json(toc, id))
            .collect::<Vec<_>>(),
    })
}

// ---------------------------------------------------------------------------
// Axum request handler
// ---------------------------------------------------------------------------

/// Main request handler.
///
/// Steps:
/// 0. Early-exit: embedded assets and `/toc.json` never touch the file
///    system.
/// 1. Percent-decode the raw request path (before any normalisation).
/// 2. Normalise: strip `.`/`..` via component iteration; reject traversal
///    above root.
/// 3. Resolve: directories and `*.html` URLs map to markdown sources with
///    the root-alias fallback; other files are static assets.
/// 4. Canonicalise the resolved path and re-verify containment (symlink
///    safe).
/// 5. Stat the file; reject with 413 if size exceeds `MAX_FILE_SIZE`.
/// 6. Dispatch: pages render through the sidebar shell with per-request
///    active marks; assets serve with extension-derived MIME types.
///
/// All responses include `X-Content-Type-Options: nosniff`.
async fn serve_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let raw_path = req.uri().path().to_owned();

    // Step 0: embedded assets and the TOC dump.
    if raw_path == "/assets/mdtoc.css" {
        eprintln!("[request] path={raw_path} mode=asset");
        return asset_response("text/css; charset=utf-8", web_assets::CSS);
    }
    if raw_path == "/assets/mdtoc.js" {
        eprintln!("[request] path={raw_path} mode=asset");
        return asset_response("text/javascript; charset=utf-8", web_assets::JS);
    }
    if raw_path == "/toc.json" {
        eprintln!("[request] path={raw_path} mode=toc-json");
        let json = toc_json(&state.toc, state.book_title.as_deref());
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Content-Type-Options", "nosniff")
            .body(Body::from(json.to_string()))
            .expect("toc json response builder is infallible");
    }

    // Step 1: percent-decode.
    let decoded = match percent_decode(&raw_path) {
        Ok(d) => d,
        Err(_) => {
            eprintln!("[resolve] path={raw_path} branch=denied reason=invalid-percent-encoding");
            return not_found_response();
        }
    };

    // Reject null bytes anywhere in the decoded path.
    if decoded.contains('\0') {
        eprintln!("[resolve] path={raw_path} branch=denied reason=null-byte");
        return not_found_response();
    }

    // Step 2: normalise.
    let normalized = match normalize_path(&decoded) {
        Some(n) => n,
        None => {
            eprintln!("[resolve] path={raw_path} branch=denied reason=path-traversal");
            return not_found_response();
        }
    };

    let norm_display = normalized.display().to_string();

    // Step 3: resolve to a page source or a static asset.
    let first_target = state.toc.links().next().map(|(_, t)| t.to_owned());
    let resolved = match resolve_request(
        &state.book_root,
        &normalized,
        first_target.as_deref(),
    )
    .await
    {
        Some(r) => r,
        None => {
            eprintln!("[resolve] path={norm_display} branch=denied reason=not-found");
            return not_found_response();
        }
    };

    let (file_path, page, branch) = match resolved {
        Resolved::Page {
            source,
            url,
            branch,
        } => (source, Some(url), branch),
        Resolved::Asset(path) => (path, None, "asset"),
    };

    // Step 4: canonicalise and re-verify containment (symlink-safe).
    let canonical = match tokio::fs::canonicalize(&file_path).await {
        Ok(c) => c,
        Err(_) => {
            eprintln!("[resolve] path={norm_display} branch=denied reason=canonicalize-failed");
            return not_found_response();
        }
    };

    if !canonical.starts_with(&state.canonical_root) {
        eprintln!(
            "[resolve] path={norm_display} branch=denied reason=outside-root canonical={}",
            canonical.display()
        );
        return not_found_response();
    }

    // Step 5: file size guard — stat before reading.
    let size = match tokio::fs::metadata(&canonical).await {
        Ok(m) => m.len(),
        Err(_) => {
            eprintln!("[resolve] path={norm_display} branch=denied reason=metadata-failed");
            return not_found_response();
        }
    };

    if size > MAX_FILE_SIZE {
        eprintln!("[resolve] path={norm_display} branch=denied reason=too-large size={size}");
        return too_large_response(&norm_display, size);
    }

    eprintln!("[resolve] path={norm_display} branch={branch} size={size}");
    let last_modified = last_modified_for(&canonical).await;

    // Step 6: dispatch.
    if let Some(url) = page {
        let content = match tokio::fs::read_to_string(&canonical).await {
            Ok(c) => c,
            Err(_) => return not_found_response(),
        };

        let prefix = active::path_to_root_for(&url);
        let marks = active::compute_marks(&state.toc, &url, &prefix);
        let fragment = html::render_toc_fragment(&state.toc, &marks, &prefix);
        let rendered = html::render_markdown(&content);
        let shell = html::build_page_shell(
            &rendered.body,
            &fragment,
            rendered.title.as_deref(),
            state.book_title.as_deref(),
            &prefix,
        );

        eprintln!("[request] path={norm_display} url={url} mode=rendered");
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
            .header("X-Content-Type-Options", "nosniff");
        if let Some(value) = last_modified {
            builder = builder.header(header::LAST_MODIFIED, value);
        }
        builder
            .body(Body::from(shell))
            .expect("page response builder is infallible")
    } else {
        let bytes = match tokio::fs::read(&canonical).await {
            Ok(b) => b,
            Err(_) => return not_found_response(),
        };
        let ext = canonical
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime_for_ext(ext))
            .header("X-Content-Type-Options", "nosniff");
        if let Some(value) = last_modified {
            builder = builder.header(header::LAST_MODIFIED, value);
        }
        builder
            .body(Body::from(bytes))
            .expect("static asset response builder is infallible")
    }
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Locate the book's `SUMMARY.md` under `book_dir` (directly or in `src/`).
pub fn find_summary(book_dir: &Path) -> Option<PathBuf> {
    let direct = book_dir.join("SUMMARY.md");
    if direct.is_file() {
        return Some(direct);
    }
    let nested = book_dir.join("src").join("SUMMARY.md");
    if nested.is_file() {
        return Some(nested);
    }
    None
}

/// Start the HTTP server for the given book directory.
///
/// Binds to `bind_addr` starting at `start_port`, retrying on `EADDRINUSE`
/// up to 100 times. The server shuts down cleanly when SIGINT (Ctrl+C) is
/// received.
pub async fn run_serve(book_dir: String, bind_addr: String, start_port: u16) -> io::Result<()> {
    let dir = PathBuf::from(&book_dir);
    let summary_path = find_summary(&dir).ok_or_else(|| {
        eprintln!("Error: no SUMMARY.md found under '{book_dir}' (or its src/)");
        io::Error::new(io::ErrorKind::NotFound, "SUMMARY.md not found")
    })?;

    let summary = tokio::fs::read_to_string(&summary_path).await?;
    let toc = Toc::from_summary(&summary);
    if toc.is_empty() {
        eprintln!(
            "[serve] warning: empty navigation tree in {}",
            summary_path.display()
        );
    }

    let book_root = summary_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let canonical_root =
        std::fs::canonicalize(&book_root).unwrap_or_else(|_| book_root.clone());

    // The summary's own heading is usually just "Summary"; only a real
    // title is worth showing.
    let book_title = toc
        .title()
        .filter(|t| !t.eq_ignore_ascii_case("summary"))
        .map(|t| t.to_owned());

    let state = Arc::new(AppState {
        book_root,
        canonical_root,
        toc,
        book_title,
    });

    let (std_listener, bound_port) = bind_with_retry(&bind_addr, start_port).map_err(|msg| {
        eprintln!("Error: {}", msg);
        io::Error::new(io::ErrorKind::AddrInUse, msg)
    })?;

    std_listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(std_listener)?;

    let app = Router::new()
        .fallback(serve_handler)
        .layer(CompressionLayer::new())
        .with_state(state);

    eprintln!("[serve] listening on {}:{}", bind_addr, bound_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c()
                .await
                .expect("failed to install SIGINT handler");
            eprintln!("[shutdown] complete");
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- percent_decode ---

    #[test]
    fn decode_plain_ascii() {
        assert_eq!(percent_decode("/docs/guide").unwrap(), "/docs/guide");
    }

    #[test]
    fn decode_dot_dot_sequences() {
        assert_eq!(percent_decode("%2e%2e").unwrap(), "..");
        assert_eq!(percent_decode("%2E%2E").unwrap(), "..");
        assert_eq!(percent_decode("%2f").unwrap(), "/");
    }

    #[test]
    fn decode_truncated_sequence_fails() {
        assert!(percent_decode("abc%2").is_err());
        assert!(percent_decode("abc%").is_err());
    }

    #[test]
    fn decode_non_hex_fails() {
        assert!(percent_decode("%zz").is_err());
    }

    #[test]
    fn decode_invalid_utf8_fails() {
        assert!(percent_decode("%ff%fe").is_err());
    }

    // --- normalize_path ---

    #[test]
    fn normalize_plain_path() {
        assert_eq!(
            normalize_path("/a/b/c.html").unwrap(),
            PathBuf::from("a/b/c.html")
        );
    }

    #[test]
    fn normalize_strips_dot_components() {
        assert_eq!(normalize_path("/a/./b").unwrap(), PathBuf::from("a/b"));
    }

    #[test]
    fn normalize_resolves_inner_dotdot() {
        assert_eq!(normalize_path("/a/b/../c").unwrap(), PathBuf::from("a/c"));
    }

    #[test]
    fn normalize_rejects_escape() {
        assert_eq!(normalize_path("/../etc/passwd"), None);
        assert_eq!(normalize_path("/a/../../etc"), None);
    }

    // --- mime_for_ext ---

    #[test]
    fn mime_known_extensions() {
        assert_eq!(mime_for_ext("html"), "text/html; charset=utf-8");
        assert_eq!(mime_for_ext("PNG"), "image/png");
        assert_eq!(mime_for_ext("md"), "text/plain; charset=utf-8");
    }

    #[test]
    fn mime_unknown_is_octet_stream() {
        assert_eq!(mime_for_ext("exe"), "application/octet-stream");
        assert_eq!(mime_for_ext(""), "application/octet-stream");
    }

    // --- resolve_request ---

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(path, content).expect("write file");
    }

    #[tokio::test]
    async fn resolve_html_to_md_source() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_file(&tmp.path().join("03-setup/linux.md"), "# Linux\n");

        let resolved = resolve_request(tmp.path(), Path::new("03-setup/linux.html"), None)
            .await
            .expect("resolved");
        assert_eq!(
            resolved,
            Resolved::Page {
                source: tmp.path().join("03-setup/linux.md"),
                url: "03-setup/linux.html".to_owned(),
                branch: "page",
            }
        );
    }

    #[tokio::test]
    async fn resolve_directory_to_index() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_file(&tmp.path().join("03-setup/index.md"), "# Setup\n");

        let resolved = resolve_request(tmp.path(), Path::new("03-setup"), None)
            .await
            .expect("resolved");
        match resolved {
            Resolved::Page { url, branch, .. } => {
                assert_eq!(url, "03-setup/index.html");
                assert_eq!(branch, "page");
            }
            other => panic!("expected page, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_readme_alias() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_file(&tmp.path().join("guide/README.md"), "# Guide\n");

        let resolved = resolve_request(tmp.path(), Path::new("guide/index.html"), None)
            .await
            .expect("resolved");
        match resolved {
            Resolved::Page { source, branch, .. } => {
                assert_eq!(source, tmp.path().join("guide/README.md"));
                assert_eq!(branch, "readme");
            }
            other => panic!("expected page, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_root_falls_back_to_first_chapter() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_file(&tmp.path().join("01-background/index.md"), "# Background\n");

        let resolved = resolve_request(
            tmp.path(),
            Path::new(""),
            Some("01-background/index.html"),
        )
        .await
        .expect("resolved");
        match resolved {
            Resolved::Page {
                source,
                url,
                branch,
            } => {
                assert_eq!(source, tmp.path().join("01-background/index.md"));
                // The URL stays at the root so the landing page aliases the
                // first chapter in the sidebar.
                assert_eq!(url, "index.html");
                assert_eq!(branch, "root-alias");
            }
            other => panic!("expected page, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_static_asset() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_file(&tmp.path().join("images/board.png"), "png");

        let resolved = resolve_request(tmp.path(), Path::new("images/board.png"), None)
            .await
            .expect("resolved");
        assert_eq!(
            resolved,
            Resolved::Asset(tmp.path().join("images/board.png"))
        );
    }

    #[tokio::test]
    async fn resolve_missing_returns_none() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert!(resolve_request(tmp.path(), Path::new("nope.html"), None)
            .await
            .is_none());
    }

    // --- toc_json ---

    #[test]
    fn toc_json_shape() {
        let mut b = crate::toc::TocBuilder::new();
        b.push_entry("Setup", Some("setup/index.html".into()));
        b.begin_section();
        b.push_entry("Linux", Some("setup/linux.html".into()));
        b.end_section();
        let toc = b.build();

        let json = toc_json(&toc, Some("Discovery"));
        assert_eq!(json["title"], "Discovery");
        assert_eq!(json["items"][0]["label"], "Setup");
        assert_eq!(json["items"][0]["number"], "1.");
        assert_eq!(json["items"][0]["children"][0]["label"], "Linux");
    }
}
