use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tempfile::TempDir;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(6);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Clone, Copy)]
struct FixtureOptions {
    include_large_file: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            include_large_file: false,
        }
    }
}

/// A book directory fixture mirroring the layout the summary loader
/// expects: SUMMARY.md, chapter sources, a README-aliased appendix, a
/// static image, and one page that is not in the tree.
struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new(opts: FixtureOptions) -> Self {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let root = tmp.path().to_path_buf();

        let write = |rel: &str, content: &str| {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent dirs");
            }
            fs::write(&path, content).expect("write fixture file");
        };

        // Built from explicit line segments: list nesting depends on leading
        // spaces, which string-literal continuations would strip.
        write(
            "SUMMARY.md",
            concat!(
                "# Discovery\n",
                "\n",
                "[Introduction](intro.md)\n",
                "\n",
                "- [Background](01-background/index.md)\n",
                "- [LED Roulette](05-led-roulette/index.md)\n",
                "  - [Build it](05-led-roulette/build-it.md)\n",
                "  - [Flash it](05-led-roulette/flash-it.md)\n",
                "- [Draft chapter]()\n",
                "\n",
                "---\n",
                "\n",
                "[Troubleshooting](appendix/README.md)\n",
            ),
        );

        write("intro.md", "# Introduction\n\nWelcome.\n");
        write("01-background/index.md", "# Background\n\nSome history.\n");
        write(
            "05-led-roulette/index.md",
            "# LED Roulette\n\nSee [Build it](build-it.md).\n\n| A | B |\n|---|---|\n| 1 | 2 |\n",
        );
        write(
            "05-led-roulette/build-it.md",
            "# Build it\n\n```rust\nfn main() {}\n```\n",
        );
        write("05-led-roulette/flash-it.md", "# Flash it\n\nFlash.\n");
        write("appendix/README.md", "# Troubleshooting\n\nHelp.\n");
        write("extra.md", "# Extra\n\nNot in the tree.\n");

        fs::create_dir_all(root.join("images")).expect("create images dir");
        fs::write(
            root.join("images").join("board.png"),
            [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'],
        )
        .expect("write image");

        if opts.include_large_file {
            let path = root.join("oversized.md");
            let file = fs::File::create(path).expect("create oversized file");
            file.set_len(MAX_FILE_SIZE + 1)
                .expect("set oversized file len");
        }

        Self { _tmp: tmp, root }
    }
}

struct ResponseSnapshot {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseSnapshot {
    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_owned())
    }

    fn context(&self) -> String {
        let mut hdrs = String::new();
        for (k, v) in &self.headers {
            let value = v.to_str().unwrap_or("<non-utf8>");
            hdrs.push_str(&format!("{}: {}\n", k.as_str(), value));
        }
        format!(
            "status={}\nheaders:\n{}\nbody:\n{}",
            self.status,
            hdrs,
            self.body_text()
        )
    }
}

struct ServerHandle {
    child: Option<Child>,
    base_url: String,
    port: u16,
}

impl ServerHandle {
    fn new(scenario: &str, fixture: &Fixture) -> Self {
        let port = free_port();
        eprintln!("[TEST] scenario={} port={}", scenario, port);

        let mut child = Command::new(bin_path())
            .arg("serve")
            .arg("--bind")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(port.to_string())
            .arg(&fixture.root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn mdtoc serve");

        let base_url = format!("http://127.0.0.1:{port}");
        wait_for_server_ready(&mut child, &base_url);

        Self {
            child: Some(child),
            base_url,
            port,
        }
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    fn shutdown_with_sigint(mut self) -> Output {
        let mut child = self.child.take().expect("server child exists");
        send_sigint(child.id());
        wait_with_timeout(&mut child, Duration::from_secs(5));
        child.wait_with_output().expect("collect server output")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        if child.try_wait().ok().flatten().is_none() {
            let _ = child.kill();
        }
        let _ = child.wait();
    }
}

fn bin_path() -> String {
    std::env::var("CARGO_BIN_EXE_mdtoc").expect("CARGO_BIN_EXE_mdtoc is set by cargo test")
}

fn client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("build reqwest client")
}

fn client_no_auto_decode() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .no_gzip()
        .no_brotli()
        .build()
        .expect("build reqwest client")
}

fn fetch(client: &Client, url: &str) -> ResponseSnapshot {
    let resp = client
        .get(url)
        .send()
        .unwrap_or_else(|e| panic!("GET {} failed: {e}", url));
    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let body = resp
        .bytes()
        .unwrap_or_else(|e| panic!("read body for {} failed: {e}", url))
        .to_vec();

    ResponseSnapshot {
        status,
        headers,
        body,
    }
}

fn fetch_with_headers(client: &Client, url: &str, headers: &[(&str, &str)]) -> ResponseSnapshot {
    let mut map = HeaderMap::new();
    for (k, v) in headers {
        let name = HeaderName::from_bytes(k.as_bytes()).expect("valid header name");
        let value = HeaderValue::from_str(v).expect("valid header value");
        map.insert(name, value);
    }

    let resp = client
        .get(url)
        .headers(map)
        .send()
        .unwrap_or_else(|e| panic!("GET {} failed: {e}", url));
    let status = resp.status().as_u16();
    let out_headers = resp.headers().clone();
    let body = resp
        .bytes()
        .unwrap_or_else(|e| panic!("read body for {} failed: {e}", url))
        .to_vec();

    ResponseSnapshot {
        status,
        headers: out_headers,
        body,
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local addr").port()
}

fn wait_for_server_ready(child: &mut Child, base_url: &str) {
    let ready_client = Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .expect("build readiness client");

    let start = std::time::Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("try_wait server") {
            let mut stdout = String::new();
            let mut stderr = String::new();
            if let Some(mut out) = child.stdout.take() {
                let _ = out.read_to_string(&mut stdout);
            }
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_string(&mut stderr);
            }
            panic!(
                "server exited early status={}\nstdout:\n{}\nstderr:\n{}",
                status, stdout, stderr
            );
        }

        if ready_client.get(format!("{}/", base_url)).send().is_ok() {
            return;
        }

        if start.elapsed() > STARTUP_TIMEOUT {
            panic!("server did not become ready within {:?}", STARTUP_TIMEOUT);
        }

        thread::sleep(Duration::from_millis(50));
    }
}

fn assert_status(resp: &ResponseSnapshot, expected: u16) {
    assert_eq!(
        resp.status,
        expected,
        "unexpected HTTP status\n{}",
        resp.context()
    );
}

fn assert_header_contains(resp: &ResponseSnapshot, name: &str, needle: &str) {
    let value = resp
        .header(name)
        .unwrap_or_else(|| panic!("missing header '{}'\n{}", name, resp.context()));
    assert!(
        value.contains(needle),
        "header '{}' value '{}' does not contain '{}'\n{}",
        name,
        value,
        needle,
        resp.context()
    );
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) {
    let start = std::time::Instant::now();
    loop {
        if child.try_wait().expect("try_wait child").is_some() {
            return;
        }
        if start.elapsed() >= timeout {
            return;
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[cfg(unix)]
fn send_sigint(pid: u32) {
    let status = Command::new("kill")
        .arg("-INT")
        .arg(pid.to_string())
        .status()
        .expect("send SIGINT");
    assert!(status.success(), "kill -INT failed for pid {pid}");
}

#[cfg(not(unix))]
fn send_sigint(_pid: u32) {
    panic!("SIGINT test is only supported on unix");
}

fn raw_http_status(port: u16, path: &str) -> u16 {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect raw http");
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("set read timeout");
    stream
        .set_write_timeout(Some(Duration::from_secs(2)))
        .expect("set write timeout");
    let req = format!(
        "GET {} HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nConnection: close\r\n\r\n",
        path, port
    );
    stream.write_all(req.as_bytes()).expect("write raw request");

    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).expect("read raw response");
    let text = String::from_utf8_lossy(&bytes);
    let mut lines = text.lines();
    let status_line = lines.next().expect("status line present");
    let mut parts = status_line.split_whitespace();
    let _http = parts.next().expect("http version present");
    let code = parts.next().expect("status code present");
    code.parse::<u16>().expect("parse status code")
}

#[test]
fn test_serve_basic_html() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_basic_html", &fixture);

    let resp = fetch(&client(), &server.url("/"));
    assert_status(&resp, 200);
    assert_header_contains(&resp, "content-type", "text/html");
}

#[test]
fn test_serve_sidebar_present() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_sidebar_present", &fixture);

    let resp = fetch(&client(), &server.url("/"));
    assert_status(&resp, 200);
    let body = resp.body_text();
    assert!(
        body.contains("<ol class=\"chapter\">")
            && body.contains("<a href=\"05-led-roulette/index.html\">"),
        "sidebar not present\n{}",
        resp.context()
    );
}

#[test]
fn test_root_aliases_first_chapter() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_root_aliases_first_chapter", &fixture);

    // No index.md exists; the root serves the introduction and the first
    // sidebar link is marked active.
    let resp = fetch(&client(), &server.url("/"));
    assert_status(&resp, 200);
    let body = resp.body_text();
    assert!(
        body.contains("Welcome."),
        "introduction content missing\n{}",
        resp.context()
    );
    assert!(
        body.contains("<a href=\"intro.html\" class=\"active\">Introduction</a>"),
        "first link not active\n{}",
        resp.context()
    );
}

#[test]
fn test_active_entry_marked_and_ancestors_expanded() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_active_entry_marked", &fixture);

    let resp = fetch(&client(), &server.url("/05-led-roulette/build-it.html"));
    assert_status(&resp, 200);
    let body = resp.body_text();

    // The page's own link is active, resolved against the ../ prefix.
    assert!(
        body.contains(
            "<a href=\"../05-led-roulette/build-it.html\" class=\"active\"><strong aria-hidden=\"true\">2.1.</strong> Build it</a>"
        ),
        "active link missing\n{}",
        resp.context()
    );
    // Exactly one active link.
    assert_eq!(
        body.matches("class=\"active\"").count(),
        1,
        "expected exactly one active link\n{}",
        resp.context()
    );
    // The enclosing chapter is expanded.
    assert!(
        body.contains(
            "<li class=\"chapter-item expanded\"><a href=\"../05-led-roulette/index.html\">"
        ),
        "parent chapter not expanded\n{}",
        resp.context()
    );
}

#[test]
fn test_page_outside_tree_has_no_active() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_page_outside_tree_has_no_active", &fixture);

    let resp = fetch(&client(), &server.url("/extra.html"));
    assert_status(&resp, 200);
    let body = resp.body_text();
    assert!(
        !body.contains("class=\"active\""),
        "unexpected active link for a page outside the tree\n{}",
        resp.context()
    );
}

#[test]
fn test_draft_and_spacer_markup() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_draft_and_spacer_markup", &fixture);

    let resp = fetch(&client(), &server.url("/"));
    let body = resp.body_text();
    assert!(
        body.contains("<div><strong aria-hidden=\"true\">3.</strong> Draft chapter</div>"),
        "draft chapter not rendered as non-link\n{}",
        resp.context()
    );
    assert!(
        body.contains("<li class=\"spacer\"></li>"),
        "spacer missing\n{}",
        resp.context()
    );
    assert!(
        body.contains("<a class=\"toggle\">"),
        "toggle anchor missing\n{}",
        resp.context()
    );
}

#[test]
fn test_serve_directory_resolves_index() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_directory_resolves_index", &fixture);

    let resp = fetch(&client(), &server.url("/05-led-roulette"));
    assert_status(&resp, 200);
    assert!(
        resp.body_text().contains("LED Roulette"),
        "directory index not rendered\n{}",
        resp.context()
    );
}

#[test]
fn test_serve_readme_alias_resolves() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_readme_alias_resolves", &fixture);

    let resp = fetch(&client(), &server.url("/appendix/index.html"));
    assert_status(&resp, 200);
    assert!(
        resp.body_text().contains("Troubleshooting"),
        "README alias not rendered\n{}",
        resp.context()
    );
}

#[test]
fn test_serve_local_md_link_rewritten() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_local_md_link_rewritten", &fixture);

    let resp = fetch(&client(), &server.url("/05-led-roulette/index.html"));
    assert_status(&resp, 200);
    assert!(
        resp.body_text().contains("href=\"build-it.html\""),
        "local .md link not rewritten\n{}",
        resp.context()
    );
}

#[test]
fn test_serve_table_rendered() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_table_rendered", &fixture);

    let resp = fetch(&client(), &server.url("/05-led-roulette/index.html"));
    assert_status(&resp, 200);
    assert!(
        resp.body_text().contains("<table>"),
        "table not rendered\n{}",
        resp.context()
    );
}

#[test]
fn test_serve_static_asset_image() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_static_asset_image", &fixture);

    let resp = fetch(&client(), &server.url("/images/board.png"));
    assert_status(&resp, 200);
    assert_header_contains(&resp, "content-type", "image/png");
}

#[test]
fn test_serve_embedded_assets() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_embedded_assets", &fixture);

    let css = fetch(&client(), &server.url("/assets/mdtoc.css"));
    assert_status(&css, 200);
    assert_header_contains(&css, "content-type", "text/css");

    let js = fetch(&client(), &server.url("/assets/mdtoc.js"));
    assert_status(&js, 200);
    assert_header_contains(&js, "content-type", "text/javascript");
    assert!(
        js.body_text().contains("sidebar-scroll"),
        "scroll persistence script missing\n{}",
        js.context()
    );
}

#[test]
fn test_serve_page_links_assets_via_prefix() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_page_links_assets_via_prefix", &fixture);

    let resp = fetch(&client(), &server.url("/05-led-roulette/build-it.html"));
    let body = resp.body_text();
    assert!(
        body.contains("href=\"../assets/mdtoc.css\""),
        "stylesheet link missing prefix\n{}",
        resp.context()
    );
    assert!(
        body.contains("var path_to_root = \"../\";"),
        "client prefix missing\n{}",
        resp.context()
    );
}

#[test]
fn test_serve_toc_json() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_toc_json", &fixture);

    let resp = fetch(&client(), &server.url("/toc.json"));
    assert_status(&resp, 200);
    assert_header_contains(&resp, "content-type", "application/json");

    let json: serde_json::Value =
        serde_json::from_slice(&resp.body).expect("parse toc.json body");
    assert_eq!(json["title"], "Discovery");
    assert_eq!(json["items"][0]["label"], "Introduction");
    assert_eq!(json["items"][0]["affix"], true);
    assert_eq!(json["items"][2]["children"][0]["label"], "Build it");
}

#[test]
fn test_serve_traversal_denied() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_traversal_denied", &fixture);

    // Raw socket: reqwest would normalise the path before sending.
    let status = raw_http_status(server.port, "/../SUMMARY.md");
    assert_eq!(status, 404, "traversal must be rejected");
}

#[test]
fn test_serve_url_encoded_traversal_denied() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_url_encoded_traversal_denied", &fixture);

    let status = raw_http_status(server.port, "/%2e%2e/%2e%2e/etc/passwd");
    assert_eq!(status, 404, "encoded traversal must be rejected");
}

#[cfg(unix)]
#[test]
fn test_serve_symlink_escape_denied() {
    let fixture = Fixture::new(FixtureOptions::default());

    // A symlink inside the book pointing outside the root must not resolve.
    let outside = tempfile::tempdir().expect("outside tempdir");
    fs::write(outside.path().join("secret.md"), "# Secret\n").expect("write secret");
    std::os::unix::fs::symlink(
        outside.path().join("secret.md"),
        fixture.root.join("leak.md"),
    )
    .expect("create symlink");

    let server = ServerHandle::new("test_serve_symlink_escape_denied", &fixture);
    let resp = fetch(&client(), &server.url("/leak.html"));
    assert_status(&resp, 404);
}

#[test]
fn test_serve_nosniff_header() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_nosniff_header", &fixture);

    for path in ["/", "/images/board.png", "/missing.html", "/toc.json"] {
        let resp = fetch(&client(), &server.url(path));
        assert_header_contains(&resp, "x-content-type-options", "nosniff");
    }
}

#[test]
fn test_serve_last_modified_present() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_last_modified_present", &fixture);

    let resp = fetch(&client(), &server.url("/01-background/index.html"));
    assert_status(&resp, 200);
    let value = resp
        .header("last-modified")
        .unwrap_or_else(|| panic!("missing last-modified header\n{}", resp.context()));
    let parsed = httpdate::parse_http_date(&value).expect("parse last-modified");
    assert!(parsed <= std::time::SystemTime::now() + Duration::from_secs(5));
}

#[test]
fn test_serve_oversized_page_rejected() {
    let fixture = Fixture::new(FixtureOptions {
        include_large_file: true,
    });
    let server = ServerHandle::new("test_serve_oversized_page_rejected", &fixture);

    let resp = fetch(&client(), &server.url("/oversized.html"));
    assert_status(&resp, 413);
}

#[test]
fn test_serve_gzip_compression() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_gzip_compression", &fixture);

    let resp = fetch_with_headers(
        &client_no_auto_decode(),
        &server.url("/"),
        &[("accept-encoding", "gzip")],
    );
    assert_status(&resp, 200);
    assert_header_contains(&resp, "content-encoding", "gzip");
}

#[test]
fn test_serve_404_for_unknown_path() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_404_for_unknown_path", &fixture);

    let resp = fetch(&client(), &server.url("/99-missing/page.html"));
    assert_status(&resp, 404);
}

#[cfg(unix)]
#[test]
fn test_serve_sigint_shutdown() {
    let fixture = Fixture::new(FixtureOptions::default());
    let server = ServerHandle::new("test_serve_sigint_shutdown", &fixture);

    let output = server.shutdown_with_sigint();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("[shutdown] complete"),
        "graceful shutdown message missing:\n{}",
        stderr
    );
}
