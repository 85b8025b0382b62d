//! Minimal HTTP/1.1 server that serves one JSON item per id for integration tests.
//!
//! `GET /item/<id>` answers 200 with `{"id":"<id>"}\n`. Ids listed as
//! throttled get the throttle body instead (still 200, as the real API does),
//! and missing ids get 404 with `null\n`. Ids listed in `raw` get their bytes
//! verbatim with 200. [`start_silent`] accepts connections and never answers.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ItemServerOptions {
    /// Ids answered with `throttle_body`.
    pub throttled: Vec<String>,
    /// Body sent for throttled ids.
    pub throttle_body: String,
    /// Ids answered with 404.
    pub missing: Vec<String>,
    /// Delay before every response.
    pub delay: Duration,
    /// Ids answered with these exact bytes (need not be UTF-8).
    pub raw: Vec<(String, Vec<u8>)>,
}

/// Starts a server in a background thread. Returns the URL template
/// (e.g. "http://127.0.0.1:12345/item/%s"). The server runs until the process exits.
pub fn start() -> String {
    start_with_options(ItemServerOptions::default())
}

pub fn start_with_options(opts: ItemServerOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let opts = Arc::new(opts);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let opts = Arc::clone(&opts);
            thread::spawn(move || handle(stream, &opts));
        }
    });
    format!("http://127.0.0.1:{}/item/%s", port)
}

/// Starts a listener that accepts connections and holds them open without
/// ever replying. Returns the URL template.
pub fn start_silent() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    format!("http://127.0.0.1:{}/item/%s", port)
}

fn handle(mut stream: std::net::TcpStream, opts: &ItemServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, path) = parse_request_line(request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    if !opts.delay.is_zero() {
        thread::sleep(opts.delay);
    }
    let (status, body): (&str, Vec<u8>) = match path.strip_prefix("/item/") {
        Some(id) if opts.throttled.iter().any(|t| t == id) => {
            ("200 OK", opts.throttle_body.clone().into_bytes())
        }
        Some(id) if opts.missing.iter().any(|m| m == id) => {
            ("404 Not Found", b"null\n".to_vec())
        }
        Some(id) => match opts.raw.iter().find(|(r, _)| r == id) {
            Some((_, bytes)) => ("200 OK", bytes.clone()),
            None => ("200 OK", format!("{{\"id\":\"{}\"}}\n", id).into_bytes()),
        },
        None => ("404 Not Found", Vec::new()),
    };
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
}

/// Returns (method, path) from the request line.
fn parse_request_line(request: &str) -> (&str, &str) {
    let line = request.lines().next().unwrap_or("");
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    (method, path)
}
