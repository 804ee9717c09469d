//! Remote image integration tests: the real `reqwest` fetcher against a local
//! HTTP server, including the placeholder fallback on 404 and refused
//! connections.

use image::{DynamicImage, ImageFormat as CodecFormat, Rgb, RgbImage};
use std::io::{Cursor, Read as _, Write as _};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use webthumb::acquire::{
    FetchError, Fetcher, HttpFetcher, ImageSource, Placeholder, RemoteImage, SourceDescriptor,
};
use webthumb::capture::{CaptureBridge, CaptureTiming, UnavailableLauncher, Viewport};
use webthumb::config::OutputConfig;
use webthumb::imaging::ImageFormat;
use webthumb::transform::{Thumbnailer, TransformRequest};
use webthumb::types::Warning;

// ===========================================================================
// Minimal HTTP server
// ===========================================================================

struct TestServer {
    port: u16,
    _stop: std::sync::mpsc::Sender<()>,
}

impl TestServer {
    /// Serves `/photo.png` (a 120x80 PNG); every other path is a 404.
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let png = Arc::new(png_bytes(120, 80));

        thread::spawn(move || {
            listener.set_nonblocking(true).unwrap();
            loop {
                if rx.try_recv().is_ok() {
                    break;
                }
                match listener.accept() {
                    Ok((stream, _)) => {
                        let png = Arc::clone(&png);
                        thread::spawn(move || serve_request(stream, &png));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self { port, _stop: tx }
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

fn serve_request(mut stream: std::net::TcpStream, png: &[u8]) {
    // accepted sockets can inherit non-blocking mode on some platforms
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 4096];
    let n = match stream.read(&mut buf) {
        Ok(n) if n > 0 => n,
        _ => return,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request.split_whitespace().nth(1).unwrap_or("/");

    let (status, body, ct): (&str, &[u8], &str) = if path == "/photo.png" {
        ("200 OK", png, "image/png")
    } else {
        ("404 Not Found", b"not found", "text/plain")
    };
    let header = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {ct}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), CodecFormat::Png)
        .unwrap();
    buf
}

/// Talks to the local server directly, whatever proxy the environment sets.
fn fetcher() -> HttpFetcher {
    let client = reqwest::blocking::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    HttpFetcher::from_client(client)
}

fn thumbnailer() -> Thumbnailer {
    Thumbnailer::new(
        Box::new(fetcher()),
        CaptureBridge::new(Arc::new(UnavailableLauncher), CaptureTiming::default()),
        Placeholder::Blank {
            width: 10,
            height: 10,
        },
        Viewport::default(),
        OutputConfig::default(),
    )
}

/// A port nothing is listening on.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ===========================================================================
// Fetcher
// ===========================================================================

#[test]
fn fetches_image_bytes() {
    let server = TestServer::start();
    let body = fetcher().fetch(&server.url("/photo.png")).unwrap();
    assert_eq!(&body[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn non_success_status_is_reported() {
    let server = TestServer::start();
    let err = fetcher().fetch(&server.url("/missing.png")).unwrap_err();
    assert!(matches!(err, FetchError::Status(404)));
}

#[test]
fn refused_connection_is_transport_error() {
    let url = format!("http://127.0.0.1:{}/photo.png", closed_port());
    let err = fetcher().fetch(&url).unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}

// ===========================================================================
// Remote source with placeholder fallback
// ===========================================================================

#[test]
fn remote_image_decodes() {
    let server = TestServer::start();
    let http = fetcher();
    let placeholder = Placeholder::Blank {
        width: 1,
        height: 1,
    };
    let out = RemoteImage {
        url: &server.url("/photo.png"),
        fetcher: &http,
        placeholder: &placeholder,
    }
    .load()
    .unwrap();
    assert!(out.warning.is_none());
    assert_eq!((out.value.width(), out.value.height()), (120, 80));
}

#[test]
fn missing_remote_image_becomes_placeholder() {
    let server = TestServer::start();
    let http = fetcher();
    let placeholder = Placeholder::Blank {
        width: 3,
        height: 3,
    };
    let out = RemoteImage {
        url: &server.url("/missing.png"),
        fetcher: &http,
        placeholder: &placeholder,
    }
    .load()
    .unwrap();
    assert_eq!((out.value.width(), out.value.height()), (3, 3));
    assert!(matches!(out.warning, Some(Warning::ImageNotFound { .. })));
}

// ===========================================================================
// End to end through the Thumbnailer
// ===========================================================================

#[test]
fn thumbnail_of_remote_image() {
    let server = TestServer::start();
    let url = server.url("/photo.png");
    let source = SourceDescriptor::classify_url(&url);
    assert!(matches!(source, SourceDescriptor::RemoteImage(_)));

    let request = TransformRequest::new(source, 60, 40).with_format(ImageFormat::Jpeg);
    let out = thumbnailer().transform(&request).unwrap();
    assert!(out.warning.is_none());
    let img = image::load_from_memory(&out.value.bytes).unwrap();
    assert_eq!((img.width(), img.height()), (60, 40));
}

#[test]
fn unreachable_remote_image_still_produces_thumbnail() {
    let url = format!("http://127.0.0.1:{}/photo.png", closed_port());
    let request = TransformRequest::new(SourceDescriptor::classify_url(&url), 20, 20);
    let out = thumbnailer().transform(&request).unwrap();
    assert_eq!(out.warning.as_ref().map(|w| w.to_string()).as_deref(), Some("Image was not found"));
    assert_eq!((out.value.width, out.value.height), (20, 20));
}
