// ABOUTME: Preview server for the hero-panel application
// ABOUTME: Serves the live page, panel snapshots, image files and the contact endpoint

use log::{debug, error, info};
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::config::ContactConfig;
use crate::contact::{self, NotificationSink};
use crate::errors::{PanelError, Result};
use crate::images;
use crate::render::{self, LiveUpdate, RenderOptions};
use crate::runtime::PanelReader;

pub const SNAPSHOT_PATH: &str = "/api/panel";
pub const CONTACT_PATH: &str = "/api/contact";
pub const EMAIL_CONFIG_PATH: &str = "/api/test-email-config";
pub const IMAGES_PREFIX: &str = "/images";

/// Requests handled at once; a slow contact delivery only ties up one worker
pub const SERVER_WORKERS: usize = 4;

/// Everything a request handler needs
pub struct ServerContext {
    pub panel: PanelReader,
    pub image_dir: Option<PathBuf>,
    pub title: String,
    pub foreground: String,
    pub render: RenderOptions,
    pub poll_interval_ms: u64,
    pub contact: ContactConfig,
    pub sink: Arc<dyn NotificationSink>,
}

/// A response ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub cors: bool,
}

impl Reply {
    fn new(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
            cors: false,
        }
    }

    fn json(status: u16, value: &impl serde::Serialize) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status, "application/json", body),
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                Self::text(500, "Internal Server Error")
            }
        }
    }

    fn text(status: u16, body: &str) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body.as_bytes().to_vec())
    }

    fn with_cors(mut self) -> Self {
        self.cors = true;
        self
    }
}

/// Route one request
pub fn route(ctx: &ServerContext, method: &Method, url: &str, body: &str) -> Reply {
    let path = url.split('?').next().unwrap_or("/");
    debug!("{} {}", method, path);

    match (method, path) {
        (Method::Get, "/") | (Method::Get, "/index.html") => {
            let snapshot = ctx.panel.snapshot();
            let live = LiveUpdate {
                snapshot_url: SNAPSHOT_PATH.to_string(),
                poll_interval_ms: ctx.poll_interval_ms,
            };
            let page = render::generate_page(&snapshot, &ctx.title, &ctx.foreground, &ctx.render, Some(&live));
            Reply::new(200, "text/html; charset=utf-8", page.into_bytes())
        }
        (Method::Get, SNAPSHOT_PATH) => Reply::json(200, &ctx.panel.snapshot()),
        (Method::Get, EMAIL_CONFIG_PATH) => Reply::json(200, &contact::config_report(&ctx.contact)),
        (Method::Options, CONTACT_PATH) => Reply::new(200, "application/json", Vec::new()).with_cors(),
        (Method::Post, CONTACT_PATH) => {
            let (status, response) =
                contact::handle_submission(body, ctx.sink.as_ref(), ctx.contact.expose_errors);
            Reply::json(status, &response).with_cors()
        }
        (_, CONTACT_PATH) => Reply::json(
            405,
            &contact::ContactResponse {
                success: false,
                message: "Method not allowed".to_string(),
                error: None,
            },
        )
        .with_cors(),
        (Method::Get, p) if p.starts_with(IMAGES_PREFIX) && p[IMAGES_PREFIX.len()..].starts_with('/') => {
            serve_image(ctx, &p[IMAGES_PREFIX.len()..])
        }
        _ => Reply::text(404, "404 Not Found"),
    }
}

fn serve_image(ctx: &ServerContext, rest: &str) -> Reply {
    let Some(dir) = &ctx.image_dir else {
        return Reply::text(404, "404 Not Found");
    };
    // Decode before the containment check
    let Some(decoded) = images::decode_url_path(rest.trim_start_matches('/')) else {
        return Reply::text(404, "404 Not Found");
    };
    let Some(file_path) = resolve_within(dir, &decoded) else {
        return Reply::text(404, "404 Not Found");
    };

    if !file_path.is_file() {
        return Reply::text(404, "404 Not Found");
    }

    match fs::read(&file_path) {
        Ok(content) => Reply::new(200, content_type_for(&file_path), content),
        Err(e) => {
            error!("Failed to read file {:?}: {}", file_path, e);
            Reply::text(500, &format!("Failed to read file: {}", e))
        }
    }
}

/// Join a request path onto a directory, refusing anything that escapes it
fn resolve_within(dir: &Path, relative: &str) -> Option<PathBuf> {
    if relative.is_empty() {
        return None;
    }
    let relative = Path::new(relative);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Some(dir.join(relative))
    } else {
        None
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "html" => "text/html",
        _ => "application/octet-stream",
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

/// Read the request body (for POST) and route the request. A body that
/// cannot be read as UTF-8 is rejected like malformed JSON.
pub fn respond_to(ctx: &ServerContext, method: &Method, url: &str, reader: &mut dyn Read) -> Reply {
    let mut body = String::new();
    if *method == Method::Post {
        if let Err(e) = reader.read_to_string(&mut body) {
            error!("Failed to read request body: {}", e);
            return Reply::json(
                400,
                &contact::ContactResponse {
                    success: false,
                    message: contact::INVALID_BODY_MESSAGE.to_string(),
                    error: None,
                },
            )
            .with_cors();
        }
    }
    route(ctx, method, url, &body)
}

fn handle_request(ctx: &ServerContext, mut request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();

    let reply = respond_to(ctx, &method, &url, request.as_reader());

    let mut response = Response::from_data(reply.body).with_status_code(StatusCode(reply.status));
    if let Some(h) = header("Content-Type", reply.content_type) {
        response = response.with_header(h);
    }
    if reply.cors {
        for (name, value) in [
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Headers", "Content-Type"),
            ("Access-Control-Allow-Methods", "POST, OPTIONS"),
        ] {
            if let Some(h) = header(name, value) {
                response = response.with_header(h);
            }
        }
    }

    if let Err(e) = request.respond(response) {
        error!("Failed to send response: {}", e);
    }
}

/// A running server: its bound port and the thread that waits on its workers
pub struct RunningServer {
    port: u16,
    thread: JoinHandle<()>,
}

impl RunningServer {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Block until every worker has stopped
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| PanelError::ServerError("Server thread panicked".to_string()))
    }
}

/// Start the HTTP server on a pool of worker threads. Port 0 picks a free port.
pub fn start_server(ctx: ServerContext, port: u16) -> Result<RunningServer> {
    let server = Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| PanelError::ServerError(format!("Failed to start HTTP server: {}", e)))?;
    let port = server
        .server_addr()
        .to_ip()
        .map(|addr| addr.port())
        .unwrap_or(port);

    info!("HTTP server listening on http://localhost:{}", port);

    let server = Arc::new(server);
    let ctx = Arc::new(ctx);
    let workers: Vec<JoinHandle<()>> = (0..SERVER_WORKERS)
        .map(|_| {
            let server = server.clone();
            let ctx = ctx.clone();
            thread::spawn(move || loop {
                match server.recv() {
                    Ok(request) => handle_request(&ctx, request),
                    Err(e) => {
                        error!("Failed to receive request: {}", e);
                        break;
                    }
                }
            })
        })
        .collect();

    let thread = thread::spawn(move || {
        for worker in workers {
            if worker.join().is_err() {
                error!("Server worker panicked");
            }
        }
    });

    Ok(RunningServer { port, thread })
}
