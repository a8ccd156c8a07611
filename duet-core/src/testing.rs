//! In-process fakes for the generation backends and the asset store, plus a
//! canned HTTP server for driving the real adapters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::runtime::{
    BackendError, ImageBackend, ImageBackendLoader, ImageRequest, TextBackend, TextBackendLoader,
};
use crate::services::upload::{AssetUploader, UploadError};

/// Shared, ordered record of everything the fakes were asked to do.
#[derive(Debug, Default)]
pub struct Probe {
    events: Mutex<Vec<String>>,
    last_image: Mutex<Option<ImageRequest>>,
    uploaded: Mutex<Vec<PathBuf>>,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }

    pub fn last_image(&self) -> Option<ImageRequest> {
        self.last_image.lock().unwrap().clone()
    }

    pub fn uploaded(&self) -> Vec<PathBuf> {
        self.uploaded.lock().unwrap().clone()
    }
}

// ── text ──────────────────────────────────────────────────────────────────────

pub struct FakeTextLoader {
    pub probe: Arc<Probe>,
    pub reply: String,
    pub fail_chat: bool,
    pub fail_load: bool,
    pub fail_release: bool,
}

impl FakeTextLoader {
    pub fn new(probe: &Arc<Probe>, reply: &str) -> Self {
        Self {
            probe: Arc::clone(probe),
            reply: reply.to_owned(),
            fail_chat: false,
            fail_load: false,
            fail_release: false,
        }
    }
}

#[async_trait]
impl TextBackendLoader for FakeTextLoader {
    async fn load(&self) -> Result<Arc<dyn TextBackend>, BackendError> {
        self.probe.push("text.load");
        if self.fail_load {
            return Err(BackendError::Other("out of device memory".into()));
        }
        Ok(Arc::new(FakeText {
            probe: Arc::clone(&self.probe),
            reply: self.reply.clone(),
            fail_chat: self.fail_chat,
            fail_release: self.fail_release,
            released: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug)]
struct FakeText {
    probe: Arc<Probe>,
    reply: String,
    fail_chat: bool,
    fail_release: bool,
    released: AtomicBool,
}

#[async_trait]
impl TextBackend for FakeText {
    async fn chat(&self, prompt: &str) -> Result<String, BackendError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(BackendError::Released { backend: "text" });
        }
        self.probe.push(format!("text.chat:{prompt}"));
        if self.fail_chat {
            return Err(BackendError::Other("CUDA error: device-side assert".into()));
        }
        Ok(self.reply.clone())
    }

    async fn release(&self) -> Result<(), BackendError> {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.probe.push("text.release");
        }
        if self.fail_release {
            return Err(BackendError::Other("device busy".into()));
        }
        Ok(())
    }
}

// ── image ─────────────────────────────────────────────────────────────────────

pub struct FakeImageLoader {
    pub probe: Arc<Probe>,
    pub output_dir: PathBuf,
    pub fail_generate: bool,
    pub fail_release: bool,
}

impl FakeImageLoader {
    pub fn new(probe: &Arc<Probe>, output_dir: &Path) -> Self {
        Self {
            probe: Arc::clone(probe),
            output_dir: output_dir.to_path_buf(),
            fail_generate: false,
            fail_release: false,
        }
    }
}

#[async_trait]
impl ImageBackendLoader for FakeImageLoader {
    async fn load(&self) -> Result<Arc<dyn ImageBackend>, BackendError> {
        self.probe.push("image.load");
        Ok(Arc::new(FakeImage {
            probe: Arc::clone(&self.probe),
            output_dir: self.output_dir.clone(),
            fail_generate: self.fail_generate,
            fail_release: self.fail_release,
            released: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug)]
struct FakeImage {
    probe: Arc<Probe>,
    output_dir: PathBuf,
    fail_generate: bool,
    fail_release: bool,
    released: AtomicBool,
}

#[async_trait]
impl ImageBackend for FakeImage {
    async fn generate(&self, request: &ImageRequest) -> Result<PathBuf, BackendError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(BackendError::Released { backend: "image" });
        }
        self.probe.push(format!("image.generate:{}", request.prompt));
        *self.probe.last_image.lock().unwrap() = Some(request.clone());
        if self.fail_generate {
            return Err(BackendError::Other("sampler diverged".into()));
        }
        let path = self.output_dir.join(format!("{}.png", request.seed));
        tokio::fs::write(&path, b"\x89PNG").await?;
        Ok(path)
    }

    async fn release(&self) -> Result<(), BackendError> {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.probe.push("image.release");
        }
        if self.fail_release {
            return Err(BackendError::Other("device busy".into()));
        }
        Ok(())
    }
}

// ── asset store ───────────────────────────────────────────────────────────────

pub struct FakeUploader {
    pub probe: Arc<Probe>,
    pub url: String,
    pub fail: bool,
}

impl FakeUploader {
    pub fn new(probe: &Arc<Probe>, url: &str) -> Self {
        Self {
            probe: Arc::clone(probe),
            url: url.to_owned(),
            fail: false,
        }
    }
}

#[async_trait]
impl AssetUploader for FakeUploader {
    async fn upload(&self, local_path: &Path, folder: &str) -> Result<String, UploadError> {
        self.probe.push(format!("upload:{folder}"));
        self.probe.uploaded.lock().unwrap().push(local_path.to_path_buf());
        if self.fail {
            return Err(UploadError::Rejected {
                status: 401,
                body: "Invalid Signature".into(),
            });
        }
        if !local_path.exists() {
            return Err(UploadError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "scratch file missing",
            )));
        }
        Ok(self.url.clone())
    }
}

// ── HTTP stub ─────────────────────────────────────────────────────────────────

/// One recorded request: path and raw body.
#[derive(Debug, Clone)]
pub struct StubHit {
    pub path: String,
    pub body: String,
}

type Routes = HashMap<String, (u16, String)>;

/// Minimal HTTP/1.1 server answering `POST` paths with canned JSON.
///
/// Each connection carries one request and is closed after the reply.
/// Unknown paths get a 404.
pub struct StubServer {
    base_url: String,
    routes: Arc<Mutex<Routes>>,
    hits: Arc<Mutex<Vec<StubHit>>>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let routes: Arc<Mutex<Routes>> = Arc::default();
        let hits: Arc<Mutex<Vec<StubHit>>> = Arc::default();

        let task = {
            let routes = Arc::clone(&routes);
            let hits = Arc::clone(&hits);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let routes = Arc::clone(&routes);
                    let hits = Arc::clone(&hits);
                    tokio::spawn(async move {
                        let _ = serve_one(stream, &routes, &hits).await;
                    });
                }
            })
        };

        Self {
            base_url,
            routes,
            hits,
            task,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Answer `path` with `status` and `body` from now on.
    pub fn route(&self, path: &str, status: u16, body: impl Into<String>) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_owned(), (status, body.into()));
    }

    pub fn hits(&self, path: &str) -> Vec<StubHit> {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.path == path)
            .cloned()
            .collect()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_one(
    mut stream: TcpStream,
    routes: &Mutex<Routes>,
    hits: &Mutex<Vec<StubHit>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_owned();
    let header = |name: &str| {
        head.lines().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim().to_owned())
        })
    };
    let chunked = header("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
    let length = header("content-length").and_then(|v| v.parse::<usize>().ok());

    loop {
        let body = &buf[head_end..];
        let complete = if chunked {
            body.ends_with(b"0\r\n\r\n")
        } else {
            body.len() >= length.unwrap_or(0)
        };
        if complete {
            break;
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    hits.lock().unwrap().push(StubHit {
        path: path.clone(),
        body: String::from_utf8_lossy(&buf[head_end..]).into_owned(),
    });
    let (status, body) = routes
        .lock()
        .unwrap()
        .get(&path)
        .cloned()
        .unwrap_or((404, r#"{"error":"not found"}"#.to_owned()));

    let reply = format!(
        "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(reply.as_bytes()).await?;
    stream.shutdown().await
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Acknowledgement body for `/v1/models/load` and `/v1/models/unload`.
pub fn model_status(backend: &str, status: &str) -> String {
    serde_json::json!({ "backend": backend, "status": status }).to_string()
}
