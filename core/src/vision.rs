//! The multi-vector vision embedding adapter and the PDF page extraction
//! capability it depends on.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::error::{CoreError, Result};
use crate::protocol::{EmbeddingsPayload, ExtractPagesPayload, Method, ReadyNotice, Request, Response};

/// A multi-vector (one vector per token/patch) embedding, L2-normalized
/// per-vector.
pub type MultiVector = Vec<Vec<f32>>;

/// Uniform surface over a vision embedding provider that produces a
/// variable-length list of token vectors per input, plus the ability to
/// rasterize a PDF into page images.
///
/// Calling a text-adapter-shaped method on this trait is a compile error,
/// not a runtime failure — the capability mismatch the teacher's dynamic
/// dispatch allowed is closed by construction here.
pub trait VisionEmbedder: Send + Sync {
    /// Prepares the adapter for use. Default is a no-op.
    fn init(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Multi-vector embeds a query string.
    fn embed_query(&self, text: &str) -> impl Future<Output = Result<MultiVector>> + Send;

    /// Multi-vector embeds a batch of page images, one [`MultiVector`] per
    /// input path, in input order.
    fn embed_images(
        &self,
        paths: &[PathBuf],
    ) -> impl Future<Output = Result<Vec<MultiVector>>> + Send;

    /// The dimension every individual token vector must have.
    fn embedding_dim(&self) -> usize;

    /// Stable identifier for the underlying model.
    fn model_id(&self) -> &str;

    /// Releases any held resources (e.g. kills the worker process).
    fn dispose(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Rasterizes a PDF file into page images, contracted purely through this
/// interface: the actual rasterization is an external collaborator (§1).
pub trait PageExtractor: Send + Sync {
    /// Renders every page of `pdf_path` into `out_dir`, returning
    /// deterministically-named image paths ordered by 0-based page index.
    fn extract_pages(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
    ) -> impl Future<Output = Result<Vec<PathBuf>>> + Send;
}

/// A vision adapter backed by a scoped child process speaking the
/// newline-delimited JSON-RPC protocol of §6 on its standard streams.
///
/// The process is spawned lazily on first use and killed on [`Drop`] or
/// [`VisionEmbedder::dispose`] — no orphan subprocess may survive a clean
/// shutdown (§5).
pub struct SubprocessVisionWorker {
    command: PathBuf,
    args: Vec<String>,
    dim: usize,
    model: OnceLock<String>,
    next_id: AtomicU64,
    child: Mutex<Option<WorkerHandle>>,
}

struct WorkerHandle {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl std::fmt::Debug for SubprocessVisionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessVisionWorker")
            .field("command", &self.command)
            .field("dim", &self.dim)
            .finish_non_exhaustive()
    }
}

impl SubprocessVisionWorker {
    /// Builds a worker that will launch `command args...` on first use.
    /// `dim` is the declared per-token-vector dimension.
    #[must_use]
    pub fn new(command: impl Into<PathBuf>, args: Vec<String>, dim: usize) -> Self {
        Self {
            command: command.into(),
            args,
            dim,
            model: OnceLock::new(),
            next_id: AtomicU64::new(1),
            child: Mutex::new(None),
        }
    }

    /// Selects the worker variant named by `VISION_BACKEND`, falling back
    /// to `command` unchanged when the variable is unset.
    #[must_use]
    pub fn from_env(command: impl Into<PathBuf>, dim: usize) -> Self {
        let mut args = Vec::new();
        if let Ok(backend) = std::env::var("VISION_BACKEND") {
            args.push(backend);
        }
        Self::new(command, args, dim)
    }

    async fn ensure_started(&self) -> Result<()> {
        let mut guard = self.child.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CoreError::io(self.command.clone(), e))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            CoreError::Io {
                path: self.command.clone(),
                source: std::io::Error::other("worker stdin unavailable"),
            }
        })?;
        let raw_stdout = child.stdout.take().ok_or_else(|| CoreError::Io {
            path: self.command.clone(),
            source: std::io::Error::other("worker stdout unavailable"),
        })?;
        let mut stdout = BufReader::new(raw_stdout);

        let mut first_line = String::new();
        stdout
            .read_line(&mut first_line)
            .await
            .map_err(|e| CoreError::io(self.command.clone(), e))?;
        let ready: ReadyNotice = serde_json::from_str(first_line.trim())
            .map_err(|e| CoreError::Format(format!("vision worker handshake: {e}")))?;
        if !ready.ready {
            return Err(CoreError::Embedding("vision worker not ready".to_string()));
        }
        tracing::debug!(model = %ready.model, device = %ready.device, "vision worker ready");
        let _ = self.model.set(ready.model);

        *guard = Some(WorkerHandle {
            child,
            stdin,
            stdout,
        });
        Ok(())
    }

    async fn call(&self, method: Method, params: serde_json::Value) -> Result<serde_json::Value> {
        self.ensure_started().await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = Request::new(id, method, params);
        let mut line = serde_json::to_string(&request)
            .map_err(|e| CoreError::Format(e.to_string()))?;
        line.push('\n');

        let mut guard = self.child.lock().await;
        let handle = guard.as_mut().expect("ensure_started populated the handle");

        handle
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| CoreError::io(self.command.clone(), e))?;
        handle
            .stdin
            .flush()
            .await
            .map_err(|e| CoreError::io(self.command.clone(), e))?;

        let mut response_line = String::new();
        handle
            .stdout
            .read_line(&mut response_line)
            .await
            .map_err(|e| CoreError::io(self.command.clone(), e))?;
        if response_line.is_empty() {
            return Err(CoreError::Io {
                path: self.command.clone(),
                source: std::io::Error::other("vision worker closed its output"),
            });
        }

        let response: Response = serde_json::from_str(response_line.trim())
            .map_err(|e| CoreError::Format(format!("vision worker response: {e}")))?;

        if let Some(error) = response.error {
            return Err(CoreError::Embedding(error));
        }
        response
            .result
            .ok_or_else(|| CoreError::Embedding("vision worker returned no result".to_string()))
    }

    async fn kill(&self) {
        let mut guard = self.child.lock().await;
        if let Some(mut handle) = guard.take() {
            let _ = handle.child.start_kill();
        }
    }
}

impl VisionEmbedder for SubprocessVisionWorker {
    async fn init(&self) -> Result<()> {
        self.ensure_started().await
    }

    async fn embed_query(&self, text: &str) -> Result<MultiVector> {
        let result = self
            .call(Method::EmbedQuery, serde_json::json!({ "text": text }))
            .await?;
        let payload: EmbeddingsPayload =
            serde_json::from_value(result).map_err(|e| CoreError::Format(e.to_string()))?;
        validate_multi_vectors(&payload, self.dim)?;
        Ok(payload.embeddings.into_iter().next().unwrap_or_default())
    }

    async fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<MultiVector>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let path_strs: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let result = self
            .call(Method::EmbedImages, serde_json::json!({ "paths": path_strs }))
            .await?;
        let payload: EmbeddingsPayload =
            serde_json::from_value(result).map_err(|e| CoreError::Format(e.to_string()))?;
        validate_multi_vectors(&payload, self.dim)?;
        Ok(payload.embeddings)
    }

    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        self.model.get().map_or("", String::as_str)
    }

    async fn dispose(&self) {
        let _ = self.call(Method::Shutdown, serde_json::json!({})).await;
        self.kill().await;
    }
}

impl PageExtractor for SubprocessVisionWorker {
    async fn extract_pages(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let result = self
            .call(
                Method::ExtractPages,
                serde_json::json!({
                    "pdf_path": pdf_path.to_string_lossy(),
                    "output_dir": out_dir.to_string_lossy(),
                }),
            )
            .await?;
        let payload: ExtractPagesPayload =
            serde_json::from_value(result).map_err(|e| CoreError::Format(e.to_string()))?;
        Ok(payload.paths.into_iter().map(PathBuf::from).collect())
    }
}

fn validate_multi_vectors(payload: &EmbeddingsPayload, dim: usize) -> Result<()> {
    for (vectors, count) in payload.embeddings.iter().zip(&payload.num_vectors) {
        if vectors.len() != *count {
            return Err(CoreError::Format(
                "num_vectors did not match embeddings length".to_string(),
            ));
        }
        for vector in vectors {
            if vector.len() != dim {
                return Err(CoreError::Embedding(format!(
                    "token vector dimension mismatch: expected {dim}, got {}",
                    vector.len()
                )));
            }
            if vector.iter().any(|v| v.is_nan()) {
                return Err(CoreError::Embedding("token vector contains NaN".to_string()));
            }
        }
    }
    Ok(())
}

impl Drop for SubprocessVisionWorker {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(mut handle) = guard.take() {
                let _ = handle.child.start_kill();
            }
        }
    }
}
