use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::JoinHandle;

use tracing::{debug, error};

use crate::error::SessionError;

/// Request sent to the I/O worker.
pub enum IoRequest {
    /// Write `content` to `path`, creating parent dirs.
    WriteFile { path: PathBuf, content: Vec<u8> },
}

/// Outcome reported back for each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoResponse {
    Written { path: PathBuf, bytes: usize },
    /// The write failed; the session that produced the content is untouched.
    WriteFailed { path: PathBuf, message: String },
}

/// A dedicated thread that performs file writes off the compute path.
pub struct IoWorker {
    tx: mpsc::Sender<IoRequest>,
    rx: mpsc::Receiver<IoResponse>,
    handle: JoinHandle<()>,
}

impl IoWorker {
    /// Spawn the worker. It runs until [`finish`](Self::finish) drops the
    /// request sender.
    pub fn spawn() -> crate::Result<Self> {
        let (req_tx, req_rx) = mpsc::channel::<IoRequest>();
        let (resp_tx, resp_rx) = mpsc::channel::<IoResponse>();

        let handle = std::thread::Builder::new()
            .name("io-worker".into())
            .spawn(move || {
                debug!("IO worker thread started");
                while let Ok(request) = req_rx.recv() {
                    let response = match request {
                        IoRequest::WriteFile { path, content } => write_file(path, &content),
                    };
                    let _ = resp_tx.send(response);
                }
                debug!("IO worker thread exiting");
            })
            .map_err(SessionError::Spawn)?;

        Ok(Self {
            tx: req_tx,
            rx: resp_rx,
            handle,
        })
    }

    pub fn write(&self, path: PathBuf, content: Vec<u8>) {
        if let Err(mpsc::SendError(IoRequest::WriteFile { path, .. })) =
            self.tx.send(IoRequest::WriteFile { path, content })
        {
            error!("IO worker is gone; dropped write to {}", path.display());
        }
    }

    /// Responses that have arrived so far.
    pub fn drain(&self) -> Vec<IoResponse> {
        self.rx.try_iter().collect()
    }

    /// Wait for every queued request and return the remaining responses.
    pub fn finish(self) -> Vec<IoResponse> {
        let Self { tx, rx, handle } = self;
        drop(tx);
        if handle.join().is_err() {
            error!("IO worker thread panicked");
        }
        rx.try_iter().collect()
    }
}

fn write_file(path: PathBuf, content: &[u8]) -> IoResponse {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(&path, content) {
        Ok(()) => {
            debug!("IO worker: wrote {} bytes to {}", content.len(), path.display());
            IoResponse::Written {
                path,
                bytes: content.len(),
            }
        }
        Err(e) => {
            error!("IO worker: failed to write {}: {e}", path.display());
            IoResponse::WriteFailed {
                path,
                message: e.to_string(),
            }
        }
    }
}
