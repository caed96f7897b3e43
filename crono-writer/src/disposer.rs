//! Background disposal of superseded output handles.
//!
//! Rotation must not wait for the old file to be synced and closed, so the
//! previous [`ActiveFile`] is handed to a worker thread. The worker is started
//! on the first rotation that retires a handle and exits once the writer
//! (and with it the sending half of the channel) is gone and the queue is
//! drained.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::diagnostics::Diagnostics;
use crate::handle::ActiveFile;

const WORKER_NAME: &str = "crono-dispose";

/// One superseded handle and the earliest instant it may be closed.
#[derive(Debug)]
struct Retired {
    file: ActiveFile,
    due: Instant,
}

pub(crate) struct Disposer {
    grace: Duration,
    diagnostics: Arc<dyn Diagnostics>,
    worker: Option<Sender<Retired>>,
}

impl Disposer {
    pub(crate) fn new(grace: Duration, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            grace,
            diagnostics,
            worker: None,
        }
    }

    /// Schedule `file` to be closed once the grace period has passed.
    ///
    /// Never blocks on the close itself. If no worker can be started the
    /// file is closed inline instead of being leaked.
    pub(crate) fn dispose(&mut self, file: ActiveFile) {
        let retired = Retired {
            file,
            due: Instant::now() + self.grace,
        };
        let sent = match self.worker() {
            Some(tx) => tx.send(retired).map_err(|e| e.0),
            None => Err(retired),
        };
        if let Err(retired) = sent {
            self.worker = None;
            close_retired(retired.file, &*self.diagnostics);
        }
    }

    fn worker(&mut self) -> Option<&Sender<Retired>> {
        if self.worker.is_none() {
            let (tx, rx) = mpsc::channel();
            let diagnostics = Arc::clone(&self.diagnostics);
            let spawned = thread::Builder::new()
                .name(WORKER_NAME.to_string())
                .spawn(move || run_worker(rx, &*diagnostics));
            match spawned {
                Ok(_) => self.worker = Some(tx),
                Err(e) => self
                    .diagnostics
                    .error(&format!("cannot start {WORKER_NAME} worker, closing inline: {e}")),
            }
        }
        self.worker.as_ref()
    }
}

fn run_worker(rx: Receiver<Retired>, diagnostics: &dyn Diagnostics) {
    while let Ok(retired) = rx.recv() {
        let wait = retired.due.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        close_retired(retired.file, diagnostics);
    }
}

fn close_retired(file: ActiveFile, diagnostics: &dyn Diagnostics) {
    let path = file.path().to_path_buf();
    match file.close() {
        Ok(()) => diagnostics.debug(&format!("closed superseded file {}", path.display())),
        Err(e) => diagnostics.error(&e.to_string()),
    }
}
