//! Background signing worker.
//!
//! A single OS thread that computes HMAC-SHA1 signatures off the async
//! runtime. The engine owns exactly one of these, spawns it on first use,
//! and tears it down explicitly or when it stops answering.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

struct Job {
    secret: String,
    message: String,
    reply: oneshot::Sender<String>,
}

/// Handle to the running worker thread.
pub(crate) struct HmacWorker {
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl HmacWorker {
    /// Spawn the worker thread.
    pub(crate) fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let thread = thread::Builder::new()
            .name("inferlink-hmac".to_string())
            .spawn(move || {
                tracing::debug!("HMAC worker started");
                while let Ok(job) = rx.recv() {
                    let signature = super::platform_signature(&job.secret, &job.message);
                    // Caller may have timed out and dropped the receiver
                    let _ = job.reply.send(signature);
                }
                tracing::debug!("HMAC worker stopped");
            })?;

        Ok(Self {
            jobs: Some(tx),
            thread: Some(thread),
        })
    }

    /// Queue a signing job. Fails if the thread has exited.
    pub(crate) fn submit(&self, secret: &str, message: &str) -> Option<oneshot::Receiver<String>> {
        let (reply, rx) = oneshot::channel();
        let job = Job {
            secret: secret.to_string(),
            message: message.to_string(),
            reply,
        };
        self.jobs.as_ref()?.send(job).ok()?;
        Some(rx)
    }

    /// Close the job queue and wait for the thread to finish.
    pub(crate) fn join(mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("HMAC worker panicked during shutdown");
            }
        }
    }
}

impl Drop for HmacWorker {
    fn drop(&mut self) {
        // Closing the queue ends the loop; a stuck thread is detached, not joined.
        self.jobs.take();
    }
}
