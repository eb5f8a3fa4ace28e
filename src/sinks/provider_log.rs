use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::info;

use crate::error::AppResult;

/// Per-provider log sink. Many concurrent repetition/worker tasks log
/// through one sink; a single owning writer task serializes the interleaved
/// lines into the provider's log file while each line is mirrored to the
/// console.
#[derive(Debug)]
pub struct ProviderLog {
    tx: mpsc::UnboundedSender<String>,
}

impl ProviderLog {
    /// Timestamps and records one log line. Dropped silently once the writer
    /// has shut down.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        let line = format!("{} {message}", Local::now().format("%Y/%m/%d %H:%M:%S"));
        let _ = self.tx.send(line);
    }
}

/// The sink plus the writer task that owns the file. Await [`Self::close`]
/// after dropping every other sink clone to flush the file.
pub struct ProviderLogHandle {
    pub sink: Arc<ProviderLog>,
    task: JoinHandle<AppResult<()>>,
}

impl ProviderLogHandle {
    /// Drops this handle's sink reference and waits for the writer to drain
    /// and flush. Other live clones of the sink keep the writer running.
    ///
    /// # Errors
    ///
    /// Returns an error when the writer task failed to create or flush the
    /// log file.
    pub async fn close(self) -> AppResult<()> {
        drop(self.sink);
        self.task.await?
    }
}

/// Creates the log file writer for one provider and returns the shared sink.
#[must_use]
pub fn setup_provider_log(log_path: PathBuf) -> ProviderLogHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let task = tokio::spawn(async move {
        let file = File::create(&log_path).await?;
        let mut writer = BufWriter::new(file);
        while let Some(line) = rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
        Ok(())
    });

    ProviderLogHandle {
        sink: Arc::new(ProviderLog { tx }),
        task,
    }
}
