//! [`OutputSink`]: the destination for downloaded bytes, either a file or a growable buffer.
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Destination for downloaded bytes.
///
/// Both variants support concurrent `write_at` calls to non-overlapping regions; the internal
/// lock is only ever held across a seek+write or a memcpy, never across an `.await` that could
/// block on another worker.
#[derive(Clone)]
pub enum OutputSink {
    File(FileSink),
    Buffer(BufferSink),
}

impl OutputSink {
    /// Opens `path` for positional writes, creating or truncating it.
    pub async fn create_file(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        Ok(Self::File(FileSink::create(path).await?))
    }

    /// A fresh, empty in-memory buffer sink.
    pub fn buffer() -> Self {
        Self::Buffer(BufferSink::new())
    }

    /// Writes `bytes` at absolute `offset`.
    pub async fn write_at(&self, offset: u64, bytes: Bytes) -> Result<(), std::io::Error> {
        match self {
            Self::File(sink) => sink.write_at(offset, bytes).await,
            Self::Buffer(sink) => sink.write_at(offset, bytes),
        }
    }

    /// Appends `bytes` at the current sequential write position (used for whole-body fallback).
    pub async fn write(&self, bytes: Bytes) -> Result<(), std::io::Error> {
        match self {
            Self::File(sink) => sink.write(bytes).await,
            Self::Buffer(sink) => sink.write(bytes),
        }
    }

    /// The number of bytes written so far.
    pub async fn len(&self) -> Result<u64, std::io::Error> {
        match self {
            Self::File(sink) => sink.len().await,
            Self::Buffer(sink) => Ok(sink.len()),
        }
    }

    /// Consumes a buffer sink into its bytes. Fails if this is a file sink.
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Self::Buffer(sink) => Some(sink.into_bytes()),
            Self::File(_) => None,
        }
    }

    /// The path backing a file sink, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(sink) => Some(&sink.path),
            Self::Buffer(_) => None,
        }
    }
}

/// A file opened for positional writes.
#[derive(Clone)]
pub struct FileSink {
    file: Arc<Mutex<std::fs::File>>,
    path: PathBuf,
    sequential_offset: Arc<std::sync::atomic::AtomicU64>,
}

impl FileSink {
    async fn create(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let path = path.as_ref().to_path_buf();
        let file: File = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        let std_file = file.into_std().await;
        Ok(Self {
            file: Arc::new(Mutex::new(std_file)),
            path,
            sequential_offset: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        })
    }

    async fn write_at(&self, offset: u64, bytes: Bytes) -> Result<(), std::io::Error> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || {
            use std::io::{Seek, SeekFrom, Write};
            let mut guard = file.lock().expect("file sink mutex poisoned");
            guard.seek(SeekFrom::Start(offset))?;
            guard.write_all(&bytes)
        })
        .await
        .expect("blocking write task panicked")
    }

    async fn write(&self, bytes: Bytes) -> Result<(), std::io::Error> {
        let offset = self
            .sequential_offset
            .fetch_add(bytes.len() as u64, std::sync::atomic::Ordering::SeqCst);
        self.write_at(offset, bytes).await
    }

    async fn len(&self) -> Result<u64, std::io::Error> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || {
            let guard = file.lock().expect("file sink mutex poisoned");
            guard.metadata().map(|m| m.len())
        })
        .await
        .expect("blocking metadata task panicked")
    }
}

/// A growable in-memory byte buffer, safe for concurrent positional writes.
#[derive(Clone)]
pub struct BufferSink {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl BufferSink {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn write_at(&self, offset: u64, bytes: Bytes) -> Result<(), std::io::Error> {
        let offset = offset as usize;
        let mut guard = self.inner.lock().expect("buffer sink mutex poisoned");
        let end = offset + bytes.len();
        if guard.len() < end {
            guard.resize(end, 0);
        }
        guard[offset..end].copy_from_slice(&bytes);
        Ok(())
    }

    fn write(&self, bytes: Bytes) -> Result<(), std::io::Error> {
        let mut guard = self.inner.lock().expect("buffer sink mutex poisoned");
        let offset = guard.len();
        self.write_at_locked(&mut guard, offset, &bytes);
        Ok(())
    }

    fn write_at_locked(&self, guard: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        if guard.len() < end {
            guard.resize(end, 0);
        }
        guard[offset..end].copy_from_slice(bytes);
    }

    fn len(&self) -> u64 {
        self.inner.lock().expect("buffer sink mutex poisoned").len() as u64
    }

    fn into_bytes(self) -> Bytes {
        let vec = Arc::try_unwrap(self.inner)
            .map(|m| m.into_inner().expect("buffer sink mutex poisoned"))
            .unwrap_or_else(|arc| arc.lock().expect("buffer sink mutex poisoned").clone());
        Bytes::from(vec)
    }
}
