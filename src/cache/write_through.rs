//! Streaming cache population.
//!
//! [`WriteThroughStream`] sits between the network body and the caller.
//! Every byte the caller reads is copied into an open store edit, and the
//! edit is committed once the body has been read to the end and the stream
//! is closed. Anything else (a failed copy, an early close, an abort from the
//! owning request) discards the edit, so a partial body never becomes a
//! cache entry. Cache faults never affect the bytes the caller sees.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::store::Editor;

/// The open edit and its body sink.
struct PendingWrite {
    sink: Box<dyn Write + Send>,
    editor: Editor,
}

impl PendingWrite {
    fn commit(self) -> io::Result<()> {
        let PendingWrite { mut sink, editor } = self;
        if let Err(e) = sink.flush() {
            drop(sink);
            editor.abort()?;
            return Err(e);
        }
        drop(sink);
        editor.commit()
    }

    fn abort(self) -> io::Result<()> {
        let PendingWrite { sink, editor } = self;
        drop(sink);
        editor.abort()
    }
}

/// Slot holding the pending write until exactly one finaliser takes it.
struct PendingSlot {
    pending: Mutex<Option<PendingWrite>>,
}

impl PendingSlot {
    fn guard(&self) -> MutexGuard<'_, Option<PendingWrite>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self) -> Option<PendingWrite> {
        self.guard().take()
    }

    fn is_pending(&self) -> bool {
        self.guard().is_some()
    }

    fn mirror(&self, bytes: &[u8]) {
        let mut guard = self.guard();
        let Some(pending) = guard.as_mut() else {
            return;
        };
        if let Err(e) = pending.sink.write_all(bytes) {
            let failed = guard.take();
            drop(guard);
            tracing::debug!("Cache write failed, abandoning entry: {}", e);
            if let Some(failed) = failed {
                abort_quietly(failed);
            }
        }
    }

    fn commit(&self) {
        if let Some(pending) = self.take() {
            let key = pending.editor.key().to_string();
            match pending.commit() {
                Ok(()) => tracing::trace!("Committed cache entry {}", key),
                Err(e) => tracing::warn!("Failed to commit cache entry {}: {}", key, e),
            }
        }
    }

    fn abort(&self) {
        if let Some(pending) = self.take() {
            abort_quietly(pending);
        }
    }
}

fn abort_quietly(pending: PendingWrite) {
    let key = pending.editor.key().to_string();
    if let Err(e) = pending.abort() {
        tracing::debug!("Failed to abort cache entry {}: {}", key, e);
    }
}

/// Handle that aborts a stream's pending write from outside the reader.
///
/// Safe to use from another thread while the stream is being read; if the
/// stream already committed or aborted, this does nothing.
#[derive(Clone)]
pub struct AbortHandle {
    slot: Arc<PendingSlot>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.slot.abort();
    }

    /// Whether the write is still open.
    pub fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }
}

impl std::fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortHandle")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Reader that copies everything it yields into a pending cache entry.
pub struct WriteThroughStream<R> {
    inner: R,
    slot: Arc<PendingSlot>,
    eof: bool,
}

impl<R: Read> WriteThroughStream<R> {
    /// Wrap `inner`, copying read bytes into `sink`, which must be an output
    /// stream opened on `editor`.
    pub fn new(inner: R, sink: Box<dyn Write + Send>, editor: Editor) -> Self {
        Self {
            inner,
            slot: Arc::new(PendingSlot {
                pending: Mutex::new(Some(PendingWrite { sink, editor })),
            }),
            eof: false,
        }
    }
}

impl<R> WriteThroughStream<R> {
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Whether the cache write is still open.
    pub fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }

    /// Finish the cache write.
    ///
    /// Commits only if a read has returned `0`, aborts otherwise. Reading
    /// exactly the expected number of bytes (for example with `read_exact`
    /// against `Content-Length`) does not count as reaching the end: drain
    /// the stream until it reports EOF before closing. Safe to call
    /// repeatedly; only the first call (or a prior abort) has any effect.
    pub fn close(&mut self) {
        if self.eof {
            self.slot.commit();
        } else {
            self.slot.abort();
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl<R: Read> Read for WriteThroughStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        if read == 0 {
            if !buf.is_empty() {
                self.eof = true;
            }
        } else {
            self.slot.mirror(&buf[..read]);
        }
        Ok(read)
    }
}

impl<R> Drop for WriteThroughStream<R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R> std::fmt::Debug for WriteThroughStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteThroughStream")
            .field("eof", &self.eof)
            .field("pending", &self.is_pending())
            .finish()
    }
}
