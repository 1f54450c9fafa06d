//! Write transactions on a single entry.

use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{dirty_path, lock, State};

/// An open edit of one entry.
///
/// Values are written to temporary files that only become visible when
/// [`Editor::commit`] succeeds. Exactly one of `commit` or `abort` takes
/// effect; dropping an editor without calling either aborts it.
pub struct Editor {
    state: Arc<Mutex<State>>,
    directory: PathBuf,
    key: String,
    id: u64,
    written: Vec<bool>,
    done: bool,
}

impl Editor {
    pub(crate) fn new(
        state: Arc<Mutex<State>>,
        directory: PathBuf,
        key: String,
        id: u64,
        value_count: usize,
    ) -> Self {
        Self {
            state,
            directory,
            key,
            id,
            written: vec![false; value_count],
            done: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write `value` as the complete contents of slot `index`.
    pub fn set_value(&mut self, index: usize, value: &str) -> io::Result<()> {
        let path = self.slot_path(index)?;
        fs::write(path, value)?;
        self.written[index] = true;
        Ok(())
    }

    /// Open slot `index` for streaming writes, truncating anything written
    /// to it earlier in this edit.
    pub fn new_output_stream(&mut self, index: usize) -> io::Result<File> {
        let path = self.slot_path(index)?;
        let file = File::create(path)?;
        self.written[index] = true;
        Ok(file)
    }

    /// Publish the written values.
    ///
    /// A new entry must have written every slot; otherwise the edit is
    /// aborted and an [`io::ErrorKind::InvalidInput`] error returned.
    pub fn commit(mut self) -> io::Result<()> {
        self.complete(true)
    }

    /// Discard the written values.
    pub fn abort(mut self) -> io::Result<()> {
        self.complete(false)
    }

    fn slot_path(&self, index: usize) -> io::Result<PathBuf> {
        if index >= self.written.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "value index {} out of range (value count {})",
                    index,
                    self.written.len()
                ),
            ));
        }
        Ok(dirty_path(&self.directory, &self.key, index))
    }

    fn complete(&mut self, success: bool) -> io::Result<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        lock(&self.state).complete_edit(&self.key, self.id, &self.written, success)
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        if !self.done {
            if let Err(e) = self.complete(false) {
                tracing::debug!("Failed to abort abandoned edit of {}: {}", self.key, e);
            }
        }
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("written", &self.written)
            .field("done", &self.done)
            .finish()
    }
}
