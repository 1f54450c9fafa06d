//! Read handles on published entries.

use std::fs::File;
use std::io::{self, Read};

/// A consistent view of one entry's values.
///
/// Every value file is opened when the snapshot is taken, so a later commit
/// or removal of the same key does not change what this snapshot reads.
/// Dropping the snapshot releases the open files.
#[derive(Debug)]
pub struct Snapshot {
    key: String,
    files: Vec<Option<File>>,
    lengths: Vec<u64>,
}

impl Snapshot {
    pub(crate) fn new(key: String, files: Vec<File>, lengths: Vec<u64>) -> Self {
        Self {
            key,
            files: files.into_iter().map(Some).collect(),
            lengths,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Length in bytes of the value at `index`, as recorded at commit.
    pub fn length(&self, index: usize) -> u64 {
        self.lengths.get(index).copied().unwrap_or(0)
    }

    /// Take ownership of the open file for `index`.
    ///
    /// Returns `None` if the index is out of range or was already taken.
    pub fn take_reader(&mut self, index: usize) -> Option<File> {
        self.files.get_mut(index).and_then(Option::take)
    }

    /// Read the value at `index` as a UTF-8 string, consuming its file.
    pub fn read_string(&mut self, index: usize) -> io::Result<String> {
        let mut file = self.take_reader(index).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("value {} of {} is not available", index, self.key),
            )
        })?;
        let mut value = String::new();
        file.read_to_string(&mut value)?;
        Ok(value)
    }
}
