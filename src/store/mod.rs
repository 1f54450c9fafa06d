//! Size-bounded, journaled disk store.
//!
//! Each entry has a fixed number of independently addressed string/byte
//! values stored as `<key>.<index>` files. Edits write `<key>.<index>.tmp`
//! files and rename them into place on commit, so readers only ever observe
//! fully written values. A journal records every operation so the store can
//! be reopened after a restart or crash, and least-recently-used entries are
//! evicted once the total size exceeds the configured bound.

pub mod editor;
pub mod journal;
pub mod snapshot;

pub use editor::Editor;
pub use snapshot::Snapshot;

use regex::Regex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use journal::{Header, Journal, Record, JOURNAL_FILE};

/// Rebuild the journal once this many records are redundant.
const REDUNDANT_RECORD_THRESHOLD: usize = 2000;

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]{1,120}$").expect("valid key pattern"));

static STORE_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(journal(\.tmp)?|[a-z0-9_-]{1,120}\.[0-9]+(\.tmp)?)$")
        .expect("valid store file pattern")
});

/// Journaled LRU store rooted in one directory.
///
/// Cloning is cheap; clones share the same in-memory index.
#[derive(Clone)]
pub struct DiskStore {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Clone)]
struct Entry {
    lengths: Vec<u64>,
    readable: bool,
    editor: Option<u64>,
    last_used: u64,
}

impl Entry {
    fn new(value_count: usize) -> Self {
        Self {
            lengths: vec![0; value_count],
            readable: false,
            editor: None,
            last_used: 0,
        }
    }

    fn total(&self) -> u64 {
        self.lengths.iter().sum()
    }
}

pub(crate) struct State {
    directory: PathBuf,
    header: Header,
    max_size: u64,
    size: u64,
    entries: HashMap<String, Entry>,
    journal: Journal,
    redundant: usize,
    clock: u64,
    next_edit: u64,
}

impl DiskStore {
    /// Open (or create) a store in `directory`.
    ///
    /// An existing journal written with a different `app_version` or
    /// `value_count`, or one that cannot be parsed, causes the store's files
    /// in the directory to be deleted and the store to start empty.
    pub fn open(
        directory: impl Into<PathBuf>,
        app_version: u32,
        value_count: usize,
        max_size: u64,
    ) -> io::Result<Self> {
        if max_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "max_size must be greater than zero",
            ));
        }
        if value_count == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "value_count must be greater than zero",
            ));
        }

        let directory = directory.into();
        fs::create_dir_all(&directory)?;

        let header = Header {
            app_version,
            value_count,
        };

        let mut state = if directory.join(JOURNAL_FILE).exists() {
            match State::recover(&directory, header, max_size) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        "Store journal in {:?} is unusable ({}); starting empty",
                        directory,
                        e
                    );
                    wipe(&directory)?;
                    State::empty(&directory, header, max_size)?
                }
            }
        } else {
            State::empty(&directory, header, max_size)?
        };

        state.trim_to_size()?;
        if state.needs_rebuild() {
            state.rebuild_journal()?;
        }

        tracing::debug!(
            "Opened store {:?} with {} entries ({} bytes)",
            directory,
            state.entries.len(),
            state.size
        );

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Get a snapshot of the published entry for `key`.
    ///
    /// Returns `Ok(None)` when there is no published entry, including when
    /// its files were deleted behind the store's back.
    pub fn get(&self, key: &str) -> io::Result<Option<Snapshot>> {
        validate_key(key)?;
        let mut state = lock(&self.state);

        let lengths = match state.entries.get(key) {
            Some(entry) if entry.readable => entry.lengths.clone(),
            _ => return Ok(None),
        };

        let mut files = Vec::with_capacity(lengths.len());
        for index in 0..lengths.len() {
            match File::open(clean_path(&state.directory, key, index)) {
                Ok(file) => files.push(file),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        state.touch(key);
        state.redundant += 1;
        state.journal.append(&Record::Read {
            key: key.to_string(),
        })?;
        if state.needs_rebuild() {
            state.rebuild_journal()?;
        }

        Ok(Some(Snapshot::new(key.to_string(), files, lengths)))
    }

    /// Start an edit of `key`.
    ///
    /// Returns `Ok(None)` if another edit of the same key is in progress.
    pub fn edit(&self, key: &str) -> io::Result<Option<Editor>> {
        validate_key(key)?;
        let mut state = lock(&self.state);

        if state
            .entries
            .get(key)
            .is_some_and(|entry| entry.editor.is_some())
        {
            return Ok(None);
        }

        state.journal.append(&Record::Dirty {
            key: key.to_string(),
        })?;
        state.journal.flush()?;

        state.next_edit += 1;
        let id = state.next_edit;
        let value_count = state.header.value_count;
        state
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(value_count))
            .editor = Some(id);

        Ok(Some(Editor::new(
            Arc::clone(&self.state),
            state.directory.clone(),
            key.to_string(),
            id,
            value_count,
        )))
    }

    /// Remove the published entry for `key`.
    ///
    /// Returns `Ok(false)` if there is no entry or it is being edited.
    pub fn remove(&self, key: &str) -> io::Result<bool> {
        validate_key(key)?;
        let mut state = lock(&self.state);

        let removable = matches!(state.entries.get(key), Some(entry) if entry.editor.is_none());
        if !removable {
            return Ok(false);
        }
        state.remove_entry(key)?;
        Ok(true)
    }

    /// Remove every entry that is not currently being edited.
    pub fn clear(&self) -> io::Result<usize> {
        let mut state = lock(&self.state);
        let keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.editor.is_none())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            state.remove_entry(key)?;
        }
        Ok(keys.len())
    }

    /// Force buffered journal records to disk.
    pub fn flush(&self) -> io::Result<()> {
        lock(&self.state).journal.flush()
    }

    /// Total bytes of all published values.
    pub fn size(&self) -> u64 {
        lock(&self.state).size
    }

    pub fn max_size(&self) -> u64 {
        lock(&self.state).max_size
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        lock(&self.state)
            .entries
            .values()
            .filter(|entry| entry.readable)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn directory(&self) -> PathBuf {
        lock(&self.state).directory.clone()
    }
}

impl std::fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("DiskStore")
            .field("directory", &state.directory)
            .field("size", &state.size)
            .field("max_size", &state.max_size)
            .field("entries", &state.entries.len())
            .finish()
    }
}

impl State {
    fn empty(directory: &Path, header: Header, max_size: u64) -> io::Result<Self> {
        let journal = Journal::rewrite(directory, &header, std::iter::empty())?;
        Ok(Self {
            directory: directory.to_path_buf(),
            header,
            max_size,
            size: 0,
            entries: HashMap::new(),
            journal,
            redundant: 0,
            clock: 0,
            next_edit: 0,
        })
    }

    fn recover(directory: &Path, header: Header, max_size: u64) -> io::Result<Self> {
        let replay = journal::replay(&directory.join(JOURNAL_FILE), &header)?;

        let mut entries: HashMap<String, Entry> = HashMap::new();
        let mut clock = 0;
        for record in &replay.records {
            clock += 1;
            match record {
                Record::Clean { key, lengths } => {
                    if lengths.len() != header.value_count {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("wrong value count in journal record: {}", record),
                        ));
                    }
                    let entry = entries
                        .entry(key.clone())
                        .or_insert_with(|| Entry::new(header.value_count));
                    entry.lengths = lengths.clone();
                    entry.readable = true;
                    entry.editor = None;
                    entry.last_used = clock;
                }
                Record::Dirty { key } => {
                    entries
                        .entry(key.clone())
                        .or_insert_with(|| Entry::new(header.value_count))
                        .editor = Some(0);
                }
                Record::Remove { key } => {
                    entries.remove(key);
                }
                Record::Read { key } => {
                    if let Some(entry) = entries.get_mut(key) {
                        entry.last_used = clock;
                    }
                }
            }
        }

        // Interrupted edits may have renamed some values into place before
        // the crash, so neither their clean nor dirty files can be trusted.
        let mut size = 0;
        let mut failure = None;
        entries.retain(|key, entry| {
            for index in 0..header.value_count {
                if let Err(e) = remove_if_exists(&dirty_path(directory, key, index)) {
                    failure.get_or_insert(e);
                }
            }
            if entry.editor.is_some() {
                for index in 0..header.value_count {
                    if let Err(e) = remove_if_exists(&clean_path(directory, key, index)) {
                        failure.get_or_insert(e);
                    }
                }
                return false;
            }
            size += entry.total();
            true
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let redundant = replay.records.len().saturating_sub(entries.len());
        let mut state = Self {
            directory: directory.to_path_buf(),
            header,
            max_size,
            size,
            entries,
            journal: Journal::append_to(directory)?,
            redundant,
            clock,
            next_edit: 0,
        };

        if replay.truncated {
            state.rebuild_journal()?;
        }

        Ok(state)
    }

    fn touch(&mut self, key: &str) {
        self.clock += 1;
        let clock = self.clock;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_used = clock;
        }
    }

    fn needs_rebuild(&self) -> bool {
        self.redundant >= REDUNDANT_RECORD_THRESHOLD && self.redundant >= self.entries.len()
    }

    fn rebuild_journal(&mut self) -> io::Result<()> {
        let mut ordered: Vec<(&String, &Entry)> = self.entries.iter().collect();
        ordered.sort_by_key(|(_, entry)| entry.last_used);

        let records: Vec<Record> = ordered
            .into_iter()
            .map(|(key, entry)| {
                if entry.editor.is_some() {
                    Record::Dirty { key: key.clone() }
                } else {
                    Record::Clean {
                        key: key.clone(),
                        lengths: entry.lengths.clone(),
                    }
                }
            })
            .collect();

        self.journal = Journal::rewrite(&self.directory, &self.header, &records)?;
        self.redundant = 0;
        Ok(())
    }

    fn remove_entry(&mut self, key: &str) -> io::Result<()> {
        let Some(entry) = self.entries.remove(key) else {
            return Ok(());
        };

        self.size = self.size.saturating_sub(entry.total());
        self.redundant += 1;
        self.journal.append(&Record::Remove {
            key: key.to_string(),
        })?;
        self.journal.flush()?;

        for index in 0..self.header.value_count {
            remove_if_exists(&clean_path(&self.directory, key, index))?;
        }
        Ok(())
    }

    fn trim_to_size(&mut self) -> io::Result<()> {
        while self.size > self.max_size {
            let victim = self
                .entries
                .iter()
                .filter(|(_, entry)| entry.readable && entry.editor.is_none())
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());

            match victim {
                Some(key) => {
                    tracing::trace!("Evicting {} to stay under {} bytes", key, self.max_size);
                    self.remove_entry(&key)?;
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Finish the edit `id` of `key`, publishing or discarding its values.
    pub(crate) fn complete_edit(
        &mut self,
        key: &str,
        id: u64,
        written: &[bool],
        success: bool,
    ) -> io::Result<()> {
        let value_count = self.header.value_count;

        let (readable, old_lengths) = match self.entries.get(key) {
            Some(entry) if entry.editor == Some(id) => (entry.readable, entry.lengths.clone()),
            // The entry was cleared while this edit was open.
            _ => {
                for index in 0..value_count {
                    remove_if_exists(&dirty_path(&self.directory, key, index))?;
                }
                return Ok(());
            }
        };

        let mut outcome = Ok(());
        let mut success = success;
        if success && !readable {
            if let Some(missing) = written.iter().position(|w| !w) {
                success = false;
                outcome = Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("new entry {} did not write value {}", key, missing),
                ));
            }
        }

        let lengths = if success {
            match self.install(key, written, &old_lengths) {
                Ok(lengths) => Some(lengths),
                Err(e) => {
                    self.discard_failed_install(key)?;
                    return Err(e);
                }
            }
        } else {
            // Release the entry even when a temporary file cannot be deleted.
            for index in 0..value_count {
                if let Err(e) = remove_if_exists(&dirty_path(&self.directory, key, index)) {
                    tracing::debug!("Failed to delete temporary value of {}: {}", key, e);
                    if outcome.is_ok() {
                        outcome = Err(e);
                    }
                }
            }
            None
        };

        self.redundant += 1;
        match lengths {
            Some(lengths) => {
                self.size = self.size - old_lengths.iter().sum::<u64>() + lengths.iter().sum::<u64>();
                if let Some(entry) = self.entries.get_mut(key) {
                    entry.lengths = lengths.clone();
                    entry.readable = true;
                    entry.editor = None;
                }
                self.touch(key);
                self.journal.append(&Record::Clean {
                    key: key.to_string(),
                    lengths,
                })?;
            }
            None if readable => {
                if let Some(entry) = self.entries.get_mut(key) {
                    entry.editor = None;
                }
                self.journal.append(&Record::Clean {
                    key: key.to_string(),
                    lengths: old_lengths,
                })?;
            }
            None => {
                self.entries.remove(key);
                self.journal.append(&Record::Remove {
                    key: key.to_string(),
                })?;
            }
        }
        self.journal.flush()?;

        self.trim_to_size()?;
        if self.needs_rebuild() {
            self.rebuild_journal()?;
        }

        outcome
    }

    /// Rename written values into place and return the new lengths.
    fn install(&self, key: &str, written: &[bool], old_lengths: &[u64]) -> io::Result<Vec<u64>> {
        let mut lengths = old_lengths.to_vec();
        for (index, was_written) in written.iter().enumerate() {
            if !*was_written {
                continue;
            }
            let clean = clean_path(&self.directory, key, index);
            fs::rename(dirty_path(&self.directory, key, index), &clean)?;
            lengths[index] = fs::metadata(&clean)?.len();
        }
        Ok(lengths)
    }

    fn discard_failed_install(&mut self, key: &str) -> io::Result<()> {
        if let Some(entry) = self.entries.remove(key) {
            self.size = self.size.saturating_sub(entry.total());
        }
        self.redundant += 1;
        self.journal.append(&Record::Remove {
            key: key.to_string(),
        })?;
        self.journal.flush()?;
        for index in 0..self.header.value_count {
            remove_if_exists(&dirty_path(&self.directory, key, index))?;
            remove_if_exists(&clean_path(&self.directory, key, index))?;
        }
        Ok(())
    }
}

pub(crate) fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn clean_path(directory: &Path, key: &str, index: usize) -> PathBuf {
    directory.join(format!("{}.{}", key, index))
}

pub(crate) fn dirty_path(directory: &Path, key: &str, index: usize) -> PathBuf {
    directory.join(format!("{}.{}.tmp", key, index))
}

fn validate_key(key: &str) -> io::Result<()> {
    if KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("keys must match [a-z0-9_-]{{1,120}}: {:?}", key),
        ))
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Delete the files this store owns in `directory`, leaving anything else.
fn wipe(directory: &Path) -> io::Result<()> {
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name();
        let owned = name
            .to_str()
            .is_some_and(|name| STORE_FILE_PATTERN.is_match(name));
        if owned && entry.file_type()?.is_file() {
            remove_if_exists(&entry.path())?;
        }
    }
    Ok(())
}
