//! Append-only journal of store operations.
//!
//! The journal starts with a fixed header followed by one record per line:
//!
//! ```text
//! etag-cache.journal
//! 1
//! <app version>
//! <value count>
//!
//! DIRTY 3400330d1dfc7f3f7f4b8d4d803dfcf6
//! CLEAN 3400330d1dfc7f3f7f4b8d4d803dfcf6 4 832
//! READ 3400330d1dfc7f3f7f4b8d4d803dfcf6
//! REMOVE 3400330d1dfc7f3f7f4b8d4d803dfcf6
//! ```

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the journal file inside the store directory.
pub const JOURNAL_FILE: &str = "journal";

const JOURNAL_TMP_FILE: &str = "journal.tmp";
const MAGIC: &str = "etag-cache.journal";
const FORMAT_VERSION: &str = "1";

/// Journal header identifying the store layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub app_version: u32,
    pub value_count: usize,
}

impl Header {
    fn lines(&self) -> [String; 5] {
        [
            MAGIC.to_string(),
            FORMAT_VERSION.to_string(),
            self.app_version.to_string(),
            self.value_count.to_string(),
            String::new(),
        ]
    }
}

/// A single journal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// An entry was published with the given value lengths.
    Clean { key: String, lengths: Vec<u64> },
    /// An edit was started.
    Dirty { key: String },
    /// An entry was removed or an edit of a new entry was aborted.
    Remove { key: String },
    /// An entry was read (LRU bookkeeping only).
    Read { key: String },
}

impl Record {
    pub fn key(&self) -> &str {
        match self {
            Record::Clean { key, .. }
            | Record::Dirty { key }
            | Record::Remove { key }
            | Record::Read { key } => key,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Clean { key, lengths } => {
                write!(f, "CLEAN {}", key)?;
                for length in lengths {
                    write!(f, " {}", length)?;
                }
                Ok(())
            }
            Record::Dirty { key } => write!(f, "DIRTY {}", key),
            Record::Remove { key } => write!(f, "REMOVE {}", key),
            Record::Read { key } => write!(f, "READ {}", key),
        }
    }
}

impl FromStr for Record {
    type Err = io::Error;

    fn from_str(line: &str) -> io::Result<Self> {
        let mut parts = line.split(' ');
        let op = parts.next().unwrap_or_default();
        let key = match parts.next() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(corrupt(format!("missing key in journal line: {:?}", line))),
        };
        if !super::KEY_PATTERN.is_match(&key) {
            return Err(corrupt(format!("invalid key in journal line: {:?}", line)));
        }

        let record = match op {
            "CLEAN" => {
                let lengths = parts
                    .map(|p| {
                        p.parse::<u64>()
                            .map_err(|_| corrupt(format!("bad length in journal line: {:?}", line)))
                    })
                    .collect::<io::Result<Vec<_>>>()?;
                return Ok(Record::Clean { key, lengths });
            }
            "DIRTY" => Record::Dirty { key },
            "REMOVE" => Record::Remove { key },
            "READ" => Record::Read { key },
            _ => return Err(corrupt(format!("unknown journal line: {:?}", line))),
        };

        if parts.next().is_some() {
            return Err(corrupt(format!("trailing data in journal line: {:?}", line)));
        }
        Ok(record)
    }
}

/// Records recovered from an existing journal.
#[derive(Debug)]
pub struct Replay {
    pub records: Vec<Record>,
    /// The final line was cut short (crash mid-append); the journal must be
    /// rewritten before appending to it again.
    pub truncated: bool,
}

/// Read and validate a journal file.
///
/// Fails with [`io::ErrorKind::InvalidData`] when the header does not match
/// `expected` or a complete line cannot be parsed.
pub fn replay(path: &Path, expected: &Header) -> io::Result<Replay> {
    let mut reader = BufReader::new(File::open(path)?);

    for want in expected.lines() {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let got = line.strip_suffix('\n').unwrap_or(&line);
        if got != want {
            return Err(corrupt(format!(
                "unexpected journal header: expected {:?}, found {:?}",
                want, got
            )));
        }
    }

    let mut records = Vec::new();
    let mut truncated = false;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        match line.strip_suffix('\n') {
            Some(complete) => records.push(complete.parse()?),
            None => {
                truncated = true;
                break;
            }
        }
    }

    Ok(Replay { records, truncated })
}

/// Writable handle on the journal file.
pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Journal {
    /// Open an existing journal for appending.
    pub fn append_to(directory: &Path) -> io::Result<Self> {
        let path = directory.join(JOURNAL_FILE);
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Atomically replace the journal with `header` and `records`.
    pub fn rewrite<'a>(
        directory: &Path,
        header: &Header,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> io::Result<Self> {
        let tmp_path = directory.join(JOURNAL_TMP_FILE);
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for line in header.lines() {
                writeln!(writer, "{}", line)?;
            }
            for record in records {
                writeln!(writer, "{}", record)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, directory.join(JOURNAL_FILE))?;

        Self::append_to(directory)
    }

    /// Buffer a record. Call [`Journal::flush`] to make it durable.
    pub fn append(&mut self, record: &Record) -> io::Result<()> {
        writeln!(self.writer, "{}", record)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn corrupt(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
