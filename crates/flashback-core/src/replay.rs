//! Append-only statement spool read back in reverse.
//!
//! Flashback scripts must undo the newest change first, so every rendered
//! statement is appended here during the scan and only emitted once the stream
//! ends, last-appended first.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};

use tracing::debug;

/// Where spooled statements live until the scan ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpoolKind {
    /// Anonymous temporary file plus an in-memory offset index.
    #[default]
    Disk,
    Memory,
}

enum Spool {
    Memory(Vec<String>),
    Disk {
        writer: BufWriter<File>,
        offsets: Vec<u64>,
        end: u64,
    },
}

pub struct ReplayBuffer {
    spool: Spool,
}

impl ReplayBuffer {
    /// Create an empty buffer. The disk spool creates its scratch file here.
    pub fn new(kind: SpoolKind) -> io::Result<Self> {
        let spool = match kind {
            SpoolKind::Memory => Spool::Memory(Vec::new()),
            SpoolKind::Disk => Spool::Disk {
                writer: BufWriter::new(tempfile::tempfile()?),
                offsets: Vec::new(),
                end: 0,
            },
        };
        Ok(Self { spool })
    }

    pub fn append(&mut self, statement: &str) -> io::Result<()> {
        match &mut self.spool {
            Spool::Memory(lines) => lines.push(statement.to_string()),
            Spool::Disk {
                writer,
                offsets,
                end,
            } => {
                writer.write_all(statement.as_bytes())?;
                writer.write_all(b"\n")?;
                offsets.push(*end);
                *end += statement.len() as u64 + 1;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        match &self.spool {
            Spool::Memory(lines) => lines.len(),
            Spool::Disk { offsets, .. } => offsets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the buffer and iterate its statements newest first.
    pub fn flush_reversed(self) -> io::Result<ReverseStatements> {
        debug!(statements = self.len(), "Reading replay buffer in reverse");
        let inner = match self.spool {
            Spool::Memory(lines) => Reverse::Memory(lines.into_iter().rev()),
            Spool::Disk {
                writer,
                offsets,
                end,
            } => {
                let file = writer.into_inner().map_err(|e| e.into_error())?;
                Reverse::Disk { file, offsets, end }
            }
        };
        Ok(ReverseStatements { inner })
    }
}

enum Reverse {
    Memory(std::iter::Rev<std::vec::IntoIter<String>>),
    Disk {
        file: File,
        offsets: Vec<u64>,
        end: u64,
    },
}

/// Statements of a [`ReplayBuffer`], last-appended first.
pub struct ReverseStatements {
    inner: Reverse,
}

impl Iterator for ReverseStatements {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Reverse::Memory(lines) => lines.next().map(Ok),
            Reverse::Disk { file, offsets, end } => {
                let start = offsets.pop()?;
                // Line length without its trailing newline.
                let len = (*end - start - 1) as usize;
                *end = start;
                Some(read_line_at(file, start, len))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.inner {
            Reverse::Memory(lines) => lines.len(),
            Reverse::Disk { offsets, .. } => offsets.len(),
        };
        (remaining, Some(remaining))
    }
}

fn read_line_at(file: &mut File, start: u64, len: usize) -> io::Result<String> {
    file.seek(SeekFrom::Start(start))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
