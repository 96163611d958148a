//! Newline-delimited JSON source.

use super::Source;
use crate::core::Record;
use crate::errors::SourceError;
use std::fmt::Debug;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

type Opener<R> = Box<dyn FnOnce() -> io::Result<R> + Send>;

/// Reads one JSON object per line.
///
/// Blank lines are skipped. A line that is not a JSON object aborts the run
/// with [`SourceError::Parse`] carrying its one-based line number.
pub struct JsonLinesSource<R: BufRead> {
    name: String,
    opener: Option<Opener<R>>,
    reader: Option<R>,
    line: u64,
    buf: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    /// Creates a source over an already-open reader.
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            opener: None,
            reader: Some(reader),
            line: 0,
            buf: String::new(),
        }
    }

    /// Returns the number of lines read so far.
    #[must_use]
    pub const fn lines_read(&self) -> u64 {
        self.line
    }
}

impl JsonLinesSource<BufReader<File>> {
    /// Creates a source that opens `path` when the run starts.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path: PathBuf = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        Self {
            name,
            opener: Some(Box::new(move || File::open(path).map(BufReader::new))),
            reader: None,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Debug for JsonLinesSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSource")
            .field("name", &self.name)
            .field("line", &self.line)
            .field("open", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> Source for JsonLinesSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), SourceError> {
        if let Some(opener) = self.opener.take() {
            let reader = opener().map_err(|e| SourceError::open(&self.name, e.to_string()))?;
            self.reader = Some(reader);
        }
        if self.reader.is_none() {
            return Err(SourceError::AlreadyConsumed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        let Some(reader) = self.reader.as_mut() else {
            return Some(Err(SourceError::read(&self.name, "source is not open")));
        };

        loop {
            self.buf.clear();
            match reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line += 1,
                Err(e) => return Some(Err(SourceError::read(&self.name, e.to_string()))),
            }

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }

            let parsed = serde_json::from_str::<serde_json::Value>(text)
                .map_err(|e| e.to_string())
                .and_then(|json| Record::from_json(json).map_err(|e| e.to_string()));
            return Some(parsed.map_err(|message| SourceError::Parse {
                name: self.name.clone(),
                line: self.line,
                message,
            }));
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}
