//! General-purpose emitters.

use super::Emitter;
use crate::core::Record;
use crate::errors::{RecipeValidationError, SluiceError, StageError};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn, Level};

fn io_error(emitter: &str, err: &io::Error) -> StageError {
    StageError::new(format!("{emitter}: {err}")).with_kind("IoError")
}

/// Writes one line per record to a writer, for debugging.
pub struct DebugEmitter {
    out: Box<dyn Write + Send>,
}

impl DebugEmitter {
    /// Creates an emitter writing to the given writer.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }

    /// Creates an emitter writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl Debug for DebugEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugEmitter").finish_non_exhaustive()
    }
}

impl Emitter for DebugEmitter {
    fn name(&self) -> &str {
        "debug"
    }

    fn emit(&mut self, record: &Record) -> Result<(), StageError> {
        writeln!(self.out, "{record}").map_err(|e| io_error("debug", &e))
    }

    fn finalize(&mut self) -> Result<(), StageError> {
        self.out.flush().map_err(|e| io_error("debug", &e))
    }
}

/// Writes a running record count every `every` records and a final count
/// on finalize.
pub struct CountEmitter {
    every: u64,
    of: Option<u64>,
    count: u64,
    out: Box<dyn Write + Send>,
}

impl CountEmitter {
    /// Creates a counter reporting to standard output.
    ///
    /// # Errors
    ///
    /// Returns an error if `every` is zero.
    pub fn new(every: u64) -> Result<Self, RecipeValidationError> {
        if every == 0 {
            return Err(RecipeValidationError::invalid_config(
                "count",
                "report interval must be greater than zero",
            ));
        }
        Ok(Self {
            every,
            of: None,
            count: 0,
            out: Box::new(io::stdout()),
        })
    }

    /// Sets the expected total, reported as "<count> of <total>".
    #[must_use]
    pub const fn of(mut self, total: u64) -> Self {
        self.of = Some(total);
        self
    }

    /// Redirects output to the given writer.
    #[must_use]
    pub fn to_writer(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    /// Returns the number of records seen in the current run.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    fn report(&mut self) -> Result<(), StageError> {
        let line = match self.of {
            Some(total) => format!("{} of {total}", self.count),
            None => self.count.to_string(),
        };
        writeln!(self.out, "{line}").map_err(|e| io_error("count", &e))
    }
}

impl Debug for CountEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountEmitter")
            .field("every", &self.every)
            .field("of", &self.of)
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

impl Emitter for CountEmitter {
    fn name(&self) -> &str {
        "count"
    }

    fn emit(&mut self, _record: &Record) -> Result<(), StageError> {
        self.count += 1;
        if self.count % self.every == 0 {
            self.report()?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), StageError> {
        self.report()?;
        self.out.flush().map_err(|e| io_error("count", &e))
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

/// Logs every record through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEmitter {
    message: String,
    level: Level,
}

impl Default for LoggingEmitter {
    fn default() -> Self {
        Self::new("record", Level::DEBUG)
    }
}

impl LoggingEmitter {
    /// Creates a logging emitter with a message and level.
    #[must_use]
    pub fn new(message: impl Into<String>, level: Level) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }
}

impl Emitter for LoggingEmitter {
    fn name(&self) -> &str {
        "logging"
    }

    fn emit(&mut self, record: &Record) -> Result<(), StageError> {
        let message = &self.message;
        match self.level {
            Level::TRACE => trace!(%record, "{message}"),
            Level::DEBUG => debug!(%record, "{message}"),
            Level::INFO => info!(%record, "{message}"),
            Level::WARN => warn!(%record, "{message}"),
            Level::ERROR => error!(%record, "{message}"),
        }
        Ok(())
    }
}

/// Writes each record as one line of JSON.
pub struct JsonLinesEmitter<W: Write + Send> {
    out: BufWriter<W>,
    written: u64,
}

impl JsonLinesEmitter<File> {
    /// Creates (or truncates) a file and writes records to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SluiceError> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write + Send> JsonLinesEmitter<W> {
    /// Creates an emitter writing to the given writer.
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
            written: 0,
        }
    }

    /// Returns the number of lines written.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn into_inner(self) -> Result<W, SluiceError> {
        self.out
            .into_inner()
            .map_err(|e| SluiceError::Io(e.into_error()))
    }
}

impl<W: Write + Send> Debug for JsonLinesEmitter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesEmitter")
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send> Emitter for JsonLinesEmitter<W> {
    fn name(&self) -> &str {
        "json_lines"
    }

    fn emit(&mut self, record: &Record) -> Result<(), StageError> {
        serde_json::to_writer(&mut self.out, &record.to_json())
            .map_err(|e| StageError::new(format!("json_lines: {e}")).with_kind("SerializationError"))?;
        self.out.write_all(b"\n").map_err(|e| io_error("json_lines", &e))?;
        self.written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), StageError> {
        self.out.flush().map_err(|e| io_error("json_lines", &e))
    }
}

/// Shared view of the records a [`CollectingEmitter`] has received.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    records: Arc<Mutex<Vec<Record>>>,
}

impl Collected {
    /// Returns a copy of the collected records.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Returns the number of collected records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

/// Keeps every record in memory.
#[derive(Debug, Clone)]
pub struct CollectingEmitter {
    name: String,
    collected: Collected,
}

impl Default for CollectingEmitter {
    fn default() -> Self {
        Self::new("collect")
    }
}

impl CollectingEmitter {
    /// Creates a new collecting emitter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collected: Collected::default(),
        }
    }

    /// Returns a handle that stays valid after the emitter is moved into a
    /// recipe.
    #[must_use]
    pub fn handle(&self) -> Collected {
        self.collected.clone()
    }
}

impl Emitter for CollectingEmitter {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&mut self, record: &Record) -> Result<(), StageError> {
        self.collected.records.lock().push(record.clone());
        Ok(())
    }

    fn reset(&mut self) {
        self.collected.records.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A writer whose contents can be read after it has been boxed away.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_debug_emitter_writes_lines() {
        let buf = SharedBuf::default();
        let mut emitter = DebugEmitter::new(buf.clone());
        emitter.emit(&Record::new().with("a", 1)).unwrap();
        emitter.finalize().unwrap();
        assert_eq!(buf.contents(), "{\"a\":1}\n");
    }

    #[test]
    fn test_count_emitter_rejects_zero_interval() {
        let err = CountEmitter::new(0).unwrap_err();
        assert_eq!(err.code(), Some("RECIPE-INVALID-CONFIG"));
    }

    #[test]
    fn test_count_emitter_reports() {
        let buf = SharedBuf::default();
        let mut emitter = CountEmitter::new(2).unwrap().of(5).to_writer(buf.clone());
        for _ in 0..5 {
            emitter.emit(&Record::new()).unwrap();
        }
        emitter.finalize().unwrap();
        assert_eq!(buf.contents(), "2 of 5\n4 of 5\n5 of 5\n");

        emitter.reset();
        assert_eq!(emitter.count(), 0);
    }

    #[test]
    fn test_logging_emitter_never_fails() {
        let mut emitter = LoggingEmitter::new("saw record", Level::INFO);
        assert!(emitter.emit(&Record::new().with("x", 1)).is_ok());
        assert!(LoggingEmitter::default().emit(&Record::new()).is_ok());
    }

    #[test]
    fn test_json_lines_emitter() {
        let mut emitter = JsonLinesEmitter::new(Vec::new());
        emitter.emit(&Record::new().with("a", 1)).unwrap();
        emitter.emit(&Record::new().with("b", "x")).unwrap();
        emitter.finalize().unwrap();
        assert_eq!(emitter.written(), 2);

        let out = String::from_utf8(emitter.into_inner().unwrap()).unwrap();
        assert_eq!(out, "{\"a\":1}\n{\"b\":\"x\"}\n");
    }

    #[test]
    fn test_json_lines_emitter_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut emitter = JsonLinesEmitter::create(&path).unwrap();
        emitter.emit(&Record::new().with("id", 1)).unwrap();
        emitter.finalize().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"id\":1}\n");
    }

    #[test]
    fn test_collecting_emitter_handle() {
        let mut emitter = CollectingEmitter::default();
        let handle = emitter.handle();
        emitter.emit(&Record::new().with("a", 1)).unwrap();
        assert_eq!(handle.records(), vec![Record::new().with("a", 1)]);

        emitter.reset();
        assert!(handle.is_empty());
    }
}
