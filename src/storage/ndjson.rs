//! NDJSON (Newline Delimited JSON) file operations

use crate::etl::{Cleanable, Extractor, Handle, IntoExtractor, Writer};

use eyre::{Context, Result, bail, eyre};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs::File;
use std::cell::Cell;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Stream JSON documents from an NDJSON file, one per line
///
/// Blank lines are skipped. The file is opened in setup and closed in
/// cleanup; records still held after cleanup yield
/// [`LifecycleError::Closed`](crate::etl::LifecycleError::Closed).
pub struct NdjsonExtractor<T = Value> {
    path: PathBuf,
    reader: Handle<BufReader<File>>,
    line_number: Rc<Cell<usize>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> NdjsonExtractor<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reader: Handle::new(),
            line_number: Rc::new(Cell::new(0)),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> Cleanable for NdjsonExtractor<T> {
    fn setup(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to read NDJSON file: {}", self.path.display()))?;
        self.reader.open(BufReader::new(file));
        self.line_number.set(0);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        self.reader.close();
        Ok(())
    }
}

impl<T: DeserializeOwned> Extractor for NdjsonExtractor<T> {
    type Item = T;
    type Records = NdjsonRecords<T>;

    /// Lines continue from wherever the previous read in this scope stopped
    fn read(&mut self) -> Result<Self::Records> {
        if !self.reader.is_open() {
            bail!("NDJSON file is not open: {}", self.path.display());
        }

        Ok(NdjsonRecords {
            reader: Some(self.reader.clone()),
            line: String::new(),
            line_number: Rc::clone(&self.line_number),
            path: self.path.clone(),
            _record: PhantomData,
        })
    }
}

pub struct NdjsonRecords<T> {
    reader: Option<Handle<BufReader<File>>>,
    line: String,
    line_number: Rc<Cell<usize>>,
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Iterator for NdjsonRecords<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_ref()?;

            self.line.clear();
            let read = match reader.with(|reader| reader.read_line(&mut self.line)) {
                Ok(read) => read,
                Err(closed) => {
                    self.reader = None;
                    return Some(Err(closed));
                }
            };

            match read {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    return Some(Err(err).with_context(|| {
                        format!("Failed to read NDJSON file: {}", self.path.display())
                    }));
                }
            }

            let line_number = self.line_number.get() + 1;
            self.line_number.set(line_number);

            if self.line.trim().is_empty() {
                continue;
            }

            return Some(serde_json::from_str(&self.line).with_context(|| {
                format!(
                    "Failed to parse JSON line {} of {}",
                    line_number,
                    self.path.display()
                )
            }));
        }
    }
}

/// Write records to an NDJSON file, one JSON document per line
///
/// The file is created (or truncated) in setup and flushed in cleanup.
pub struct NdjsonWriter<T = Value> {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    _record: PhantomData<fn(T)>,
}

impl<T> NdjsonWriter<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> Cleanable for NdjsonWriter<T> {
    fn setup(&mut self) -> Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to write NDJSON file: {}", self.path.display()))?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("Failed to flush NDJSON file: {}", self.path.display()))?;
        }
        Ok(())
    }
}

impl<T: Serialize> Writer for NdjsonWriter<T> {
    type Item = T;

    fn write(&mut self, item: T) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| eyre!("NDJSON file is not open: {}", self.path.display()))?;

        serde_json::to_writer(&mut *writer, &item)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<T: Serialize + DeserializeOwned> IntoExtractor for NdjsonWriter<T> {
    type Extractor = NdjsonExtractor<T>;

    fn into_extractor(self) -> Self::Extractor {
        NdjsonExtractor::new(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::{Identity, Lifecycle, LifecycleError, Pipe, Resource, VecWriter, extractor};
    use serde_json::json;
    use tempfile::{NamedTempFile, TempDir};

    fn read_all(path: &Path) -> Result<Vec<Value>> {
        let mut source = Resource::new(NdjsonExtractor::<Value>::new(path));
        let mut scope = source.enter()?;
        let records = scope.records()?.collect::<Result<Vec<_>>>()?;
        scope.exit()?;
        Ok(records)
    }

    #[test]
    fn test_read_write() {
        let temp = NamedTempFile::new().unwrap();
        let data = vec![json!({"a": 1}), json!({"b": 2})];

        let mut pipe = Pipe::new(
            extractor(data.clone()),
            Identity::new(),
            NdjsonWriter::new(temp.path()),
        );
        pipe.run().unwrap();

        let content = std::fs::read_to_string(temp.path()).unwrap();
        assert_eq!(content, "{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(read_all(temp.path()).unwrap(), data);
    }

    #[test]
    fn test_skips_blank_lines() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "{{\"a\": 1}}\n\n   \n{{\"a\": 2}}").unwrap();

        let records = read_all(temp.path()).unwrap();
        assert_eq!(records, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn test_bad_line_reports_position() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "{{\"a\": 1}}\n\nnot json").unwrap();

        let err = read_all(temp.path()).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse JSON line 3 of"));
    }

    #[test]
    fn test_records_stop_when_scope_ends() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "{{\"a\": 1}}\n{{\"a\": 2}}").unwrap();
        let mut source = Resource::new(NdjsonExtractor::<Value>::new(temp.path()));

        let mut records = {
            let mut scope = source.enter().unwrap();
            let records = scope.records().unwrap();
            scope.exit().unwrap();
            records
        };

        let err = records.next().unwrap().unwrap_err();
        assert_eq!(
            err.downcast_ref::<LifecycleError>(),
            Some(&LifecycleError::Closed)
        );
        assert!(records.next().is_none());
        assert_eq!(source.lifecycle(), Lifecycle::Exited);
    }

    #[test]
    fn test_writer_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stage.ndjson");

        let mut pipe = Pipe::new(extractor(1..=3), Identity::new(), NdjsonWriter::<i32>::new(&path));
        pipe.run().unwrap();

        let mut second = Pipe::new(
            pipe.into_writer().into_extractor(),
            Identity::new(),
            VecWriter::new(),
        );
        second.run().unwrap();
        assert_eq!(second.writer().records(), &[1, 2, 3]);
    }

    #[test]
    fn test_write_outside_scope_fails() {
        let dir = TempDir::new().unwrap();
        let mut sink = NdjsonWriter::<Value>::new(dir.path().join("never.ndjson"));

        assert!(sink.write(json!({"a": 1})).is_err());
    }
}
