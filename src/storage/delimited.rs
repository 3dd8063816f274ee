//! Delimited text (CSV/TSV) extraction

use crate::etl::{Cleanable, Extractor, Handle};

use csv::StringRecord;
use eyre::{Context, Result, eyre};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Read rows from a delimited text file
///
/// Each row is deserialized into `R` through serde. The default,
/// `Vec<String>`, yields raw rows; with a header row enabled any
/// `#[derive(Deserialize)]` struct or map works too.
///
/// The file is opened in setup and closed in cleanup. Records still held
/// after cleanup yield [`LifecycleError::Closed`](crate::etl::LifecycleError::Closed).
pub struct CsvExtractor<R = Vec<String>> {
    path: PathBuf,
    delimiter: u8,
    has_headers: bool,
    flexible: bool,
    reader: Handle<csv::Reader<File>>,
    _record: PhantomData<fn() -> R>,
}

impl<R> CsvExtractor<R> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: b',',
            has_headers: false,
            flexible: true,
            reader: Handle::new(),
            _record: PhantomData,
        }
    }

    /// Field delimiter, `,` by default
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Treat the first row as a header row (off by default)
    pub fn has_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    /// Accept rows of differing lengths (on by default)
    ///
    /// With this off, a row whose field count differs from the first row's
    /// fails the run.
    pub fn flexible(mut self, flexible: bool) -> Self {
        self.flexible = flexible;
        self
    }
}

impl<R> Cleanable for CsvExtractor<R> {
    fn setup(&mut self) -> Result<()> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_headers)
            .flexible(self.flexible)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open CSV file: {}", self.path.display()))?;

        log::debug!("Opened CSV file {}", self.path.display());
        self.reader.open(reader);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        if self.reader.close().is_some() {
            log::debug!("Closed CSV file {}", self.path.display());
        }
        Ok(())
    }
}

impl<R: DeserializeOwned> Extractor for CsvExtractor<R> {
    type Item = R;
    type Records = CsvRecords<R>;

    /// Rows continue from wherever the previous read in this scope stopped
    fn read(&mut self) -> Result<Self::Records> {
        let headers = self
            .reader
            .with(|reader| match self.has_headers {
                true => reader.headers().map(|headers| Some(headers.clone())),
                false => Ok(None),
            })
            .map_err(|_| eyre!("CSV file is not open: {}", self.path.display()))?
            .with_context(|| format!("Failed to read CSV headers in {}", self.path.display()))?;

        Ok(CsvRecords {
            reader: Some(self.reader.clone()),
            headers,
            row: StringRecord::new(),
            path: self.path.clone(),
            _record: PhantomData,
        })
    }
}

pub struct CsvRecords<R> {
    reader: Option<Handle<csv::Reader<File>>>,
    headers: Option<StringRecord>,
    row: StringRecord,
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: DeserializeOwned> Iterator for CsvRecords<R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_ref()?;

        let more = match reader.with(|reader| reader.read_record(&mut self.row)) {
            Ok(more) => more,
            Err(closed) => {
                self.reader = None;
                return Some(Err(closed));
            }
        };

        match more {
            Ok(false) => None,
            Ok(true) => Some(
                self.row
                    .deserialize(self.headers.as_ref())
                    .with_context(|| format!("Failed to parse CSV row in {}", self.path.display())),
            ),
            Err(err) => Some(
                Err(err)
                    .with_context(|| format!("Failed to parse CSV row in {}", self.path.display())),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::{Lifecycle, LifecycleError, Resource};
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "{}", content).unwrap();
        temp
    }

    fn read_all<R: DeserializeOwned>(source: CsvExtractor<R>) -> Result<Vec<R>> {
        let mut source = Resource::new(source);
        let mut scope = source.enter()?;
        let rows = scope.records()?.collect::<Result<Vec<_>>>()?;
        scope.exit()?;
        Ok(rows)
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Repo {
        host: String,
        description: String,
        stars: u32,
    }

    #[test]
    fn test_raw_rows() {
        let temp = csv_file("Github,Super git repos,1\nGitlab,Also repos,2\n");

        let rows = read_all(CsvExtractor::<Vec<String>>::new(temp.path())).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Github", "Super git repos", "1"]);
    }

    #[test]
    fn test_typed_rows_with_headers() {
        let temp = csv_file("host\tdescription\tstars\nGithub\tSuper git repos\t1\n");
        let source = CsvExtractor::<Repo>::new(temp.path())
            .delimiter(b'\t')
            .has_headers(true);

        let rows = read_all(source).unwrap();

        assert_eq!(
            rows,
            vec![Repo {
                host: "Github".to_string(),
                description: "Super git repos".to_string(),
                stars: 1,
            }]
        );
    }

    #[test]
    fn test_bad_row_reports_file() {
        let temp = csv_file("host,description,stars\nGithub,Super git repos,many\n");
        let source = CsvExtractor::<Repo>::new(temp.path()).has_headers(true);

        let err = read_all(source).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse CSV row in"));
    }

    #[test]
    fn test_missing_file_fails_setup() {
        let mut source = Resource::new(CsvExtractor::<Vec<String>>::new("/nonexistent/repos.csv"));

        let err = source.enter().err().unwrap();
        assert!(err.to_string().contains("Failed to open CSV file"));
    }

    #[test]
    fn test_ragged_rows_are_kept() {
        let temp = csv_file("Github,Super git repos,1\nGitlab,Also\n");

        let rows = read_all(CsvExtractor::<Vec<String>>::new(temp.path())).unwrap();

        assert_eq!(rows[1], vec!["Gitlab", "Also"]);
    }

    #[test]
    fn test_strict_rows_reject_ragged_file() {
        let temp = csv_file("Github,Super git repos,1\nGitlab,Also\n");
        let source = CsvExtractor::<Vec<String>>::new(temp.path()).flexible(false);

        let err = read_all(source).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse CSV row in"));
    }

    #[test]
    fn test_records_stop_when_scope_ends() {
        let temp = csv_file("Github,Super git repos,1\nGitlab,Also repos,2\n");
        let mut source = Resource::new(CsvExtractor::<Vec<String>>::new(temp.path()));

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
    fn test_read_outside_scope_fails() {
        let temp = csv_file("a,b\n");
        let mut source = CsvExtractor::<Vec<String>>::new(temp.path());

        assert!(source.read().is_err());
    }
}
