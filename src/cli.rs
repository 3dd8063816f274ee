//! CLI helper functions
//!
//! Each subcommand of `plumb` is one [`Pipe`] built from the file-backed
//! extractors and writers in [`crate::storage`].

use crate::{
    etl::{Extractor, Identity, Pipe, Transformer, transformer, try_transformer, writer, zip_with_fill},
    storage::{CsvExtractor, NdjsonExtractor, NdjsonWriter},
    transform::FieldDropper,
};
use eyre::{Context, Result, bail};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;

/// File formats understood by the CLI, picked by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Delimited text with the given default delimiter
    Delimited(u8),
    /// One JSON document per line
    Ndjson,
}

impl Format {
    /// Detect the format of `path` from its extension
    ///
    /// # Errors
    /// Returns an error for extensions other than csv, tsv, ndjson, jsonl or json.
    pub fn detect(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(Format::Delimited(b',')),
            Some("tsv") => Ok(Format::Delimited(b'\t')),
            Some("ndjson" | "jsonl" | "json") => Ok(Format::Ndjson),
            _ => bail!("Unsupported file type: {}", path.display()),
        }
    }
}

/// How delimited input is read
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Overrides the delimiter implied by the file extension
    pub delimiter: Option<u8>,
    /// First row holds column names; rows become JSON objects keyed by them
    ///
    /// Objects are keyed in alphabetical order and a repeated column name
    /// keeps the value of its last column.
    pub headers: bool,
}

impl ReadOptions {
    fn csv<R>(&self, path: &Path, default_delimiter: u8) -> CsvExtractor<R> {
        CsvExtractor::new(path)
            .delimiter(self.delimiter.unwrap_or(default_delimiter))
            .has_headers(self.headers)
    }
}

/// Parse a single-character delimiter argument
///
/// `\t` and `tab` are accepted for tab.
pub fn parse_delimiter(value: &str) -> Result<u8> {
    if matches!(value, "\\t" | "tab") {
        return Ok(b'\t');
    }

    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => bail!("Delimiter must be a single ASCII character, got {:?}", value),
    }
}

/// Convert a CSV/TSV or NDJSON file to NDJSON
///
/// Pipeline: CsvExtractor | NdjsonExtractor → to JSON → FieldDropper → NdjsonWriter
///
/// Returns the number of records written
pub fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &ReadOptions,
    drop: &[String],
) -> Result<usize> {
    let input = input.as_ref();
    let output = output.as_ref();
    let dropper = FieldDropper::new(drop.iter().cloned());

    log::info!("Converting {} to {}", input.display(), output.display());
    if !dropper.fields().is_empty() {
        log::debug!("Dropping fields: {}", dropper.fields().join(", "));
    }

    match Format::detect(input)? {
        Format::Delimited(delimiter) if options.headers => {
            let source = options.csv::<BTreeMap<String, String>>(input, delimiter);
            convert_records(source, dropper, output)
        }
        Format::Delimited(delimiter) => {
            let source = options.csv::<Vec<String>>(input, delimiter);
            convert_records(source, dropper, output)
        }
        Format::Ndjson => convert_records(NdjsonExtractor::<Value>::new(input), dropper, output),
    }
}

fn convert_records<E>(source: E, dropper: FieldDropper, output: &Path) -> Result<usize>
where
    E: Extractor,
    E::Item: Serialize,
{
    let to_json = try_transformer(|record: E::Item| {
        serde_json::to_value(record).context("Failed to convert record to JSON")
    });

    let mut pipe = Pipe::new(
        source,
        to_json.then(dropper),
        NdjsonWriter::<Value>::new(output),
    );
    pipe.run()
}

/// Count the records in a CSV/TSV or NDJSON file
pub fn count(input: impl AsRef<Path>, options: &ReadOptions) -> Result<usize> {
    let input = input.as_ref();

    match Format::detect(input)? {
        Format::Delimited(delimiter) => count_records(options.csv::<Vec<String>>(input, delimiter)),
        Format::Ndjson => count_records(NdjsonExtractor::<Value>::new(input)),
    }
}

fn count_records<E: Extractor>(source: E) -> Result<usize> {
    let mut pipe = Pipe::new(source, Identity::new(), writer(|_: E::Item| {}));
    pipe.run()
}

/// Pair two NDJSON files line by line into `[left, right]` arrays
///
/// The shorter file is padded with `null`, so the output has as many lines as
/// the longer input.
pub fn zip(
    left: impl AsRef<Path>,
    right: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<usize> {
    let (left, right, output) = (left.as_ref(), right.as_ref(), output.as_ref());

    for path in [left, right] {
        if Format::detect(path)? != Format::Ndjson {
            bail!("Only NDJSON files can be zipped: {}", path.display());
        }
    }

    log::info!(
        "Zipping {} with {} into {}",
        left.display(),
        right.display(),
        output.display()
    );

    let pair = transformer(|(left, right): (Option<Value>, Option<Value>)| {
        json!([left.unwrap_or(Value::Null), right.unwrap_or(Value::Null)])
    });

    let mut pipe = Pipe::new(
        zip_with_fill(
            NdjsonExtractor::<Value>::new(left),
            NdjsonExtractor::<Value>::new(right),
        ),
        pair,
        NdjsonWriter::<Value>::new(output),
    );
    pipe.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            Format::detect(Path::new("repos.CSV")).unwrap(),
            Format::Delimited(b',')
        );
        assert_eq!(
            Format::detect(Path::new("repos.tsv")).unwrap(),
            Format::Delimited(b'\t')
        );
        assert_eq!(
            Format::detect(Path::new("out.jsonl")).unwrap(),
            Format::Ndjson
        );
        assert!(Format::detect(Path::new("repos.xlsx")).is_err());
        assert!(Format::detect(Path::new("README")).is_err());
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn test_convert_raw_rows() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "repos.csv", "Github,Super git repos,1\nGitlab,Also git,2\n");
        let output = dir.path().join("repos.ndjson");

        let count = convert(&input, &output, &ReadOptions::default(), &[]).unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            read_lines(&output),
            vec![
                json!(["Github", "Super git repos", "1"]),
                json!(["Gitlab", "Also git", "2"]),
            ]
        );
    }

    #[test]
    fn test_convert_with_headers_and_drop() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "repos.tsv", "host\tdescription\tstars\nGithub\tSuper git repos\t1\n");
        let output = dir.path().join("repos.ndjson");
        let options = ReadOptions {
            headers: true,
            ..ReadOptions::default()
        };

        convert(&input, &output, &options, &["description".to_string()]).unwrap();

        assert_eq!(
            read_lines(&output),
            vec![json!({"host": "Github", "stars": "1"})]
        );
    }

    #[test]
    fn test_convert_headers_sorts_and_merges_columns() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "mirrors.csv", "stars,host,host\n1,Github,Gitlab\n");
        let output = dir.path().join("mirrors.ndjson");
        let options = ReadOptions {
            headers: true,
            ..ReadOptions::default()
        };

        convert(&input, &output, &options, &[]).unwrap();

        let content = fs::read_to_string(&output).unwrap();
        assert_eq!(content, "{\"host\":\"Gitlab\",\"stars\":\"1\"}\n");
    }

    #[test]
    fn test_convert_ragged_rows() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "repos.csv", "Github,Super git repos,1\nGitlab,Also\n");
        let output = dir.path().join("repos.ndjson");

        let written = convert(&input, &output, &ReadOptions::default(), &[]).unwrap();

        assert_eq!(written, 2);
        assert_eq!(read_lines(&output)[1], json!(["Gitlab", "Also"]));
        assert_eq!(count(&input, &ReadOptions::default()).unwrap(), 2);
    }

    #[test]
    fn test_convert_ndjson_with_delimiter_override() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "rows.csv", "a;b\n");
        let output = dir.path().join("rows.ndjson");
        let options = ReadOptions {
            delimiter: Some(b';'),
            headers: false,
        };

        convert(&input, &output, &options, &[]).unwrap();
        assert_eq!(read_lines(&output), vec![json!(["a", "b"])]);

        let copy = dir.path().join("copy.ndjson");
        convert(&output, &copy, &ReadOptions::default(), &[]).unwrap();
        assert_eq!(read_lines(&copy), vec![json!(["a", "b"])]);
    }

    #[test]
    fn test_count() {
        let dir = TempDir::new().unwrap();
        let csv = write_file(&dir, "rows.csv", "x\ny\nz\n");
        let ndjson = write_file(&dir, "rows.ndjson", "{}\n\n{}\n");

        assert_eq!(count(&csv, &ReadOptions::default()).unwrap(), 3);
        assert_eq!(count(&ndjson, &ReadOptions::default()).unwrap(), 2);
    }

    #[test]
    fn test_count_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = count(dir.path().join("absent.csv"), &ReadOptions::default()).unwrap_err();

        assert!(err.to_string().starts_with("Failed to open CSV file"));
    }

    #[test]
    fn test_zip_pads_shorter_file() {
        let dir = TempDir::new().unwrap();
        let left = write_file(&dir, "left.ndjson", "{\"a\":0}\n{\"a\":1}\n{\"a\":2}\n");
        let right = write_file(&dir, "right.ndjson", "0\n");
        let output = dir.path().join("pairs.ndjson");

        let count = zip(&left, &right, &output).unwrap();

        assert_eq!(count, 3);
        assert_eq!(
            read_lines(&output),
            vec![
                json!([{"a": 0}, 0]),
                json!([{"a": 1}, null]),
                json!([{"a": 2}, null]),
            ]
        );
    }

    #[test]
    fn test_zip_rejects_csv() {
        let dir = TempDir::new().unwrap();
        let left = write_file(&dir, "left.csv", "a\n");
        let right = write_file(&dir, "right.ndjson", "0\n");

        let err = zip(&left, &right, dir.path().join("out.ndjson")).unwrap_err();
        assert!(err.to_string().starts_with("Only NDJSON files can be zipped"));
    }
}
