//! Loader: TMDB CSV export to a typed [`Table`].
//!
//! Handles encoding and delimiter detection, strict rectangular parsing, and
//! normalization of `release_date` into `release_day` / `release_month`.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::path::Path;

use crate::error::{MalformedInputError, PipelineResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::{columns, Cell, ColumnDef, ColumnKind, Schema, Table};
use crate::options::{DatePolicy, PipelineOptions};
use crate::validation::{expected_kind, validate_header};

/// Date layouts found in TMDB exports, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Columns that must never hold a negative amount.
const MONEY_COLUMNS: &[&str] = &[columns::BUDGET, columns::REVENUE];

/// A loaded table with metadata about how it was read.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Table,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Columns of the raw header
    pub headers: Vec<String>,
    /// Rows whose release date could not be parsed (day/month left null)
    pub unparsed_dates: usize,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8 and anything unrecognized: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the field delimiter by counting occurrences in the header line.
///
/// `|` is never a candidate: it separates values inside multi-valued fields.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse a release date in any of the known layouts.
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Load a CSV file with encoding and delimiter detection.
pub fn load_path<P: AsRef<Path>>(path: P, options: &PipelineOptions) -> PipelineResult<LoadedTable> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| std::io::Error::new(e.kind(), format!("cannot read '{}': {}", path.as_ref().display(), e)))?;
    load_bytes(&bytes, options)
}

/// Load CSV bytes with encoding and delimiter detection.
pub fn load_bytes(bytes: &[u8], options: &PipelineOptions) -> PipelineResult<LoadedTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    load_str(&content, encoding, options)
}

/// Load already-decoded CSV text.
pub fn load_str(content: &str, encoding: String, options: &PipelineOptions) -> PipelineResult<LoadedTable> {
    log_info("📖 Reading CSV...");
    let delimiter = options.delimiter.unwrap_or_else(|| detect_delimiter(content));
    if !delimiter.is_ascii() {
        return Err(MalformedInputError::new(0, format!("Delimiter '{}' is not a single byte", delimiter)).into());
    }
    log_success(format!("Encoding: {}", encoding));
    log_success(format!("Delimiter: '{}'", format_delimiter(delimiter)));

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(false)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(e, 1))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(MalformedInputError::new(1, "Empty CSV file").into());
    }

    let header_schema = Schema::new(
        headers
            .iter()
            .map(|h| ColumnDef::new(h.clone(), expected_kind(h).unwrap_or(ColumnKind::Text)))
            .collect(),
    )?;
    validate_header(&header_schema)?;

    log_info(format!("📋 {} columns", headers.len()));
    for (i, col) in headers.iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, col), 1);
    }

    let date_idx = header_schema.require(columns::RELEASE_DATE)?;
    let schema = loaded_schema(&header_schema, date_idx)?;
    let mut table = Table::empty(schema);
    let mut unparsed_dates = 0;

    for (record_idx, record) in reader.records().enumerate() {
        // +1 for 0-index, +1 for header
        let fallback_line = record_idx + 2;
        let record = record.map_err(|e| csv_error(e, fallback_line))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);

        let mut row = Vec::with_capacity(table.column_count());
        let mut release_date = None;

        for (idx, (def, raw)) in header_schema.columns().iter().zip(record.iter()).enumerate() {
            if idx == date_idx {
                release_date = Some(raw);
                continue;
            }
            let cell = parse_cell(&def.kind, raw).map_err(|message| {
                MalformedInputError::new(line, message)
                    .with_column(def.name.clone())
                    .with_value(raw)
            })?;
            if MONEY_COLUMNS.contains(&def.name.as_str()) && cell.as_f64().is_some_and(|v| v < 0.0) {
                return Err(MalformedInputError::new(line, "Negative amount")
                    .with_column(def.name.clone())
                    .with_value(raw)
                    .into());
            }
            row.push(cell);
        }

        let (day, month) = match release_date.map(str::trim).filter(|s| !s.is_empty()) {
            None => (Cell::Null, Cell::Null),
            Some(raw) => match parse_release_date(raw) {
                Some(date) => (Cell::Int(i64::from(date.day())), Cell::Int(i64::from(date.month()))),
                None => match options.date_policy {
                    DatePolicy::Fail => {
                        return Err(MalformedInputError::new(line, "Unparseable release date")
                            .with_column(columns::RELEASE_DATE)
                            .with_value(raw)
                            .into());
                    }
                    DatePolicy::NullFields => {
                        unparsed_dates += 1;
                        (Cell::Null, Cell::Null)
                    }
                },
            },
        };
        row.push(day);
        row.push(month);

        table.push_row(row)?;
    }

    log_success(format!("Read {} rows", table.row_count()));
    if unparsed_dates > 0 {
        log_warning(format!("{} release dates could not be parsed (day/month left empty)", unparsed_dates));
    }

    Ok(LoadedTable {
        table,
        encoding,
        delimiter,
        headers,
        unparsed_dates,
    })
}

/// Header schema with `release_date` replaced by `release_day` and `release_month`.
fn loaded_schema(header_schema: &Schema, date_idx: usize) -> PipelineResult<Schema> {
    let mut defs: Vec<ColumnDef> = header_schema
        .columns()
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != date_idx)
        .map(|(_, def)| def.clone())
        .collect();
    defs.push(ColumnDef::new(columns::RELEASE_DAY, ColumnKind::Integer));
    defs.push(ColumnDef::new(columns::RELEASE_MONTH, ColumnKind::Integer));
    Ok(Schema::new(defs)?)
}

/// Parse one raw field according to its column kind.
///
/// An empty field is null. Text keeps whitespace-only values as they are;
/// numbers are trimmed first, so a blank numeric field is null too.
fn parse_cell(kind: &ColumnKind, raw: &str) -> Result<Cell, String> {
    if raw.is_empty() {
        return Ok(Cell::Null);
    }

    match kind {
        ColumnKind::Text | ColumnKind::MultiText | ColumnKind::Category { .. } => Ok(Cell::text(raw)),
        ColumnKind::Integer | ColumnKind::Float if raw.trim().is_empty() => Ok(Cell::Null),
        ColumnKind::Integer => parse_integer(raw.trim()).map(Cell::Int),
        ColumnKind::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Cell::Float)
            .ok_or_else(|| "not a number".to_string()),
    }
}

/// Integers, also accepting integral floats such as `1500000.0`.
/// A fractional value (`1500.5`) is an error, not truncated.
fn parse_integer(s: &str) -> Result<i64, String> {
    if let Ok(i) = s.parse::<i64>() {
        return Ok(i);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err("not an integer".to_string()),
    }
}

fn csv_error(err: csv::Error, fallback_line: usize) -> MalformedInputError {
    let line = err
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(fallback_line);
    let message = match err.kind() {
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            format!("Row has {} fields, header has {}", len, expected_len)
        }
        _ => format!("Invalid CSV: {}", err),
    };
    MalformedInputError::new(line, message)
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, SchemaError};

    const HEADER: &str =
        "id,imdb_id,popularity,budget,revenue,original_title,cast,director,genres,release_date,vote_average,release_year";

    fn load(csv: &str) -> PipelineResult<LoadedTable> {
        crate::logs::set_quiet(true);
        load_str(csv, "utf-8".to_string(), &PipelineOptions::default())
    }

    #[test]
    fn test_simple_load() {
        let csv = format!(
            "{}\n1,tt1,32.98,150000000,1513528810,Jurassic World,Chris Pratt|Irrfan Khan,Colin Trevorrow,Action|Adventure,6/9/15,6.5,2015",
            HEADER
        );
        let loaded = load(&csv).unwrap();
        let table = &loaded.table;

        assert_eq!(table.row_count(), 1);
        assert_eq!(loaded.delimiter, ',');
        assert_eq!(table.cell(0, "budget"), Some(&Cell::Int(150_000_000)));
        assert_eq!(table.cell(0, "popularity"), Some(&Cell::Float(32.98)));
        assert_eq!(table.cell(0, "release_day"), Some(&Cell::Int(9)));
        assert_eq!(table.cell(0, "release_month"), Some(&Cell::Int(6)));
        assert!(!table.schema().contains("release_date"));
        assert_eq!(table.schema().names().last(), Some(&"release_month"));
    }

    #[test]
    fn test_quoted_fields_with_delimiter() {
        let csv = format!(
            "{}\n1,tt1,1.0,10,20,\"Crouching Tiger, Hidden Dragon\",A|B,X,Drama,2000-07-06,7.1,2000",
            HEADER
        );
        let loaded = load(&csv).unwrap();
        assert_eq!(
            loaded.table.cell(0, "original_title"),
            Some(&Cell::text("Crouching Tiger, Hidden Dragon"))
        );
    }

    #[test]
    fn test_empty_fields_are_null() {
        let csv = format!("{}\n1,,1.0,10,20,T,,X,Drama,1/2/99,7.1,1999", HEADER);
        let loaded = load(&csv).unwrap();
        assert_eq!(loaded.table.cell(0, "imdb_id"), Some(&Cell::Null));
        assert_eq!(loaded.table.cell(0, "cast"), Some(&Cell::Null));
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let csv = format!("{}\n1,tt1,1.0,10", HEADER);
        let err = load(&csv).unwrap_err();
        match err {
            PipelineError::MalformedInput(e) => assert_eq!(e.line, 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let csv = "id,budget\n1,10";
        let err = load(csv).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(SchemaError::MissingColumn(_))));
    }

    #[test]
    fn test_bad_number_reports_column() {
        let csv = format!("{}\n1,tt1,1.0,lots,20,T,A,X,Drama,1/2/99,7.1,1999", HEADER);
        match load(&csv).unwrap_err() {
            PipelineError::MalformedInput(e) => {
                assert_eq!(e.column.as_deref(), Some("budget"));
                assert_eq!(e.value.as_deref(), Some("lots"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_integral_float_accepted_for_integer_column() {
        let csv = format!("{}\n1,tt1,1.0,1500000.0,20,T,A,X,Drama,1/2/99,7.1,1999", HEADER);
        let loaded = load(&csv).unwrap();
        assert_eq!(loaded.table.cell(0, "budget"), Some(&Cell::Int(1_500_000)));
    }

    #[test]
    fn test_unparseable_date_nulls_fields_by_default() {
        let csv = format!("{}\n1,tt1,1.0,10,20,T,A,X,Drama,someday,7.1,1999", HEADER);
        let loaded = load(&csv).unwrap();
        assert_eq!(loaded.unparsed_dates, 1);
        assert_eq!(loaded.table.cell(0, "release_day"), Some(&Cell::Null));
        assert_eq!(loaded.table.cell(0, "release_month"), Some(&Cell::Null));
    }

    #[test]
    fn test_unparseable_date_fails_when_configured() {
        crate::logs::set_quiet(true);
        let csv = format!("{}\n1,tt1,1.0,10,20,T,A,X,Drama,someday,7.1,1999", HEADER);
        let options = PipelineOptions {
            date_policy: DatePolicy::Fail,
            ..PipelineOptions::default()
        };
        let err = load_str(&csv, "utf-8".to_string(), &options).unwrap_err();
        assert!(err.to_string().contains("release_date"));
    }

    #[test]
    fn test_parse_release_date_layouts() {
        assert_eq!(parse_release_date("6/9/15").map(|d| (d.month(), d.day())), Some((6, 9)));
        assert_eq!(parse_release_date("12/25/1966").map(|d| (d.month(), d.day())), Some((12, 25)));
        assert_eq!(parse_release_date("2015-06-09").map(|d| (d.month(), d.day())), Some((6, 9)));
        assert_eq!(parse_release_date("2015-06-09 00:00:00").map(|d| d.day()), Some(9));
        assert_eq!(parse_release_date("13/45/15"), None);
    }

    #[test]
    fn test_detect_delimiter_ignores_pipe() {
        assert_eq!(detect_delimiter("a,b,c|d|e|f"), ',');
        assert_eq!(detect_delimiter("a;b;c"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_semicolon_file() {
        let csv = format!(
            "{}\n1;tt1;1.0;10;20;T;A|B;X;Drama;1/2/99;7.1;1999",
            HEADER.replace(',', ";")
        );
        let loaded = load(&csv).unwrap();
        assert_eq!(loaded.delimiter, ';');
        assert_eq!(loaded.table.cell(0, "cast"), Some(&Cell::text("A|B")));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_load_path() {
        crate::logs::set_quiet(true);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmdb.csv");
        std::fs::write(&path, format!("{}\n1,tt1,1.0,10,20,T,A,X,Drama,1/2/99,7.1,1999\n", HEADER)).unwrap();

        let loaded = load_path(&path, &PipelineOptions::default()).unwrap();
        assert_eq!(loaded.table.row_count(), 1);
        assert_eq!(loaded.headers.len(), 12);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_path("/nonexistent/tmdb.csv", &PipelineOptions::default()).unwrap_err();
        match err {
            PipelineError::Io(e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
                assert!(e.to_string().contains("/nonexistent/tmdb.csv"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_text_is_kept() {
        let csv = format!("{}\n1,tt1, ,10,20,T, ,X,Drama,1/2/99,7.1,1999", HEADER);
        let loaded = load(&csv).unwrap();
        assert_eq!(loaded.table.cell(0, "cast"), Some(&Cell::text(" ")));
        assert_eq!(loaded.table.cell(0, "popularity"), Some(&Cell::Null));
    }

    #[test]
    fn test_fractional_budget_rejected() {
        let csv = format!("{}\n1,tt1,1.0,1500.5,20,T,A,X,Drama,1/2/99,7.1,1999", HEADER);
        let err = load(&csv).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
    }

    #[test]
    fn test_negative_budget_rejected() {
        let csv = format!("{}\n1,tt1,1.0,-10,20,T,A,X,Drama,1/2/99,7.1,1999", HEADER);
        let err = load(&csv).unwrap_err();
        assert!(err.to_string().contains("Negative amount"));
    }
}
