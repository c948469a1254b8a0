//! A small tabular dataset and its CSV codec.
//!
//! [`Frame`] holds a row index plus named columns of [`Value`] cells.
//! [`CsvCodec`] stores it as CSV whose first column is the index: the header row
//! starts with the index name (empty when unnamed) followed by column names.
//!
//! On read every column's type is inferred from its non-empty cells, trying
//! integer, then float, then boolean, then falling back to string. Empty cells
//! read back as [`Value::Null`]. A column of digit-only strings therefore comes
//! back as integers unless its type is pinned with [`CsvCodec::with_dtype`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use thiserror::Error;

use crate::codec::Codec;
use crate::error::CodecError;

/// One cell of a [`Frame`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            // Debug keeps the fractional part, so `1.0` is not read back as an int.
            Value::Float(f) => format!("{:?}", f),
            Value::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_field())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Column type used when reading CSV.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    Int,
    Float,
    Bool,
    Str,
}

/// A named column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("column `{column}` has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),
}

/// A tabular dataset: a row index plus equally long named columns.
///
/// # Examples
///
/// ```
/// use framecache_core::{Column, Frame, Value};
///
/// let frame = Frame::from_columns(vec![
///     Column::new("ints", vec![1.into(), 2.into()]),
///     Column::new("strs", vec!["a".into(), "b".into()]),
/// ])
/// .unwrap();
///
/// assert_eq!(frame.shape(), (2, 2));
/// assert_eq!(frame.index(), &[Value::Int(0), Value::Int(1)]);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFrame")]
pub struct Frame {
    index_name: Option<String>,
    index: Vec<Value>,
    columns: Vec<Column>,
}

/// Unchecked wire shape of a [`Frame`]; decoding goes through [`Frame::new`].
#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    index_name: Option<String>,
    index: Vec<Value>,
    columns: Vec<Column>,
}

impl TryFrom<RawFrame> for Frame {
    type Error = FrameError;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        Frame::new(raw.index_name, raw.index, raw.columns)
    }
}

impl Frame {
    /// Builds a frame with an explicit index.
    pub fn new(
        index_name: Option<String>,
        index: Vec<Value>,
        columns: Vec<Column>,
    ) -> Result<Self, FrameError> {
        let expected = index.len();
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if column.values.len() != expected {
                return Err(FrameError::LengthMismatch {
                    column: column.name.clone(),
                    expected,
                    actual: column.values.len(),
                });
            }
            if !seen.insert(column.name.as_str()) {
                return Err(FrameError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self {
            index_name,
            index,
            columns,
        })
    }

    /// Builds a frame indexed `0..rows`.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, FrameError> {
        let rows = columns.first().map_or(0, |c| c.values.len());
        let index = (0..rows as i64).map(Value::Int).collect();
        Self::new(None, index, columns)
    }

    /// `(rows, columns)`, not counting the index.
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn index(&self) -> &[Value] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// CSV codec for [`Frame`]; the first column is the row index.
///
/// # Examples
///
/// ```
/// use framecache_core::{Codec, Column, CsvCodec, DType, Frame, Value};
///
/// let frame = Frame::from_columns(vec![
///     Column::new("code", vec!["007".into(), "042".into()]),
/// ])
/// .unwrap();
///
/// let codec = CsvCodec::new().with_dtype("code", DType::Str);
/// let mut buf = Vec::new();
/// codec.encode(&mut buf, &frame).unwrap();
/// assert_eq!(String::from_utf8(buf.clone()).unwrap(), ",code\n0,007\n1,042\n");
///
/// let back: Frame = codec.decode(&mut buf.as_slice()).unwrap();
/// assert_eq!(back, frame);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CsvCodec {
    dtypes: HashMap<String, DType>,
    index_dtype: Option<DType>,
}

impl CsvCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the type of a column instead of inferring it.
    pub fn with_dtype(mut self, column: impl Into<String>, dtype: DType) -> Self {
        self.dtypes.insert(column.into(), dtype);
        self
    }

    /// Pins the type of the index column.
    pub fn with_index_dtype(mut self, dtype: DType) -> Self {
        self.index_dtype = Some(dtype);
        self
    }
}

impl Codec<Frame> for CsvCodec {
    fn decode(&self, reader: &mut dyn Read) -> Result<Frame, CodecError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.is_empty() {
            return Err("missing header row".into());
        }

        let width = headers.len();
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); width];
        for record in csv_reader.records() {
            let record = record?;
            for (slot, field) in raw.iter_mut().zip(record.iter()) {
                slot.push(field.to_string());
            }
        }

        let mut raw = raw.into_iter();
        let index_raw = raw.next().unwrap_or_default();
        let index_name = match &headers[0] {
            "" => None,
            name => Some(name.to_string()),
        };
        let index = parse_column(&index_raw, self.index_dtype)?;

        let mut columns = Vec::with_capacity(width - 1);
        for (name, cells) in headers.iter().skip(1).zip(raw) {
            let values = parse_column(&cells, self.dtypes.get(name).copied())?;
            columns.push(Column::new(name, values));
        }

        Ok(Frame::new(index_name, index, columns)?)
    }

    fn encode(&self, writer: &mut dyn Write, frame: &Frame) -> Result<(), CodecError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(frame.columns.len() + 1);
        header.push(frame.index_name.clone().unwrap_or_default());
        header.extend(frame.columns.iter().map(|c| c.name.clone()));
        csv_writer.write_record(&header)?;

        for (row, label) in frame.index.iter().enumerate() {
            let mut record = Vec::with_capacity(header.len());
            record.push(label.to_field());
            record.extend(
                frame
                    .columns
                    .iter()
                    .map(|c| c.values.get(row).map(Value::to_field).unwrap_or_default()),
            );
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

fn infer_dtype(cells: &[String]) -> DType {
    let mut present = cells.iter().filter(|c| !c.is_empty()).peekable();
    if present.peek().is_none() {
        return DType::Float;
    }
    let present: Vec<&String> = present.collect();
    if present.iter().all(|c| c.parse::<i64>().is_ok()) {
        DType::Int
    } else if present.iter().all(|c| c.parse::<f64>().is_ok()) {
        DType::Float
    } else if present.iter().all(|c| parse_bool(c).is_some()) {
        DType::Bool
    } else {
        DType::Str
    }
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_column(cells: &[String], pinned: Option<DType>) -> Result<Vec<Value>, CodecError> {
    let dtype = pinned.unwrap_or_else(|| infer_dtype(cells));
    cells
        .iter()
        .map(|cell| parse_cell(cell, dtype))
        .collect()
}

fn parse_cell(cell: &str, dtype: DType) -> Result<Value, CodecError> {
    if dtype == DType::Str {
        return Ok(Value::Str(cell.to_string()));
    }
    if cell.is_empty() {
        return Ok(Value::Null);
    }
    let value = match dtype {
        DType::Int => Value::Int(cell.parse()?),
        DType::Float => Value::Float(cell.parse()?),
        DType::Bool => Value::Bool(
            parse_bool(cell).ok_or_else(|| format!("`{}` is not a boolean", cell))?,
        ),
        DType::Str => unreachable!(),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUM_SAMPLES: i64 = 10;

    fn sample_frame() -> Frame {
        let numbers: Vec<i64> = (0..NUM_SAMPLES).map(|i| 1000 + i).collect();
        Frame::from_columns(vec![
            Column::new("ints", numbers.iter().map(|&n| Value::Int(n)).collect()),
            Column::new(
                "strs",
                numbers.iter().map(|n| Value::Str(format!("s{}", n))).collect(),
            ),
            Column::new(
                "floats",
                numbers.iter().map(|&n| Value::Float(n as f64)).collect(),
            ),
        ])
        .unwrap()
    }

    fn round_trip(codec: &CsvCodec, frame: &Frame) -> Frame {
        let mut buf = Vec::new();
        codec.encode(&mut buf, frame).unwrap();
        codec.decode(&mut buf.as_slice()).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_shape_and_values() {
        let frame = sample_frame();
        let back = round_trip(&CsvCodec::new(), &frame);
        assert_eq!(back.shape(), (10, 3));
        assert_eq!(back, frame);
    }

    #[test]
    fn test_round_trip_named_index_and_nulls() {
        let frame = Frame::new(
            Some("day".into()),
            vec!["mon".into(), "tue".into(), "wed".into()],
            vec![
                Column::new("temp", vec![12.5.into(), Value::Null, 9.75.into()]),
                Column::new("rain", vec![true.into(), false.into(), Value::Null]),
            ],
        )
        .unwrap();
        let back = round_trip(&CsvCodec::new(), &frame);
        assert_eq!(back.index_name(), Some("day"));
        assert_eq!(back, frame);
    }

    #[test]
    fn test_fields_with_commas_and_quotes() {
        let frame = Frame::from_columns(vec![Column::new(
            "text",
            vec!["a,b".into(), "say \"hi\"".into(), "line\nbreak".into()],
        )])
        .unwrap();
        assert_eq!(round_trip(&CsvCodec::new(), &frame), frame);
    }

    #[test]
    fn test_digit_strings_infer_as_ints_unless_pinned() {
        let frame = Frame::from_columns(vec![Column::new("code", vec!["1".into(), "2".into()])])
            .unwrap();

        let inferred = round_trip(&CsvCodec::new(), &frame);
        assert_eq!(inferred.column("code"), Some(&[Value::Int(1), Value::Int(2)][..]));

        let pinned = round_trip(&CsvCodec::new().with_dtype("code", DType::Str), &frame);
        assert_eq!(pinned, frame);
    }

    #[test]
    fn test_mixed_int_float_column_becomes_float() {
        let input = ",x\n0,1\n1,2.5\n";
        let frame = CsvCodec::new().decode(&mut input.as_bytes()).unwrap();
        assert_eq!(frame.column("x"), Some(&[Value::Float(1.0), Value::Float(2.5)][..]));
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let input = ",x,y\n0,1,2\n1,3\n";
        assert!(CsvCodec::new().decode(&mut input.as_bytes()).is_err());
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(CsvCodec::new().decode(&mut "".as_bytes()).is_err());
    }

    #[test]
    fn test_header_only_gives_empty_frame() {
        let frame = CsvCodec::new().decode(&mut ",a,b\n".as_bytes()).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.shape(), (0, 2));
    }

    #[test]
    fn test_frame_rejects_length_mismatch() {
        let err = Frame::from_columns(vec![
            Column::new("a", vec![1.into(), 2.into()]),
            Column::new("b", vec![1.into()]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthMismatch {
                column: "b".into(),
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_frame_rejects_duplicate_columns() {
        let err = Frame::from_columns(vec![
            Column::new("a", vec![1.into()]),
            Column::new("a", vec![2.into()]),
        ])
        .unwrap_err();
        assert_eq!(err, FrameError::DuplicateColumn("a".into()));
    }

    #[test]
    fn test_json_frame_is_validated_on_decode() {
        let short = r#"{"index":[0,1],"columns":[{"name":"a","values":[1]}]}"#;
        let err = serde_json::from_str::<Frame>(short).unwrap_err();
        assert!(err.to_string().contains("column `a` has 1 rows, expected 2"));

        let twice = r#"{"index":[0],"columns":[{"name":"a","values":[1]},{"name":"a","values":[2]}]}"#;
        assert!(serde_json::from_str::<Frame>(twice).is_err());

        let frame: Frame = serde_json::from_str(&serde_json::to_string(&sample_frame()).unwrap()).unwrap();
        assert_eq!(frame, sample_frame());
    }

    #[test]
    fn test_malformed_json_frame_is_a_decode_error() {
        use crate::codec::JsonCodec;
        use crate::error::StorageError;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.json");
        std::fs::write(
            &path,
            r#"{"index_name":null,"index":[0,1,2],"columns":[{"name":"close","values":[1.5]}]}"#,
        )
        .unwrap();

        let result: Result<Frame, _> = JsonCodec::new().read(&path);
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }
}
