//! Two-line "hypertable" points used by the Prometheus target
//!
//! A file starts with a header block:
//!
//! ```text
//! tags,hostname string,region string
//! cpu,usage_user,usage_system
//! mem,used,free
//!
//! ```
//!
//! followed by two lines per point: `tags,hostname=host_0,region=eu-west-1`
//! then `cpu,1451606400000000000,58,2` (measurement, nanosecond timestamp,
//! one value per field key of that measurement).

use super::input::read_line;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tsbench_interfaces::{Batch, DataSource, LoadError, LoadResult, PartitionKey, SchemaHeader};

pub const TAGS_PREFIX: &str = "tags";

/// One row keyed by the measurement (hypertable) it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperPoint {
    pub measurement: String,
    pub row: HyperRow,
}

/// Tag pairs and `timestamp,values...` of one point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HyperRow {
    pub tags: String,
    pub fields: String,
}

impl HyperPoint {
    /// Build a point from its tags line and data line
    pub fn parse(tags_line: &str, data_line: &str) -> LoadResult<Self> {
        let tags = match tags_line.split_once(',') {
            Some((TAGS_PREFIX, rest)) => rest,
            None if tags_line == TAGS_PREFIX => "",
            _ => {
                return Err(LoadError::parse(format!(
                    "data file in invalid format; got '{}' expected '{}'",
                    tags_line, TAGS_PREFIX
                )))
            }
        };
        let Some((measurement, fields)) = data_line.split_once(',') else {
            return Err(LoadError::parse(format!("data line has no values: '{}'", data_line)));
        };

        Ok(Self {
            measurement: measurement.to_string(),
            row: HyperRow {
                tags: tags.to_string(),
                fields: fields.to_string(),
            },
        })
    }
}

impl HyperPoint {
    /// Check the row against the field keys `header` lists for its measurement
    pub fn check(&self, header: &SchemaHeader) -> LoadResult<()> {
        let fields = header.fields(&self.measurement).ok_or_else(|| {
            LoadError::parse(format!("no field keys for measurement '{}'", self.measurement))
        })?;
        self.row.timestamp_and_values()?;
        let values = self.row.value_count();
        if values != fields.len() {
            return Err(LoadError::parse(format!(
                "'{}' row has {} values, header lists {} fields",
                self.measurement,
                values,
                fields.len()
            )));
        }
        Ok(())
    }
}

impl PartitionKey for HyperPoint {
    fn partition_key(&self) -> &[u8] {
        self.row.tags.as_bytes()
    }
}

impl HyperRow {
    /// `(key, value)` tag pairs; malformed pairs are skipped
    pub fn tag_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.split(',').filter_map(|pair| pair.split_once('='))
    }

    /// Timestamp in nanoseconds and the raw field values
    pub fn timestamp_and_values(&self) -> LoadResult<(i64, impl Iterator<Item = &str>)> {
        let mut parts = self.fields.split(',');
        let raw = parts.next().unwrap_or_default();
        let timestamp = raw
            .parse::<i64>()
            .map_err(|e| LoadError::parse(format!("invalid timestamp '{}': {}", raw, e)))?;
        Ok((timestamp, parts))
    }

    /// Number of values after the timestamp
    pub fn value_count(&self) -> usize {
        self.fields.split(',').count().saturating_sub(1)
    }
}

/// Rows grouped per measurement
#[derive(Debug, Default)]
pub struct HyperBatch {
    tables: BTreeMap<String, Vec<HyperRow>>,
    rows: usize,
    metrics: u64,
}

impl HyperBatch {
    /// Non-empty measurements with their rows, in name order
    pub fn tables(&self) -> impl Iterator<Item = (&str, &[HyperRow])> {
        self.tables
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(name, rows)| (name.as_str(), rows.as_slice()))
    }
}

impl Batch for HyperBatch {
    type Point = HyperPoint;

    fn len(&self) -> usize {
        self.rows
    }

    fn metric_count(&self) -> u64 {
        self.metrics
    }

    fn append(&mut self, point: HyperPoint) -> LoadResult<()> {
        point.row.timestamp_and_values()?;
        let values = point.row.value_count();
        if values == 0 {
            return Err(LoadError::parse(format!("'{}' row has no values", point.measurement)));
        }
        self.metrics += values as u64;
        self.rows += 1;
        self.tables.entry(point.measurement).or_default().push(point.row);
        Ok(())
    }

    fn reset(&mut self) {
        // Keep the per-measurement vectors for the next fill
        for rows in self.tables.values_mut() {
            rows.clear();
        }
        self.rows = 0;
        self.metrics = 0;
    }
}

/// Parse the header block, consuming the blank line that ends it
pub fn read_header<R: BufRead + ?Sized>(reader: &mut R) -> LoadResult<SchemaHeader> {
    let mut buf = String::new();
    if read_line(reader, &mut buf)?.is_none() {
        return Err(LoadError::parse("ended too soon, no tags or cols read"));
    }

    let mut header = SchemaHeader::new();
    let mut tags = buf.trim().split(',');
    if tags.next() != Some(TAGS_PREFIX) {
        return Err(LoadError::parse(format!(
            "input header in wrong format. got '{}', expected '{}'",
            buf.trim(),
            TAGS_PREFIX
        )));
    }
    for tag in tags {
        let Some((name, tag_type)) = tag.split_once(' ') else {
            return Err(LoadError::parse(format!("tag header has invalid format: '{}'", tag)));
        };
        header = header.with_tag(name, tag_type);
    }

    loop {
        if read_line(reader, &mut buf)?.is_none() {
            return Err(LoadError::parse("ended too soon, header block is not terminated"));
        }
        let line = buf.trim();
        if line.is_empty() {
            return Ok(header);
        }
        let mut columns = line.split(',');
        let measurement = columns.next().unwrap_or_default();
        header = header.with_measurement(measurement, columns);
    }
}

/// Write a header block that [`read_header`] accepts
pub fn write_header<W: Write + ?Sized>(header: &SchemaHeader, out: &mut W) -> io::Result<()> {
    write!(out, "{}", TAGS_PREFIX)?;
    for (key, tag_type) in header.tag_keys.iter().zip(&header.tag_types) {
        write!(out, ",{} {}", key, tag_type)?;
    }
    writeln!(out)?;
    for (measurement, fields) in &header.field_keys {
        writeln!(out, "{},{}", measurement, fields.join(","))?;
    }
    writeln!(out)
}

/// Replays a hypertable file
pub struct HyperFileSource<R> {
    reader: R,
    headers: Option<Arc<SchemaHeader>>,
    tags: String,
    data: String,
}

impl<R: BufRead + Send> HyperFileSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            headers: None,
            tags: String::new(),
            data: String::new(),
        }
    }
}

impl<R: BufRead + Send> DataSource for HyperFileSource<R> {
    type Point = HyperPoint;

    fn headers(&mut self) -> LoadResult<Arc<SchemaHeader>> {
        if let Some(headers) = &self.headers {
            return Ok(Arc::clone(headers));
        }
        let headers = Arc::new(read_header(&mut self.reader)?);
        self.headers = Some(Arc::clone(&headers));
        Ok(headers)
    }

    fn next_item(&mut self) -> LoadResult<Option<HyperPoint>> {
        if self.headers.is_none() {
            self.headers()?;
        }

        loop {
            if read_line(&mut self.reader, &mut self.tags)?.is_none() {
                return Ok(None);
            }
            if !self.tags.is_empty() {
                break;
            }
        }
        if read_line(&mut self.reader, &mut self.data)?.is_none() {
            return Err(LoadError::parse(format!(
                "data line missing after '{}'",
                self.tags
            )));
        }
        let point = HyperPoint::parse(&self.tags, &self.data)?;
        if let Some(headers) = &self.headers {
            point.check(headers)?;
        }
        Ok(Some(point))
    }
}
