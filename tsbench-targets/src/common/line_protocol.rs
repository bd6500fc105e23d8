//! InfluxDB line protocol points, batches and file replay
//!
//! A line reads `measurement,tag=v,... field=v,... timestamp`. The loader
//! never parses values: a batch is the raw lines joined by newlines, counted
//! as one row per line and one metric per field.

use super::input::read_line;
use std::io::BufRead;
use std::sync::Arc;
use tsbench_interfaces::{Batch, DataSource, LoadError, LoadResult, PartitionKey, SchemaHeader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePoint {
    line: String,
}

impl LinePoint {
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// Measurement and tag set, i.e. everything before the first space
    pub fn series_key(&self) -> &str {
        self.line.split(' ').next().unwrap_or_default()
    }
}

impl PartitionKey for LinePoint {
    fn partition_key(&self) -> &[u8] {
        self.series_key().as_bytes()
    }
}

#[derive(Debug, Default)]
pub struct LineBatch {
    buf: Vec<u8>,
    rows: usize,
    metrics: u64,
}

impl LineBatch {
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
            ..Default::default()
        }
    }

    /// Request body: the lines, each terminated by a newline
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl Batch for LineBatch {
    type Point = LinePoint;

    fn len(&self) -> usize {
        self.rows
    }

    fn metric_count(&self) -> u64 {
        self.metrics
    }

    fn append(&mut self, point: LinePoint) -> LoadResult<()> {
        let line = point.as_str();
        let mut tuples = line.split(' ');
        let (Some(_), Some(fields), Some(_), None) = (tuples.next(), tuples.next(), tuples.next(), tuples.next())
        else {
            return Err(LoadError::parse(format!(
                "line does not have 3 tuples, has {}",
                line.split(' ').count()
            )));
        };

        self.metrics += fields.split(',').count() as u64;
        self.rows += 1;
        self.buf.extend_from_slice(line.as_bytes());
        self.buf.push(b'\n');
        Ok(())
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.rows = 0;
        self.metrics = 0;
    }
}

/// Replays a line protocol file, one point per non-empty line
pub struct LineFileSource<R> {
    reader: R,
    buf: String,
}

impl<R: BufRead + Send> LineFileSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
        }
    }
}

impl<R: BufRead + Send> DataSource for LineFileSource<R> {
    type Point = LinePoint;

    /// Line protocol carries its schema inline
    fn headers(&mut self) -> LoadResult<Arc<SchemaHeader>> {
        Ok(Arc::new(SchemaHeader::default()))
    }

    fn next_item(&mut self) -> LoadResult<Option<LinePoint>> {
        while read_line(&mut self.reader, &mut self.buf)?.is_some() {
            if !self.buf.is_empty() {
                return Ok(Some(LinePoint::new(self.buf.as_str())));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LINE: &str = "cpu,hostname=host_0,region=eu-west-1 usage_user=58,usage_system=2,usage_idle=24 1451606400000000000";

    #[test]
    fn test_append_counts_fields() {
        let mut batch = LineBatch::default();
        batch.append(LinePoint::new(LINE)).unwrap();
        batch.append(LinePoint::new("mem,host=a used=1 1")).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.metric_count(), 4);
        assert_eq!(batch.as_bytes(), format!("{}\nmem,host=a used=1 1\n", LINE).as_bytes());

        batch.reset();
        assert!(batch.is_empty());
        assert!(batch.as_bytes().is_empty());
    }

    #[test]
    fn test_append_rejects_wrong_tuple_count() {
        let mut batch = LineBatch::default();
        let err = batch.append(LinePoint::new("cpu,host=a usage=1")).unwrap_err();
        assert_eq!(err.to_string(), "parse error: line does not have 3 tuples, has 2");

        let err = batch.append(LinePoint::new("cpu,host=a usage=1 1 extra")).unwrap_err();
        assert_eq!(err.to_string(), "parse error: line does not have 3 tuples, has 4");
        assert!(batch.is_empty());
    }

    #[test]
    fn test_series_key() {
        assert_eq!(LinePoint::new(LINE).series_key(), "cpu,hostname=host_0,region=eu-west-1");
    }

    #[test]
    fn test_file_source_skips_blank_lines() {
        let input = format!("{}\n\n{}\r\n", LINE, LINE);
        let mut source = LineFileSource::new(Cursor::new(input));

        assert!(source.headers().unwrap().is_empty());
        assert_eq!(source.next_item().unwrap().unwrap().as_str(), LINE);
        assert_eq!(source.next_item().unwrap().unwrap().as_str(), LINE);
        assert!(source.next_item().unwrap().is_none());
    }
}
