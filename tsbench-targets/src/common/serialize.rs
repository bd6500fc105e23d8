//! Rendering simulated readings in each target's input format

use super::hypertable::{self, HyperPoint, HyperRow, TAGS_PREFIX};
use super::line_protocol::LinePoint;
use super::simulator::SimPoint;
use std::fmt::Write as _;
use std::io;
use tsbench_interfaces::{LoadResult, SchemaHeader};

/// Turns simulator output into a target's points and file format
pub trait PointSerializer: Send + Sync + 'static {
    type Point: Send + 'static;

    /// File preamble, if the format has one
    fn write_header(&self, _header: &SchemaHeader, _out: &mut dyn io::Write) -> io::Result<()> {
        Ok(())
    }

    /// Append the file form of `point` (with trailing newline) to `out`
    fn serialize(&self, point: &SimPoint, out: &mut String);

    /// The point the target's batches accept
    fn to_point(&self, point: &SimPoint) -> LoadResult<Self::Point>;
}

/// `cpu,hostname=host_0,... usage_user=58.1,... 1451606400000000000`
#[derive(Debug, Clone, Copy, Default)]
pub struct LineProtocolSerializer;

impl LineProtocolSerializer {
    fn write_line(point: &SimPoint, out: &mut String) {
        out.push_str(&point.measurement);
        for (key, value) in &point.tags {
            let _ = write!(out, ",{}={}", key, value);
        }
        for (i, (key, value)) in point.fields.iter().enumerate() {
            let separator = if i == 0 { ' ' } else { ',' };
            let _ = write!(out, "{}{}={}", separator, key, value);
        }
        let _ = write!(out, " {}", point.unix_nanos());
    }
}

impl PointSerializer for LineProtocolSerializer {
    type Point = LinePoint;

    fn serialize(&self, point: &SimPoint, out: &mut String) {
        Self::write_line(point, out);
        out.push('\n');
    }

    fn to_point(&self, point: &SimPoint) -> LoadResult<LinePoint> {
        let mut line = String::with_capacity(256);
        Self::write_line(point, &mut line);
        Ok(LinePoint::new(line))
    }
}

/// Header block, then `tags,k=v,...` and `measurement,ts,v1,...` per point
#[derive(Debug, Clone, Copy, Default)]
pub struct HypertableSerializer;

impl HypertableSerializer {
    fn row(point: &SimPoint) -> HyperRow {
        let mut tags = String::with_capacity(128);
        for (i, (key, value)) in point.tags.iter().enumerate() {
            if i > 0 {
                tags.push(',');
            }
            let _ = write!(tags, "{}={}", key, value);
        }

        let mut fields = point.unix_nanos().to_string();
        for (_, value) in &point.fields {
            let _ = write!(fields, ",{}", value);
        }
        HyperRow { tags, fields }
    }
}

impl PointSerializer for HypertableSerializer {
    type Point = HyperPoint;

    fn write_header(&self, header: &SchemaHeader, out: &mut dyn io::Write) -> io::Result<()> {
        hypertable::write_header(header, out)
    }

    fn serialize(&self, point: &SimPoint, out: &mut String) {
        let row = Self::row(point);
        let _ = writeln!(out, "{},{}", TAGS_PREFIX, row.tags);
        let _ = writeln!(out, "{},{}", point.measurement, row.fields);
    }

    fn to_point(&self, point: &SimPoint) -> LoadResult<HyperPoint> {
        Ok(HyperPoint {
            measurement: point.measurement.clone(),
            row: Self::row(point),
        })
    }
}
