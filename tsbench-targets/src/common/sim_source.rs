//! Points straight from a simulator

use super::serialize::PointSerializer;
use super::simulator::{SimPoint, Simulator};
use std::io::Write;
use std::sync::Arc;
use tsbench_interfaces::{DataSource, LoadResult, SchemaHeader};

pub struct SimulationDataSource<Z> {
    simulator: Box<dyn Simulator>,
    serializer: Z,
    point: SimPoint,
}

impl<Z: PointSerializer> SimulationDataSource<Z> {
    pub fn new(simulator: Box<dyn Simulator>, serializer: Z) -> Self {
        Self {
            simulator,
            serializer,
            point: SimPoint::default(),
        }
    }
}

impl<Z: PointSerializer> DataSource for SimulationDataSource<Z> {
    type Point = Z::Point;

    fn headers(&mut self) -> LoadResult<Arc<SchemaHeader>> {
        Ok(Arc::new(self.simulator.headers()))
    }

    fn next_item(&mut self) -> LoadResult<Option<Z::Point>> {
        while !self.simulator.finished() {
            self.point.reset();
            if self.simulator.next(&mut self.point) {
                return self.serializer.to_point(&self.point).map(Some);
            }
        }
        Ok(None)
    }
}

/// Write the whole simulation to `out` in the serializer's file format,
/// returning the number of points written
pub fn generate<Z: PointSerializer>(
    mut simulator: Box<dyn Simulator>,
    serializer: &Z,
    out: &mut dyn Write,
) -> LoadResult<u64> {
    serializer.write_header(&simulator.headers(), out)?;

    let mut point = SimPoint::default();
    let mut text = String::with_capacity(512);
    let mut written = 0;
    while !simulator.finished() {
        point.reset();
        if simulator.next(&mut point) {
            text.clear();
            serializer.serialize(&point, &mut text);
            out.write_all(text.as_bytes())?;
            written += 1;
        }
    }
    out.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CpuOnlySimulator, HyperFileSource, HypertableSerializer, LineFileSource, LineProtocolSerializer};
    use std::io::Cursor;
    use tsbench_config::SimulatorConfig;

    fn simulator() -> Box<dyn Simulator> {
        let config = SimulatorConfig {
            scale: 4,
            max_data_points: 100,
            ..Default::default()
        };
        Box::new(CpuOnlySimulator::new(&config).unwrap())
    }

    fn collect<S: DataSource>(mut source: S) -> Vec<S::Point> {
        let mut points = Vec::new();
        while let Some(point) = source.next_item().unwrap() {
            points.push(point);
        }
        points
    }

    #[test]
    fn test_source_yields_every_due_point() {
        let mut source = SimulationDataSource::new(simulator(), LineProtocolSerializer);
        assert_eq!(source.headers().unwrap().tag_keys.len(), 10);
        assert_eq!(collect(source).len(), 100);
    }

    #[test]
    fn test_generated_line_file_replays_identically() {
        let mut out = Vec::new();
        let written = generate(simulator(), &LineProtocolSerializer, &mut out).unwrap();
        assert_eq!(written, 100);

        let replayed = collect(LineFileSource::new(Cursor::new(out)));
        let simulated = collect(SimulationDataSource::new(simulator(), LineProtocolSerializer));
        assert_eq!(replayed, simulated);
    }

    #[test]
    fn test_generated_hypertable_file_replays_identically() {
        let mut out = Vec::new();
        generate(simulator(), &HypertableSerializer, &mut out).unwrap();

        let mut file_source = HyperFileSource::new(Cursor::new(out));
        let mut sim_source = SimulationDataSource::new(simulator(), HypertableSerializer);
        assert_eq!(file_source.headers().unwrap(), sim_source.headers().unwrap());
        assert_eq!(collect(file_source), collect(sim_source));
    }
}
