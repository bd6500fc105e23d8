//! Building blocks shared by the targets

pub mod gzip;
pub mod http;
pub mod hypertable;
pub mod input;
pub mod line_protocol;
pub mod serialize;
pub mod setup;
pub mod sim_source;
pub mod simulator;

pub use hypertable::{HyperBatch, HyperFileSource, HyperPoint, HyperRow};
pub use input::open_input;
pub use line_protocol::{LineBatch, LineFileSource, LinePoint};
pub use serialize::{HypertableSerializer, LineProtocolSerializer, PointSerializer};
pub use sim_source::{generate, SimulationDataSource};
pub use simulator::{simulator_for, CpuOnlySimulator, SimPoint, Simulator};
