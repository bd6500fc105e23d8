//! Opening replay input

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tsbench_config::FileSourceConfig;
use tsbench_interfaces::{LoadError, LoadResult};

/// Read buffer size for replayed files
const READ_BUFFER_SIZE: usize = 4 << 20;

/// Buffered reader over the configured file, or stdin for `-`
pub fn open_input(config: &FileSourceConfig) -> LoadResult<Box<dyn BufRead + Send>> {
    if config.is_stdin() {
        return Ok(Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, io::stdin())));
    }

    let file = File::open(&config.location).map_err(|e| {
        LoadError::Io(io::Error::new(
            e.kind(),
            format!("cannot open '{}': {}", config.location, e),
        ))
    })?;
    Ok(Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file)))
}

/// Read one line without its terminator; `None` at end of input
pub(crate) fn read_line<R: BufRead + ?Sized>(reader: &mut R, buf: &mut String) -> LoadResult<Option<()>> {
    buf.clear();
    let read = reader.read_line(buf).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData => LoadError::parse(format!("input is not valid UTF-8: {}", e)),
        _ => LoadError::Io(e),
    })?;
    if read == 0 {
        return Ok(None);
    }
    let trimmed = buf.trim_end_matches(['\n', '\r']).len();
    buf.truncate(trimmed);
    Ok(Some(()))
}
