use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, SimError};
use crate::system::TraceRecord;

/// JSON-lines bus trace, one object per handshake
pub struct TraceWriter {
  writer: BufWriter<File>,
  records: u64,
}

impl TraceWriter {
  pub fn create(path: &Path) -> Result<Self> {
    let file = File::create(path).map_err(|e| SimError::io(path, e))?;
    log::info!("tracing bus handshakes to {}", path.display());
    Ok(Self {
      writer: BufWriter::new(file),
      records: 0,
    })
  }

  pub fn write_all(&mut self, records: &[TraceRecord]) -> Result<()> {
    for rec in records {
      let line = serde_json::to_string(rec)?;
      writeln!(self.writer, "{}", line)?;
      self.records += 1;
    }
    Ok(())
  }

  pub fn records(&self) -> u64 {
    self.records
  }

  pub fn flush(&mut self) -> Result<()> {
    self.writer.flush()?;
    Ok(())
  }
}
