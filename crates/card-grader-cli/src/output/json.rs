//! JSON output adapter.

use anyhow::Result;
use card_grader_core::{GradedCard, ReportOutput};
use std::io::{self, Write};
use std::mem;
use std::sync::Mutex;

/// JSON output adapter.
///
/// Writes one JSON object per line, or, in array mode, buffers every card
/// and writes a single JSON array on `flush`.
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
    batch: Option<Mutex<Vec<GradedCard>>>,
    pretty: bool,
}

impl JsonOutput {
    /// Creates a new JSON Lines output writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Creates a new JSON Lines output writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            batch: None,
            pretty: false,
        }
    }

    /// Creates an output that writes all cards as one JSON array on flush.
    #[must_use]
    pub fn array(writer: Box<dyn Write + Send>, pretty: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            batch: Some(Mutex::new(Vec::new())),
            pretty,
        }
    }

    #[allow(clippy::significant_drop_tightening)]
    fn write_line(&self, json: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writeln!(writer, "{json}")?;
        Ok(())
    }
}

impl ReportOutput for JsonOutput {
    fn write(&self, card: &GradedCard) -> Result<()> {
        if let Some(batch) = &self.batch {
            batch
                .lock()
                .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?
                .push(card.clone());
            return Ok(());
        }
        self.write_line(&serde_json::to_string(card)?)
    }

    #[allow(clippy::significant_drop_tightening)]
    fn flush(&self) -> Result<()> {
        if let Some(batch) = &self.batch {
            let cards = mem::take(
                &mut *batch
                    .lock()
                    .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?,
            );
            let json = if self.pretty {
                serde_json::to_string_pretty(&cards)?
            } else {
                serde_json::to_string(&cards)?
            };
            self.write_line(&json)?;
        }
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writer.flush()?;
        Ok(())
    }
}
