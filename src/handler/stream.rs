//! The stream handler (spec §4.E "Stream handler"): writes to stdout or
//! stderr.

use std::io::{self, Write};

use parking_lot::Mutex;

use crate::error::KoLogError;
use crate::handler::{io_error, Handler, HandlerCore, HandlerId, PipelineOutcome};
use crate::processor::Processor;
use crate::record::Record;
use crate::renderer::Renderer;
use crate::sink::Sink;

/// Writes either to standard output or standard error, chosen once at
/// construction. Async writes reuse the same blocking write as the sync
/// path: the platform has no true non-blocking console I/O to fall back to,
/// and spec §4.E explicitly permits this ("tests must not depend on
/// non-blocking behavior of the stream").
pub struct StreamHandler {
    core: HandlerCore,
    use_stderr: bool,
    destination_lock: Mutex<()>,
}

impl StreamHandler {
    pub fn new(processors: Vec<Box<dyn Processor>>, renderer: Box<dyn Renderer>, use_stderr: bool) -> Self {
        StreamHandler {
            core: HandlerCore::new(processors, renderer, true),
            use_stderr,
            destination_lock: Mutex::new(()),
        }
    }

    fn write_payload(&self, payload: &str) -> Result<(), KoLogError> {
        let _guard = self.destination_lock.lock();
        let result: io::Result<()> = if self.use_stderr {
            let mut stderr = io::stderr().lock();
            stderr.write_all(payload.as_bytes())
        } else {
            let mut stdout = io::stdout().lock();
            stdout.write_all(payload.as_bytes())
        };
        result.map_err(|e| io_error(self.core.id(), format!("stream write failed: {e}"), true))
    }
}

impl Handler for StreamHandler {
    fn id(&self) -> HandlerId {
        self.core.id()
    }

    fn emit_sync(&self, record: &Record) -> Result<PipelineOutcome, KoLogError> {
        self.core
            .with_sync_lock(|| self.core.run_pipeline(record, |payload| self.write_payload(payload)))
    }

    fn emit_async(&self, record: &Record) -> Result<PipelineOutcome, KoLogError> {
        self.core
            .with_async_lock(|| self.core.run_pipeline(record, |payload| self.write_payload(payload)))
    }

    fn flush(&self) -> Result<(), KoLogError> {
        let _guard = self.destination_lock.lock();
        let result = if self.use_stderr {
            io::stderr().flush()
        } else {
            io::stdout().flush()
        };
        result.map_err(|e| io_error(self.core.id(), format!("stream flush failed: {e}"), true))
    }

    fn close(&self) -> Result<(), KoLogError> {
        // Standard streams are process-owned; there is nothing to release.
        Ok(())
    }

    fn attach_sink(&self, sink: Sink) {
        self.core.attach_sink(sink);
    }

    fn detach_sink(&self) {
        self.core.detach_sink();
    }

    fn drop_count(&self) -> u64 {
        self.core.drop_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Level;
    use crate::record::EventData;
    use crate::renderer::LineRenderer;
    use serde_json::Value;

    #[test]
    fn emit_sync_and_flush_succeed() {
        let handler = StreamHandler::new(vec![], Box::new(LineRenderer), true);
        let mut data = EventData::default();
        data.insert("event".to_string(), Value::String("hello".to_string()));
        let record = Record::new("app", Level::Info, data);
        assert_eq!(handler.emit_sync(&record).unwrap(), PipelineOutcome::Written);
        handler.flush().unwrap();
    }
}
