//! The null handler (spec §4.E "Null handler"): runs the full pipeline so
//! processors and sinks still observe every event, but writes nowhere.

use crate::error::KoLogError;
use crate::handler::{Handler, HandlerCore, HandlerId, PipelineOutcome};
use crate::processor::Processor;
use crate::record::Record;
use crate::renderer::Renderer;
use crate::sink::Sink;

pub struct NullHandler {
    core: HandlerCore,
}

impl NullHandler {
    pub fn new(processors: Vec<Box<dyn Processor>>, renderer: Box<dyn Renderer>) -> Self {
        NullHandler {
            core: HandlerCore::new(processors, renderer, true),
        }
    }
}

impl Handler for NullHandler {
    fn id(&self) -> HandlerId {
        self.core.id()
    }

    fn emit_sync(&self, record: &Record) -> Result<PipelineOutcome, KoLogError> {
        self.core.with_sync_lock(|| self.core.run_pipeline(record, |_payload| Ok(())))
    }

    fn emit_async(&self, record: &Record) -> Result<PipelineOutcome, KoLogError> {
        self.core.with_async_lock(|| self.core.run_pipeline(record, |_payload| Ok(())))
    }

    fn flush(&self) -> Result<(), KoLogError> {
        Ok(())
    }

    fn close(&self) -> Result<(), KoLogError> {
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
    fn null_handler_runs_pipeline_but_writes_nothing_observable_except_sink() {
        let handler = NullHandler::new(vec![], Box::new(LineRenderer));
        let sink = Sink::new();
        handler.attach_sink(sink.clone());

        let mut data = EventData::default();
        data.insert("event".to_string(), Value::String("hello".to_string()));
        let record = Record::new("app", Level::Info, data);

        let outcome = handler.emit_sync(&record).unwrap();
        assert_eq!(outcome, PipelineOutcome::Written);
        assert_eq!(sink.events(), vec!["hello\n".to_string()]);
    }

    #[test]
    fn close_is_idempotent() {
        let handler = NullHandler::new(vec![], Box::new(LineRenderer));
        handler.close().unwrap();
        handler.close().unwrap();
    }
}
