//! The processor contract (spec §4.B).

use crate::error::{ErrorContext, KoLogError};
use crate::record::EventData;

/// The control outcome a processor (or renderer, see [`crate::renderer`])
/// returns alongside its transformed data. Kept distinct from
/// [`KoLogError`] — a drop is a normal, silent outcome, never an error
/// (spec §7 "Drop semantics").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue the pipeline; the (possibly mutated) event data is passed on.
    Continue,
    /// Halt the pipeline for this handler only. Not an error.
    Drop,
}

/// `process(event_data) -> event_data | drop`, total on well-formed input.
///
/// A processor may mutate `data` in place and return [`Flow::Continue`], or
/// leave it untouched and still return [`Flow::Continue`] — the pipeline
/// doesn't care which, since `data` is always the authoritative value after
/// the call either way. Unexpected failures are reported as
/// [`KoLogError::Processor`], which isolates to the owning handler.
pub trait Processor: Send + Sync {
    fn process(&self, data: &mut EventData) -> Result<Flow, KoLogError>;
}

/// Wrap any processor error with the handler identity that observed it, as
/// required by the per-handler error isolation in spec §4.E/§9.
pub(crate) fn tag_processor_error(err: KoLogError, handler_id: crate::handler::HandlerId) -> KoLogError {
    match err {
        KoLogError::Processor { message, context } => KoLogError::Processor {
            message,
            context: context_with_handler(context, handler_id),
        },
        other => other,
    }
}

fn context_with_handler(context: ErrorContext, handler_id: crate::handler::HandlerId) -> ErrorContext {
    context.with("handler_id", handler_id.to_string())
}


#[cfg(test)]
mod tests {
    use super::test_support::DropLevelProcessor;
    use super::*;
    use crate::levels::Level;
    use serde_json::Value;

    #[test]
    fn drop_level_processor_drops_matching_level() {
        let processor = DropLevelProcessor { level_to_drop: Level::Debug };
        let mut data = EventData::default();
        data.insert("level".to_string(), Value::String("DEBUG".to_string()));
        assert_eq!(processor.process(&mut data).unwrap(), Flow::Drop);

        data.insert("level".to_string(), Value::String("INFO".to_string()));
        assert_eq!(processor.process(&mut data).unwrap(), Flow::Continue);
    }
}
