//! The handler abstraction (spec §4.E): an owner of a destination, paired
//! with its processors and renderer, reachable from both the sync and async
//! dispatch paths.

mod file;
mod null;
mod rotating_file;
mod stream;

pub use file::{FileHandler, OpenMode};
pub use null::NullHandler;
pub use rotating_file::RotatingFileHandler;
pub use stream::StreamHandler;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{ErrorContext, KoLogError};
use crate::processor::{tag_processor_error, Flow, Processor};
use crate::record::{EventData, Record};
use crate::renderer::{RenderOutcome, Renderer};
use crate::sink::Sink;

/// Opaque numeric identity for a handler instance. Used to tag composite
/// dispatch/shutdown errors with which handler produced which outcome
/// (spec §7 "context lists per-handler outcomes").
pub type HandlerId = u64;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh, process-wide-unique handler id.
pub fn next_handler_id() -> HandlerId {
    NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed)
}

/// The lifecycle states a destination-owning handler moves through
/// (spec §4.E "State machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unopened,
    Open,
    Closing,
    Closed,
}

/// Whether a pipeline run produced a write or was halted by a drop signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Written,
    Dropped,
}

/// The contract every destination variant implements (spec §6 "Handler").
pub trait Handler: Send + Sync {
    fn id(&self) -> HandlerId;
    fn emit_sync(&self, record: &Record) -> Result<PipelineOutcome, KoLogError>;
    fn emit_async(&self, record: &Record) -> Result<PipelineOutcome, KoLogError>;
    fn flush(&self) -> Result<(), KoLogError>;
    fn close(&self) -> Result<(), KoLogError>;
    fn attach_sink(&self, sink: Sink);
    fn detach_sink(&self);
    /// Number of events this handler has silently dropped via processor or
    /// renderer drop signal (not counting queue-level backpressure drops,
    /// which the queue manager tracks itself).
    fn drop_count(&self) -> u64;
}

/// Shared pipeline machinery every handler variant is built on: the ordered
/// processors, the renderer, the optional attached sink, line-oriented
/// framing, and the two locks spec §4.E requires ("one for sync emission,
/// one for async emission"). The destination-specific resource lives
/// alongside this in each variant and is guarded by its own mutex, which is
/// what ultimately decides acquisition order when a sync and an async call
/// race for the same handler (spec §4.F "Ordering guarantees").
pub(crate) struct HandlerCore {
    id: HandlerId,
    processors: Vec<Box<dyn Processor>>,
    renderer: Box<dyn Renderer>,
    sink: Mutex<Option<Sink>>,
    line_oriented: bool,
    sync_lock: Mutex<()>,
    async_lock: Mutex<()>,
    drop_count: AtomicU64,
}

impl HandlerCore {
    pub(crate) fn new(
        processors: Vec<Box<dyn Processor>>,
        renderer: Box<dyn Renderer>,
        line_oriented: bool,
    ) -> Self {
        HandlerCore {
            id: next_handler_id(),
            processors,
            renderer,
            sink: Mutex::new(None),
            line_oriented,
            sync_lock: Mutex::new(()),
            async_lock: Mutex::new(()),
            drop_count: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> HandlerId {
        self.id
    }

    pub(crate) fn attach_sink(&self, sink: Sink) {
        *self.sink.lock() = Some(sink);
    }

    pub(crate) fn detach_sink(&self) {
        *self.sink.lock() = None;
    }

    pub(crate) fn drop_count(&self) -> u64 {
        self.drop_count.load(Ordering::Relaxed)
    }

    /// Acquire the sync-path guard for the duration of `body`.
    pub(crate) fn with_sync_lock<R>(&self, body: impl FnOnce() -> R) -> R {
        let _guard = self.sync_lock.lock();
        body()
    }

    /// Acquire the async-path guard for the duration of `body`.
    pub(crate) fn with_async_lock<R>(&self, body: impl FnOnce() -> R) -> R {
        let _guard = self.async_lock.lock();
        body()
    }

    /// Run processors → renderer → framing → sink-append (spec §4.E steps
    /// 1-5), then hand the finished payload to `write`. Steps 1-5 are
    /// identical for the sync and async paths; only the final write and
    /// which lock the caller held to get here differ.
    pub(crate) fn run_pipeline(
        &self,
        record: &Record,
        write: impl FnOnce(&str) -> Result<(), KoLogError>,
    ) -> Result<PipelineOutcome, KoLogError> {
        let mut data: EventData = record.event_data_copy();

        for processor in &self.processors {
            match processor.process(&mut data).map_err(|e| tag_processor_error(e, self.id))? {
                Flow::Continue => {}
                Flow::Drop => {
                    self.drop_count.fetch_add(1, Ordering::Relaxed);
                    return Ok(PipelineOutcome::Dropped);
                }
            }
        }

        let rendered = self.renderer.render(&data).map_err(|e| tag_with_handler(e, self.id))?;
        let mut payload = match rendered {
            RenderOutcome::Payload(p) => p,
            RenderOutcome::Drop => {
                self.drop_count.fetch_add(1, Ordering::Relaxed);
                return Ok(PipelineOutcome::Dropped);
            }
        };

        if self.line_oriented && !payload.ends_with('\n') {
            payload.push('\n');
        }

        if let Some(sink) = self.sink.lock().as_ref() {
            sink.append(payload.clone());
        }

        write(&payload)?;
        Ok(PipelineOutcome::Written)
    }
}

fn tag_with_handler(err: KoLogError, handler_id: HandlerId) -> KoLogError {
    match err {
        KoLogError::Renderer { message, context } => KoLogError::Renderer {
            message,
            context: context.with("handler_id", handler_id.to_string()),
        },
        other => other,
    }
}

pub(crate) fn io_error(handler_id: HandlerId, message: impl Into<String>, recoverable: bool) -> KoLogError {
    KoLogError::HandlerIo {
        message: message.into(),
        recoverable,
        context: ErrorContext::new().with("handler_id", handler_id.to_string()),
    }
}

pub(crate) fn closed_error(handler_id: HandlerId) -> KoLogError {
    io_error(handler_id, "handler is closed", false)
}
