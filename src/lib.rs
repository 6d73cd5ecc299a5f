//! # Ko-Log - structured, async-first logging core
//!
//! Ko-Log is the dispatch and handler subsystem for a structured logging
//! library: applications emit events through hierarchical named loggers;
//! events flow through a per-logger processor pipeline, are packaged as
//! immutable [`Record`]s, and are dispatched via a bounded queue to one or
//! more [`Handler`]s that render and write to destinations.
//!
//! ## Architecture
//!
//! - `record`: the immutable event envelope dispatched through the queue.
//! - `processor`: pure event-data transforms with drop signaling.
//! - `renderer`: event data to payload conversion, plus two reference
//!   renderers.
//! - `sink`: append-only test capture buffers.
//! - `handler`: destination ownership (null, stream, file, rotating file),
//!   the pipeline shared by all of them, and the sync/async lifecycle.
//! - `queue`: the bounded-queue manager, backpressure policies, the
//!   cooperative background worker, and the shutdown protocol.
//! - `error`: the structured error taxonomy shared across every layer.
//!
//! ## What this crate does not do
//!
//! Configuration deserialization, logger-factory wiring, context binding on
//! loggers, and the content of built-in processors/renderers beyond their
//! contracts are external collaborators' responsibility — this crate
//! consumes already-built [`Handler`], [`processor::Processor`], and
//! [`Renderer`] values through [`queue::QueueManager::register`].

pub mod error;
pub mod handler;
pub mod levels;
pub mod processor;
pub mod queue;
pub mod record;
pub mod renderer;
pub mod sink;

#[cfg(test)]
mod tests;

pub use error::{DispatchReason, ErrorContext, HandlerOutcome, KoLogError};
pub use handler::{
    FileHandler, Handler, HandlerId, NullHandler, OpenMode, PipelineOutcome, RotatingFileHandler, StreamHandler,
};
pub use levels::Level;
pub use processor::{Flow, Processor};
pub use queue::{BackpressurePolicy, DropReason, QueueConfig, QueueManager};
pub use record::{EventData, Record};
pub use renderer::{JsonRenderer, LineRenderer, RenderOutcome, Renderer};
pub use sink::Sink;
