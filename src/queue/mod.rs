//! The Queue Manager (spec §4.F): routes records to handlers, enforces
//! backpressure, drives the background worker, and exposes the sync/async
//! dispatch entry points and the shutdown protocol.

mod bounded;

pub use bounded::BackpressurePolicy;
use bounded::PushOutcome;

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ahash::AHashMap;
use arc_swap::ArcSwap;
use parking_lot::{Condvar, Mutex};

use crate::error::{DispatchReason, ErrorContext, HandlerOutcome, KoLogError};
use crate::handler::Handler;
use crate::record::Record;
use crate::sink::Sink;

const ROOT_LOGGER: &str = "root";

/// Why a record (or enqueue attempt) was dropped rather than delivered,
/// keyed alongside the logger name in the drop counters (spec §8 property 1:
/// "a drop counter for `(r.logger_name, policy_reason)` is incremented").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// The bounded queue was full under `drop` or `drop_oldest`.
    QueueFull,
    /// Neither an exact routing entry nor a `root` fallback existed.
    NoRoute,
}

/// Queue Manager configuration (spec §4.F "Configuration"), the shape a
/// factory (out of scope here, per spec §1) would populate from validated
/// configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_queue_size: usize,
    pub backpressure_policy: BackpressurePolicy,
    pub drain_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_queue_size: 1024,
            backpressure_policy: BackpressurePolicy::Block,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerStatus {
    Stopped,
    Running,
    Draining,
}

type RoutingTable = AHashMap<String, Vec<Arc<dyn Handler>>>;

struct Shared {
    queue: bounded::BoundedQueue<Record>,
    routing: ArcSwap<RoutingTable>,
    /// Serializes `register`/`add_sink`/`remove_sink` against each other
    /// (spec §5: routing-table writes "use a brief mutual-exclusion
    /// window"). Readers never take this lock; they snapshot via
    /// `routing.load()`.
    registration_lock: Mutex<()>,
    sinks: Mutex<AHashMap<String, Sink>>,
    drop_counts: Mutex<AHashMap<(String, DropReason), u64>>,
    config: QueueConfig,
    worker_status: Mutex<WorkerStatus>,
    worker_status_cv: Condvar,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    fallback: Mutex<Box<dyn Write + Send>>,
}

/// Routes records from loggers to handlers over the sync and async dispatch
/// paths (spec §4.F). Cheap to clone: every clone shares the same queue,
/// routing table, and worker.
#[derive(Clone)]
pub struct QueueManager {
    shared: Arc<Shared>,
}

impl QueueManager {
    pub fn new(config: QueueConfig) -> Self {
        let queue = bounded::BoundedQueue::new(config.max_queue_size, config.backpressure_policy);
        QueueManager {
            shared: Arc::new(Shared {
                queue,
                routing: ArcSwap::from_pointee(AHashMap::default()),
                registration_lock: Mutex::new(()),
                sinks: Mutex::new(AHashMap::default()),
                drop_counts: Mutex::new(AHashMap::default()),
                config,
                worker_status: Mutex::new(WorkerStatus::Stopped),
                worker_status_cv: Condvar::new(),
                worker_handle: Mutex::new(None),
                fallback: Mutex::new(Box::new(io::stderr())),
            }),
        }
    }

    /// Swap the fallback error writer (spec §7 "a dedicated stream (standard
    /// error)"). Exposed so tests can capture `[ko-log:error]` lines instead
    /// of polluting the test process's real stderr.
    pub fn set_fallback_writer(&self, writer: Box<dyn Write + Send>) {
        *self.shared.fallback.lock() = writer;
    }

    /// Install or replace the routing entry for `logger_name`. Takes effect
    /// immediately for new enqueues (spec §4.F `register`). If a sink is
    /// already registered for this name, it is attached to the incoming
    /// handlers so registration and sink attachment stay consistent.
    pub fn register(&self, logger_name: impl Into<String>, handlers: Vec<Arc<dyn Handler>>) {
        let logger_name = logger_name.into();
        if let Some(sink) = self.shared.sinks.lock().get(&logger_name) {
            for handler in &handlers {
                handler.attach_sink(sink.clone());
            }
        }

        let _guard = self.shared.registration_lock.lock();
        let mut next = (**self.shared.routing.load()).clone();
        next.insert(logger_name, handlers);
        self.shared.routing.store(Arc::new(next));
    }

    /// Attach `sink` to every handler currently routed under `logger_name`
    /// (spec §4.F `add_sink`). Idempotent: attaching twice just overwrites
    /// the stored sink and re-attaches the same handlers.
    pub fn add_sink(&self, logger_name: impl Into<String>, sink: Sink) {
        let logger_name = logger_name.into();
        if let Some(handlers) = self.shared.routing.load().get(&logger_name) {
            for handler in handlers {
                handler.attach_sink(sink.clone());
            }
        }
        self.shared.sinks.lock().insert(logger_name, sink);
    }

    /// Detach whatever sink is registered for `logger_name`, restoring the
    /// pre-attachment state of its handlers (spec §4.F `remove_sink`).
    pub fn remove_sink(&self, logger_name: &str) {
        if self.shared.sinks.lock().remove(logger_name).is_some() {
            if let Some(handlers) = self.shared.routing.load().get(logger_name) {
                for handler in handlers {
                    handler.detach_sink();
                }
            }
        }
    }

    fn resolve_handlers(&self, logger_name: &str) -> Option<Vec<Arc<dyn Handler>>> {
        let table = self.shared.routing.load();
        if let Some(handlers) = table.get(logger_name) {
            return Some(handlers.clone());
        }
        if logger_name != ROOT_LOGGER {
            if let Some(handlers) = table.get(ROOT_LOGGER) {
                return Some(handlers.clone());
            }
        }
        None
    }

    fn increment_drop(&self, logger_name: &str, reason: DropReason) {
        *self
            .shared
            .drop_counts
            .lock()
            .entry((logger_name.to_string(), reason))
            .or_insert(0) += 1;
    }

    /// Current value of the `(logger_name, reason)` drop counter, for tests
    /// exercising the boundary behaviors in spec §8.
    pub fn drop_count(&self, logger_name: &str, reason: DropReason) -> u64 {
        *self
            .shared
            .drop_counts
            .lock()
            .get(&(logger_name.to_string(), reason))
            .unwrap_or(&0)
    }

    /// Run the sync path: resolve handlers, call `emit_sync` on each,
    /// collect outcomes (spec §4.F `push_sync`). Returns only after every
    /// handler has finished or failed.
    pub fn push_sync(&self, record: &Record) -> Result<(), KoLogError> {
        let handlers = self.resolve_handlers(record.logger_name());
        let handlers = match handlers {
            Some(h) if !h.is_empty() => h,
            _ => {
                return Err(KoLogError::Dispatch {
                    reason: DispatchReason::NoHandlers,
                    outcomes: Vec::new(),
                    context: ErrorContext::new().with("logger_name", record.logger_name()),
                });
            }
        };

        let outcomes: Vec<HandlerOutcome> = handlers
            .iter()
            .map(|handler| HandlerOutcome {
                handler_id: handler.id(),
                result: handler.emit_sync(record).map(|_| ()),
            })
            .collect();

        if outcomes.iter().any(|o| o.result.is_err()) {
            Err(KoLogError::Dispatch {
                reason: DispatchReason::HandlerFailures,
                outcomes,
                context: ErrorContext::new().with("logger_name", record.logger_name()),
            })
        } else {
            Ok(())
        }
    }

    /// Run the async path: apply the configured backpressure policy and
    /// return once the record is queued or dropped (spec §4.F `enqueue`).
    pub fn enqueue(&self, record: Record) -> Result<(), KoLogError> {
        let logger_name = record.logger_name().to_string();
        match self.shared.queue.push(record) {
            PushOutcome::Pushed => Ok(()),
            PushOutcome::DroppedNew | PushOutcome::DroppedOldest => {
                self.increment_drop(&logger_name, DropReason::QueueFull);
                Ok(())
            }
            PushOutcome::Closed => Err(KoLogError::Dispatch {
                reason: DispatchReason::QueueClosed,
                outcomes: Vec::new(),
                context: ErrorContext::new().with("logger_name", logger_name),
            }),
        }
    }

    /// Launch the background worker. Idempotent; only the first call has
    /// effect (spec §4.F `start`).
    pub fn start(&self) {
        let mut status = self.shared.worker_status.lock();
        if *status != WorkerStatus::Stopped {
            return;
        }
        *status = WorkerStatus::Running;
        drop(status);

        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || worker_loop(&shared));
        *self.shared.worker_handle.lock() = Some(handle);
    }

    /// Transition to draining, stop accepting new enqueues, wait up to
    /// `drain_timeout` for the worker to empty the queue, then close every
    /// registered handler (spec §4.F `shutdown`).
    pub fn shutdown(&self) -> Result<(), KoLogError> {
        {
            let mut status = self.shared.worker_status.lock();
            if *status == WorkerStatus::Running {
                *status = WorkerStatus::Draining;
            }
        }
        self.shared.queue.close();

        {
            let mut status = self.shared.worker_status.lock();
            if *status != WorkerStatus::Stopped {
                let _ = self
                    .shared
                    .worker_status_cv
                    .wait_for(&mut status, self.shared.config.drain_timeout);
            }
        }

        // Only join if the worker actually finished inside the drain window;
        // otherwise block()ing here would defeat the deadline we just waited
        // out. A still-running worker is left to drain the rest of the
        // (already-closed) queue on its own and exit on its own time.
        if *self.shared.worker_status.lock() == WorkerStatus::Stopped {
            if let Some(handle) = self.shared.worker_handle.lock().take() {
                let _ = handle.join();
            }
        }
        *self.shared.worker_status.lock() = WorkerStatus::Stopped;

        let mut seen = HashSet::new();
        let mut outcomes = Vec::new();
        for handlers in self.shared.routing.load().values() {
            for handler in handlers {
                if seen.insert(handler.id()) {
                    outcomes.push(HandlerOutcome { handler_id: handler.id(), result: handler.close() });
                }
            }
        }

        if outcomes.iter().any(|o| o.result.is_err()) {
            Err(KoLogError::Shutdown { outcomes, context: ErrorContext::new() })
        } else {
            Ok(())
        }
    }

    fn write_fallback(&self, err: &KoLogError) {
        let line = format!("[ko-log:error] {}: {err}\n", err.code());
        let _ = self.shared.fallback.lock().write_all(line.as_bytes());
    }
}

/// One instance per call to [`QueueManager::start`]. Drains records,
/// resolving handlers per record and calling `emit_async` on each; handler
/// failures go to the fallback channel and never stop the loop (spec §4.F
/// "Worker loop").
fn worker_loop(shared: &Arc<Shared>) {
    let manager = QueueManager { shared: Arc::clone(shared) };
    loop {
        let record = match shared.queue.pop() {
            Some(record) => record,
            None => break,
        };

        match manager.resolve_handlers(record.logger_name()) {
            None => {
                tracing::warn!(logger = record.logger_name(), "no route for record; dropping");
                manager.increment_drop(record.logger_name(), DropReason::NoRoute);
            }
            Some(handlers) => {
                for handler in &handlers {
                    if let Err(e) = handler.emit_async(&record) {
                        tracing::error!(code = %e.code(), "handler emit_async failed: {e}");
                        manager.write_fallback(&e);
                    }
                }
            }
        }
    }

    let mut status = shared.worker_status.lock();
    *status = WorkerStatus::Stopped;
    shared.worker_status_cv.notify_all();
}
