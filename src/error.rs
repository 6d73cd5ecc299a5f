//! Structured error taxonomy for the dispatch and handler subsystem.
//!
//! Every error carries a structured code of the form
//! `LAYER::Component::CATEGORY::SEVERITY[::RECOVERABLE]` (see module docs on
//! [`KoLogError::code`]) plus an [`ErrorContext`] map, so a caller or the
//! fallback error channel can render something actionable without parsing a
//! free-text message.

use std::fmt;

use ahash::AHashMap;

use crate::handler::HandlerId;

/// Free-form key/value context attached to an error.
///
/// Kept as an ordinary map rather than a `Vec` of pairs: callers look values
/// up by key far more often than they iterate in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    entries: AHashMap<String, String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return Ok(());
        }
        let mut pairs: Vec<_> = self.entries.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        write!(f, " (")?;
        for (i, (k, v)) in pairs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, ")")
    }
}

/// The outcome of dispatching (or closing) a single handler, as recorded
/// inside a composite [`KoLogError::Dispatch`] or [`KoLogError::Shutdown`].
#[derive(Debug)]
pub struct HandlerOutcome {
    pub handler_id: HandlerId,
    pub result: Result<(), KoLogError>,
}

/// Why a [`KoLogError::Dispatch`] was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchReason {
    /// No routing entry (and no `root` fallback) for the logger name.
    NoHandlers,
    /// `enqueue` was called after `shutdown` began.
    QueueClosed,
    /// One or more handlers failed during `push_sync`.
    HandlerFailures,
}

impl DispatchReason {
    fn category(self) -> &'static str {
        match self {
            DispatchReason::NoHandlers => "NO_ROUTE",
            DispatchReason::QueueClosed => "CLOSED",
            DispatchReason::HandlerFailures => "HANDLER_FAILURES",
        }
    }
}

/// The complete error taxonomy, per spec §7.
#[derive(Debug)]
pub enum KoLogError {
    /// Invalid or unknown logger/handler/processor reference at registration
    /// or factory time. Not recoverable by the core.
    Configuration { message: String, context: ErrorContext },
    /// Assembly of a logger failed, composing a processor or handler error
    /// as its cause.
    LoggerCreation {
        message: String,
        source: Box<KoLogError>,
        context: ErrorContext,
    },
    /// A destination operation (open, write, rename, flush, close) failed.
    HandlerIo {
        message: String,
        recoverable: bool,
        context: ErrorContext,
    },
    /// A processor raised unexpectedly — distinct from a drop signal.
    Processor { message: String, context: ErrorContext },
    /// A renderer raised unexpectedly — distinct from a drop signal.
    Renderer { message: String, context: ErrorContext },
    /// The queue manager could not route a record, composing per-handler
    /// outcomes when the failure happened on the sync path.
    Dispatch {
        reason: DispatchReason,
        outcomes: Vec<HandlerOutcome>,
        context: ErrorContext,
    },
    /// One or more handlers failed to close cleanly during shutdown.
    Shutdown {
        outcomes: Vec<HandlerOutcome>,
        context: ErrorContext,
    },
}

impl KoLogError {
    /// The structured `LAYER::Component::CATEGORY::SEVERITY[::RECOVERABLE]`
    /// code for this error, as mandated by spec §7.
    pub fn code(&self) -> String {
        match self {
            KoLogError::Configuration { .. } => {
                "CONFIG::Registration::INVALID_REFERENCE::ERROR".to_string()
            }
            KoLogError::LoggerCreation { .. } => {
                "CONFIG::LoggerFactory::ASSEMBLY_FAILED::ERROR".to_string()
            }
            KoLogError::HandlerIo { recoverable, .. } => format!(
                "HANDLER::Destination::IO::ERROR::{}",
                if *recoverable { "RECOVERABLE" } else { "FATAL" }
            ),
            KoLogError::Processor { .. } => "HANDLER::Processor::UNEXPECTED::ERROR".to_string(),
            KoLogError::Renderer { .. } => "HANDLER::Renderer::UNEXPECTED::ERROR".to_string(),
            KoLogError::Dispatch { reason, .. } => {
                format!("DISPATCH::QueueManager::{}::ERROR", reason.category())
            }
            KoLogError::Shutdown { .. } => "DISPATCH::QueueManager::SHUTDOWN::ERROR".to_string(),
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            KoLogError::Configuration { context, .. }
            | KoLogError::LoggerCreation { context, .. }
            | KoLogError::HandlerIo { context, .. }
            | KoLogError::Processor { context, .. }
            | KoLogError::Renderer { context, .. }
            | KoLogError::Dispatch { context, .. }
            | KoLogError::Shutdown { context, .. } => context,
        }
    }

    /// Whether the handler-level write that produced this error could
    /// plausibly succeed if retried. Only meaningful for `HandlerIo`.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KoLogError::HandlerIo { recoverable: true, .. })
    }
}

impl fmt::Display for KoLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KoLogError::Configuration { message, context } => {
                write!(f, "configuration error: {message}{context}")
            }
            KoLogError::LoggerCreation { message, source, context } => {
                write!(f, "logger creation failed: {message}{context} (caused by: {source})")
            }
            KoLogError::HandlerIo { message, context, .. } => {
                write!(f, "handler I/O error: {message}{context}")
            }
            KoLogError::Processor { message, context } => {
                write!(f, "processor error: {message}{context}")
            }
            KoLogError::Renderer { message, context } => {
                write!(f, "renderer error: {message}{context}")
            }
            KoLogError::Dispatch { reason, outcomes, context } => {
                write!(f, "dispatch error ({:?}){context}: ", reason)?;
                for (i, outcome) in outcomes.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    match &outcome.result {
                        Ok(()) => write!(f, "handler#{} ok", outcome.handler_id)?,
                        Err(e) => write!(f, "handler#{} failed: {e}", outcome.handler_id)?,
                    }
                }
                Ok(())
            }
            KoLogError::Shutdown { outcomes, context } => {
                write!(f, "shutdown error{context}: ")?;
                for (i, outcome) in outcomes.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    match &outcome.result {
                        Ok(()) => write!(f, "handler#{} closed", outcome.handler_id)?,
                        Err(e) => write!(f, "handler#{} close failed: {e}", outcome.handler_id)?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for KoLogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KoLogError::LoggerCreation { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Convenience `Result` alias for core operations.
pub type Result<T> = std::result::Result<T, KoLogError>;
