//! The file handler (spec §4.E "File handler"): lazy-open, single
//! destination file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::KoLogError;
use crate::handler::{closed_error, io_error, Handler, HandlerCore, HandlerId, PipelineOutcome};
use crate::processor::Processor;
use crate::record::Record;
use crate::renderer::Renderer;
use crate::sink::Sink;

/// `wb`/`ab` from spec §4.E, spelled as what they actually mean rather than
/// as Python file-mode strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Truncate-open on first write (`wb`).
    Truncate,
    /// Append-open (`ab`).
    Append,
}

enum FileState {
    Unopened,
    Open(File),
    Closed,
}

pub struct FileHandler {
    core: HandlerCore,
    path: PathBuf,
    mode: OpenMode,
    override_existing: bool,
    state: Mutex<FileState>,
}

impl FileHandler {
    pub fn new(
        processors: Vec<Box<dyn Processor>>,
        renderer: Box<dyn Renderer>,
        path: impl AsRef<Path>,
        mode: OpenMode,
        override_existing: bool,
    ) -> Self {
        FileHandler {
            core: HandlerCore::new(processors, renderer, true),
            path: path.as_ref().to_path_buf(),
            mode,
            override_existing,
            state: Mutex::new(FileState::Unopened),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File, KoLogError> {
        open_destination(&self.path, self.mode, self.override_existing, self.core.id())
    }

    /// Write `payload`, opening the file lazily on the first call
    /// (spec §4.E "Lazy open" / §9 "unopened state explicitly").
    fn write_payload(&self, payload: &str) -> Result<(), KoLogError> {
        let mut guard = self.state.lock();
        match &mut *guard {
            FileState::Closed => Err(closed_error(self.core.id())),
            FileState::Open(file) => write_all(file, payload, self.core.id()),
            FileState::Unopened => {
                let mut file = self.open()?;
                write_all(&mut file, payload, self.core.id())?;
                *guard = FileState::Open(file);
                Ok(())
            }
        }
    }
}

fn write_all(file: &mut File, payload: &str, handler_id: HandlerId) -> Result<(), KoLogError> {
    file.write_all(payload.as_bytes())
        .map_err(|e| io_error(handler_id, format!("write failed: {e}"), true))
}

/// Open `path` per `mode`/`override_existing`, shared by [`FileHandler`] and
/// [`super::RotatingFileHandler`] (which extends the same open semantics
/// with rotation layered on top).
pub(crate) fn open_destination(
    path: &Path,
    mode: OpenMode,
    override_existing: bool,
    handler_id: HandlerId,
) -> Result<File, KoLogError> {
    if mode == OpenMode::Truncate && !override_existing && path.exists() {
        return Err(io_error(
            handler_id,
            format!("{} exists and override_existing=false, refusing to truncate", path.display()),
            false,
        ));
    }
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        OpenMode::Truncate => {
            options.write(true).truncate(true);
        }
        OpenMode::Append => {
            options.append(true);
        }
    }
    options
        .open(path)
        .map_err(|e| io_error(handler_id, format!("failed to open {}: {e}", path.display()), true))
}

impl Handler for FileHandler {
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
        let mut guard = self.state.lock();
        if let FileState::Open(file) = &mut *guard {
            file.flush()
                .map_err(|e| io_error(self.core.id(), format!("flush failed: {e}"), true))?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), KoLogError> {
        let mut guard = self.state.lock();
        if let FileState::Open(file) = &mut *guard {
            let _ = file.flush();
        }
        *guard = FileState::Closed;
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
    use std::fs;
    use tempfile::tempdir;

    fn record_with_event(text: &str) -> Record {
        let mut data = EventData::default();
        data.insert("event".to_string(), Value::String(text.to_string()));
        Record::new("app", Level::Info, data)
    }

    #[test]
    fn file_opens_lazily_on_first_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let handler = FileHandler::new(vec![], Box::new(LineRenderer), &path, OpenMode::Truncate, true);
        assert!(!path.exists());
        handler.emit_sync(&record_with_event("hello")).unwrap();
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn truncate_without_override_fails_when_file_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "preexisting").unwrap();
        let handler = FileHandler::new(vec![], Box::new(LineRenderer), &path, OpenMode::Truncate, false);
        let err = handler.emit_sync(&record_with_event("hello")).unwrap_err();
        assert!(matches!(err, KoLogError::HandlerIo { .. }));
    }

    #[test]
    fn append_mode_preserves_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "existing\n").unwrap();
        let handler = FileHandler::new(vec![], Box::new(LineRenderer), &path, OpenMode::Append, true);
        handler.emit_sync(&record_with_event("new")).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "existing\nnew\n");
    }

    #[test]
    fn write_after_close_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let handler = FileHandler::new(vec![], Box::new(LineRenderer), &path, OpenMode::Truncate, true);
        handler.emit_sync(&record_with_event("hello")).unwrap();
        handler.close().unwrap();
        let err = handler.emit_sync(&record_with_event("after close")).unwrap_err();
        assert!(matches!(err, KoLogError::HandlerIo { .. }));
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let handler = FileHandler::new(vec![], Box::new(LineRenderer), &path, OpenMode::Truncate, true);
        handler.emit_sync(&record_with_event("hello")).unwrap();
        handler.close().unwrap();
        handler.close().unwrap();
    }
}
