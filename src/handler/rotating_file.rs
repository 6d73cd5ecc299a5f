//! The rotating file handler (spec §4.E "Rotating file handler"): extends
//! the file handler with size- and time-triggered rotation.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::KoLogError;
use crate::handler::file::open_destination;
use crate::handler::{closed_error, io_error, Handler, HandlerCore, HandlerId, OpenMode, PipelineOutcome};
use crate::processor::Processor;
use crate::record::Record;
use crate::renderer::Renderer;
use crate::sink::Sink;

enum DestState {
    Unopened,
    Open(File),
    Closed,
}

struct RotationGuts {
    dest: DestState,
    current_size: u64,
    last_rotation_time: Instant,
}

pub struct RotatingFileHandler {
    core: HandlerCore,
    path: PathBuf,
    mode: OpenMode,
    override_existing: bool,
    /// 0 disables the size trigger.
    max_bytes: u64,
    backup_count: usize,
    /// `None` disables the time trigger.
    rotation_interval: Option<Duration>,
    state: Mutex<RotationGuts>,
}

impl RotatingFileHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        processors: Vec<Box<dyn Processor>>,
        renderer: Box<dyn Renderer>,
        path: impl AsRef<Path>,
        mode: OpenMode,
        override_existing: bool,
        max_bytes: u64,
        backup_count: usize,
        rotation_interval: Option<Duration>,
    ) -> Self {
        RotatingFileHandler {
            core: HandlerCore::new(processors, renderer, true),
            path: path.as_ref().to_path_buf(),
            mode,
            override_existing,
            max_bytes,
            backup_count,
            rotation_interval,
            state: Mutex::new(RotationGuts {
                dest: DestState::Unopened,
                current_size: 0,
                last_rotation_time: Instant::now(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `filename.k`, per spec §6's rotation layout (`P`, `P.1` newest
    /// through `P.N` oldest).
    fn backup_path(&self, k: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{k}"));
        PathBuf::from(name)
    }

    fn open_fresh(&self) -> Result<File, KoLogError> {
        open_destination(&self.path, self.mode, self.override_existing, self.core.id())
    }

    fn needs_rotation(&self, guts: &RotationGuts, upcoming_len: u64) -> bool {
        let size_trigger = self.max_bytes > 0 && guts.current_size + upcoming_len > self.max_bytes;
        let time_trigger = self
            .rotation_interval
            .is_some_and(|interval| guts.last_rotation_time.elapsed() >= interval);
        size_trigger || time_trigger
    }

    /// Rotate under the handler's write lock (spec §4.E "Rotation steps"):
    /// flush and close the current handle, delete the oldest backup, shift
    /// every remaining backup up by one, move the current file to `.1`, and
    /// open a fresh file. Renames run from the highest index down so a
    /// partial failure never overwrites a file that still holds data.
    fn rotate(&self, guts: &mut RotationGuts) -> Result<(), KoLogError> {
        if let DestState::Open(file) = &mut guts.dest {
            let _ = file.flush();
        }
        guts.dest = DestState::Closed;

        let rotate_err = |e: std::io::Error, what: &str| {
            io_error(self.core.id(), format!("rotation failed while {what}: {e}"), true)
        };

        if self.backup_count > 0 {
            let oldest = self.backup_path(self.backup_count);
            if oldest.exists() {
                fs::remove_file(&oldest).map_err(|e| rotate_err(e, "deleting oldest backup"))?;
            }
            for k in (1..self.backup_count).rev() {
                let src = self.backup_path(k);
                if src.exists() {
                    let dst = self.backup_path(k + 1);
                    fs::rename(&src, &dst).map_err(|e| rotate_err(e, "shifting backups"))?;
                }
            }
            if self.path.exists() {
                fs::rename(&self.path, self.backup_path(1)).map_err(|e| rotate_err(e, "renaming current file"))?;
            }
        } else if self.path.exists() {
            // backup_count == 0: rotation truncates in place, no backup kept.
            fs::remove_file(&self.path).map_err(|e| rotate_err(e, "truncating current file"))?;
        }

        let fresh = self.open_fresh().map_err(|e| match e {
            KoLogError::HandlerIo { message, recoverable, context } => {
                KoLogError::HandlerIo { message: format!("rotation failed while reopening: {message}"), recoverable, context }
            }
            other => other,
        })?;
        guts.dest = DestState::Open(fresh);
        guts.current_size = 0;
        guts.last_rotation_time = Instant::now();
        Ok(())
    }

    /// Reopen the original filename in append mode after a failed rotation
    /// (spec §4.E: "restore original handle by reopening `filename` in
    /// append mode").
    fn restore_after_failed_rotation(&self, guts: &mut RotationGuts) {
        match open_destination(&self.path, OpenMode::Append, true, self.core.id()) {
            Ok(file) => {
                let size = file.metadata().map(|m| m.len()).unwrap_or(0);
                guts.dest = DestState::Open(file);
                guts.current_size = size;
            }
            Err(_) => {
                guts.dest = DestState::Closed;
            }
        }
    }

    fn write_to_open(&self, guts: &mut RotationGuts, payload: &str) -> Result<(), KoLogError> {
        match &mut guts.dest {
            DestState::Open(file) => {
                file.write_all(payload.as_bytes())
                    .map_err(|e| io_error(self.core.id(), format!("write failed: {e}"), true))?;
                guts.current_size += payload.len() as u64;
                Ok(())
            }
            DestState::Closed => Err(closed_error(self.core.id())),
            DestState::Unopened => unreachable!("caller must open before writing"),
        }
    }

    fn write_payload(&self, payload: &str) -> Result<(), KoLogError> {
        let mut guts = self.state.lock();

        if matches!(guts.dest, DestState::Closed) {
            return Err(closed_error(self.core.id()));
        }
        if matches!(guts.dest, DestState::Unopened) {
            let file = self.open_fresh()?;
            let size = file.metadata().map(|m| m.len()).unwrap_or(0);
            guts.dest = DestState::Open(file);
            guts.current_size = size;
            guts.last_rotation_time = Instant::now();
        }

        if self.needs_rotation(&guts, payload.len() as u64) {
            if let Err(rotate_err) = self.rotate(&mut guts) {
                self.restore_after_failed_rotation(&mut guts);
                let _ = self.write_to_open(&mut guts, payload);
                return Err(rotate_err);
            }
        }

        self.write_to_open(&mut guts, payload)
    }
}

impl Handler for RotatingFileHandler {
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
        let mut guts = self.state.lock();
        if let DestState::Open(file) = &mut guts.dest {
            file.flush()
                .map_err(|e| io_error(self.core.id(), format!("flush failed: {e}"), true))?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), KoLogError> {
        let mut guts = self.state.lock();
        if let DestState::Open(file) = &mut guts.dest {
            let _ = file.flush();
        }
        guts.dest = DestState::Closed;
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
