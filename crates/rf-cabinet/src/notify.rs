//! Notification Channel — line-delimited milestone stream to the presentation process
//!
//! One stream per process, opened before the first round and held until
//! teardown. The round thread and all three reel workers write through the
//! same lock, so lines never interleave and each is flushed before the lock
//! is released. Nothing is read back: no acknowledgement, no backpressure
//! beyond the pipe buffer.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use rf_stage::{Stage, StageEvent, StageTrace};

use crate::error::CabinetResult;
use crate::token::StopToken;

struct ChannelState {
    /// `None` once closed
    sink: Option<Box<dyn Write + Send>>,
    /// Trace of the round in progress, with its start instant
    trace: Option<(StageTrace, Instant)>,
}

/// Serialized outbound stage stream
pub struct NotificationChannel {
    state: Mutex<ChannelState>,
    /// FIFO path to remove on close
    fifo_path: Option<PathBuf>,
}

impl NotificationChannel {
    /// Wrap any writer (stdout, socket, test buffer)
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            state: Mutex::new(ChannelState {
                sink: Some(Box::new(writer)),
                trace: None,
            }),
            fifo_path: None,
        }
    }

    /// Stream to stdout
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    /// Create the FIFO at `path` and wait for the presentation process to attach
    ///
    /// Polls every `attach_poll` until a reader opens the pipe. A stop on
    /// `token` aborts the wait and removes the FIFO again.
    #[cfg(unix)]
    pub fn open_fifo(path: &Path, token: &StopToken, attach_poll: Duration) -> CabinetResult<Self> {
        fifo::create(path)?;
        log::info!("[Notify] Waiting for reader on {}", path.display());

        let file = match fifo::open_writer(path, token, attach_poll) {
            Ok(file) => file,
            Err(e) => {
                remove_fifo(path);
                return Err(e);
            }
        };

        log::info!("[Notify] Reader attached");
        Ok(Self {
            state: Mutex::new(ChannelState {
                sink: Some(Box::new(file)),
                trace: None,
            }),
            fifo_path: Some(path.to_path_buf()),
        })
    }

    /// Write one stage as one line and flush
    ///
    /// Write errors are logged and swallowed; the round keeps going.
    pub fn send(&self, stage: Stage, source: &str) {
        let line = stage.to_line();
        let mut state = self.state.lock();

        let Some(sink) = state.sink.as_mut() else {
            log::debug!("[Notify] Channel closed, dropping: {}", line);
            return;
        };

        log::info!("[Notify] Send: {}", line);
        let written = writeln!(sink, "{}", line).and_then(|_| sink.flush());
        if let Err(e) = written {
            log::error!("[Notify] Write failed ({}): {}", line, e);
        }

        if let Some((trace, started)) = state.trace.as_mut() {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            trace.push(StageEvent::new(stage, elapsed_ms).with_source(source));
        }
    }

    /// Start recording a trace for `round`
    pub fn begin_trace(&self, round: u64) {
        self.state.lock().trace = Some((StageTrace::new(round), Instant::now()));
    }

    /// Stop recording and hand back what was sent since `begin_trace`
    pub fn take_trace(&self) -> Option<StageTrace> {
        self.state.lock().trace.take().map(|(trace, _)| trace)
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    /// Close the stream and remove the FIFO. Idempotent.
    pub fn close(&self) {
        let sink = self.state.lock().sink.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.flush() {
                log::warn!("[Notify] Flush on close failed: {}", e);
            }
            drop(sink);
            if let Some(path) = &self.fifo_path {
                remove_fifo(path);
                log::info!("[Notify] Removed {}", path.display());
            }
        }
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        self.close();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FIFO TRANSPORT
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(unix)]
use fifo::remove as remove_fifo;

#[cfg(not(unix))]
fn remove_fifo(_path: &Path) {}

#[cfg(unix)]
mod fifo {
    use std::ffi::CString;
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;
    use std::time::Duration;

    use crate::error::{CabinetError, CabinetResult};
    use crate::token::StopToken;

    /// Create a fresh FIFO, replacing whatever was left at `path`
    pub(super) fn create(path: &Path) -> CabinetResult<()> {
        if path.symlink_metadata().is_ok() {
            std::fs::remove_file(path)?;
        }

        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            CabinetError::InvalidConfig(format!("FIFO path contains NUL: {}", path.display()))
        })?;

        // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) };
        if rc != 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    /// Open for write once a reader is present
    ///
    /// A non-blocking write-open fails with ENXIO while no reader exists.
    pub(super) fn open_writer(
        path: &Path,
        token: &StopToken,
        poll: Duration,
    ) -> CabinetResult<File> {
        loop {
            match OpenOptions::new()
                .write(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path)
            {
                Ok(file) => {
                    set_blocking(&file)?;
                    return Ok(file);
                }
                Err(e) if e.raw_os_error() == Some(libc::ENXIO) => token.sleep(poll)?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn set_blocking(file: &File) -> io::Result<()> {
        let fd = file.as_raw_fd();
        // SAFETY: fd is owned by `file` and open for the duration of both calls.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: as above.
        let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(super) fn remove(path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("[Notify] Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::MemorySink;
    use std::io::{BufRead, BufReader};
    use std::sync::Arc;
    use std::thread;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_lines_are_newline_terminated() {
        let sink = MemorySink::new();
        let channel = NotificationChannel::from_writer(sink.clone());
        channel.send(Stage::Start, "round");
        channel.send(Stage::Outcome { value: 0.42 }, "round");
        channel.send(Stage::Lose, "round");
        assert_eq!(sink.contents(), "start\n0.42\nlose\n");
    }

    #[test]
    fn test_concurrent_writers_never_interleave() {
        let sink = MemorySink::new();
        let channel = Arc::new(NotificationChannel::from_writer(sink.clone()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || {
                    let stage = if i % 2 == 0 { Stage::FirstStop } else { Stage::Bonus };
                    for _ in 0..200 {
                        channel.send(stage, "test");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let lines = sink.lines();
        assert_eq!(lines.len(), 800);
        assert!(lines.iter().all(|l| l == "first_stop" || l == "bonus"));
    }

    #[test]
    fn test_write_error_is_swallowed() {
        let channel = NotificationChannel::from_writer(BrokenPipe);
        channel.send(Stage::Bonus, "round");
        assert!(channel.is_open());
    }

    #[test]
    fn test_closed_channel_drops_sends() {
        let sink = MemorySink::new();
        let channel = NotificationChannel::from_writer(sink.clone());
        channel.close();
        channel.close();
        channel.send(Stage::Bonus, "round");
        assert!(sink.lines().is_empty());
        assert!(!channel.is_open());
    }

    #[test]
    fn test_trace_records_sources_in_order() {
        let channel = NotificationChannel::from_writer(MemorySink::new());
        channel.send(Stage::Start, "round");
        channel.begin_trace(3);
        channel.send(Stage::Outcome { value: 0.7 }, "round");
        channel.send(Stage::FirstStop, "reel2");
        channel.send(Stage::Lose, "round");

        let trace = channel.take_trace().unwrap();
        assert_eq!(trace.round, 3);
        assert_eq!(
            trace.stages(),
            vec![Stage::Outcome { value: 0.7 }, Stage::FirstStop, Stage::Lose]
        );
        assert_eq!(trace.events[1].source.as_deref(), Some("reel2"));
        assert!(channel.take_trace().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_roundtrip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify_pipe");

        let reader_path = path.clone();
        let reader = thread::spawn(move || {
            while reader_path.symlink_metadata().is_err() {
                thread::sleep(Duration::from_millis(1));
            }
            let file = std::fs::File::open(&reader_path).unwrap();
            BufReader::new(file)
                .lines()
                .map(|l| l.unwrap())
                .collect::<Vec<_>>()
        });

        let token = StopToken::new();
        let channel =
            NotificationChannel::open_fifo(&path, &token, Duration::from_millis(1)).unwrap();
        channel.send(Stage::Start, "round");
        channel.send(Stage::Outcome { value: 0.05 }, "round");
        channel.close();

        assert_eq!(reader.join().unwrap(), vec!["start", "0.05"]);
        assert!(path.symlink_metadata().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_wait_aborts_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify_pipe");
        let token = StopToken::new();
        token.stop();

        let result = NotificationChannel::open_fifo(&path, &token, Duration::from_millis(1));
        assert!(matches!(result, Err(crate::error::CabinetError::Shutdown)));
        assert!(path.symlink_metadata().is_err());
    }
}
