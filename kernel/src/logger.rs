//! Kernel log backend
//!
//! Implements the `log` facade without allocation: records are formatted into
//! a fixed buffer and handed to a console sink (serial port, VGA, test
//! capture) installed by the boot code.

use core::fmt::Write;

use log::{Level, LevelFilter, Metadata, Record};
use spin::Once;

/// Where formatted lines go
pub type ConsoleSink = fn(&str);

/// Longest line forwarded to the sink, in bytes
pub const LINE_CAPACITY: usize = 512;

static SINK: Once<ConsoleSink> = Once::new();

/// Logger that writes to the installed console sink
struct SchedLogger;

impl log::Log for SchedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format: [LEVEL] message
        let level_str = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };

        let mut buf = [0u8; LINE_CAPACITY];
        let mut writer = BufferWriter::new(&mut buf);
        let _ = write!(writer, "[{}] {}\n", level_str, record.args());
        early_print(writer.as_str());
    }

    fn flush(&self) {}
}

/// Buffer writer for formatting without alloc.
///
/// Output past the end of the buffer is dropped, never splitting a character.
pub struct BufferWriter<'a> {
    buffer: &'a mut [u8],
    pos: usize,
}

impl<'a> BufferWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Everything written so far
    pub fn as_str(&self) -> &str {
        // Only whole characters are ever copied in.
        core::str::from_utf8(&self.buffer[..self.pos]).unwrap_or_default()
    }
}

impl Write for BufferWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let remaining = self.buffer.len() - self.pos;
        let mut to_write = s.len().min(remaining);
        while !s.is_char_boundary(to_write) {
            to_write -= 1;
        }

        if to_write > 0 {
            self.buffer[self.pos..self.pos + to_write].copy_from_slice(&s.as_bytes()[..to_write]);
            self.pos += to_write;
        }

        Ok(())
    }
}

/// Global logger instance
static LOGGER: SchedLogger = SchedLogger;

/// Install the logger at INFO level
///
/// Call this very early in the boot process, before `scheduler::init`.
pub fn init(sink: ConsoleSink) {
    init_with_level(sink, LevelFilter::Info);
}

/// Install the logger with a specific level
pub fn init_with_level(sink: ConsoleSink, level: LevelFilter) {
    SINK.call_once(|| sink);
    match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(level);
            early_print("[LOGGER] Logger initialized\n");
        }
        Err(e) => {
            let mut buf = [0u8; 128];
            let mut writer = BufferWriter::new(&mut buf);
            let _ = write!(writer, "[LOGGER] ERROR: {}\n", e);
            early_print(writer.as_str());
        }
    }
}

/// Print directly to the sink, bypassing levels. Dropped before `init`.
pub fn early_print(s: &str) {
    if let Some(sink) = SINK.get() {
        sink(s);
    }
}

/// Log at DEBUG level
#[inline]
pub fn debug(msg: &str) {
    log::debug!("{}", msg);
}

/// Log at INFO level
#[inline]
pub fn info(msg: &str) {
    log::info!("{}", msg);
}

/// Log at WARN level
#[inline]
pub fn warn(msg: &str) {
    log::warn!("{}", msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use spin::Mutex;

    static CAPTURED: Mutex<String> = Mutex::new(String::new());

    fn capture(line: &str) {
        CAPTURED.lock().push_str(line);
    }

    #[test]
    fn test_buffer_writer_truncates_on_char_boundary() {
        let mut buf = [0u8; 5];
        let mut writer = BufferWriter::new(&mut buf);
        let _ = write!(writer, "ab✓cd");
        // '✓' is 3 bytes: "ab✓" fits exactly, "cd" is dropped
        assert_eq!(writer.as_str(), "ab✓");

        let mut buf = [0u8; 4];
        let mut writer = BufferWriter::new(&mut buf);
        let _ = write!(writer, "abc✓");
        assert_eq!(writer.as_str(), "abc");
        assert_eq!(writer.len(), 3);
    }

    #[test]
    fn test_records_reach_the_sink() {
        init_with_level(capture, LevelFilter::Debug);
        info("scheduler online");
        log::trace!("filtered out");

        let captured = CAPTURED.lock();
        assert!(captured.contains("[INFO ] scheduler online\n"));
        assert!(!captured.contains("filtered out"));
    }
}
