use std::io;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// In the browser, lines go to the devtools console; timestamps are left
/// out because `SystemTime` is unavailable on wasm32. Calling this twice is
/// harmless.
pub fn init(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .without_time()
        .with_writer(ConsoleWriter::default)
        .try_init();

    if let Err(e) = result {
        tracing::debug!("Logging already initialised: {}", e);
    }
}

/// Buffers one formatted event and emits it when dropped.
#[derive(Default)]
pub struct ConsoleWriter {
    line: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.line.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.line);
        let text = text.trim_end();
        if !text.is_empty() {
            emit(text);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn emit(line: &str) {
    web_sys::console::log_1(&line.into());
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(line: &str) {
    eprintln!("{}", line);
}
