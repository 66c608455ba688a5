//! Hardware button listener
//!
//! A microcontroller on a serial line prints one message per line; a button
//! release is turned into a key code on the shared key queue. The port is
//! opened with a short read timeout so the listener notices a stop request
//! even while the line is silent.

use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serialport::{SerialPortInfo, SerialPortType};

use crate::error::MediaError;
use crate::input::KeyInjector;

/// Message printed by the button firmware on release
pub const RELEASE_MESSAGE: &str = "BUTTON2_RELEASED";

/// Serial read timeout; bounds how long a stop request goes unnoticed
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Pause after a read error before trying again
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// How long `stop` waits for the thread before detaching it
const STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// Background reader turning button messages into key codes
pub struct ButtonListener {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ButtonListener {
    /// Open a serial port (or detect one) at `baud` and start listening.
    ///
    /// Returns `None` when no port is found or it cannot be opened; the
    /// node keeps running with keyboard input only.
    pub fn open(port: &str, baud: u32, release_key: u8, injector: KeyInjector) -> Option<Self> {
        let name = if port.is_empty() || port == "auto" {
            match detect_port() {
                Some(name) => name,
                None => {
                    tracing::warn!("No serial port found for button input");
                    return None;
                }
            }
        } else {
            port.to_string()
        };

        let serial = match serialport::new(&name, baud).timeout(READ_TIMEOUT).open() {
            Ok(serial) => serial,
            Err(e) => {
                tracing::warn!("Cannot open serial port {}: {}", name, e);
                return None;
            }
        };

        tracing::info!("Button listener connected to {} at {} baud", name, baud);
        match Self::spawn(BufReader::new(serial), release_key, injector) {
            Ok(listener) => Some(listener),
            Err(e) => {
                tracing::warn!("Button listener could not start: {}", e);
                None
            }
        }
    }

    /// Start listening on any line-oriented reader.
    ///
    /// Read timeouts are treated as an idle line, not as errors.
    pub fn spawn<R>(reader: R, release_key: u8, injector: KeyInjector) -> Result<Self, MediaError>
    where
        R: BufRead + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();

        let handle = thread::Builder::new()
            .name("button-listener".to_string())
            .spawn(move || listen(reader, release_key, injector, running_for_loop))
            .map_err(|e| MediaError::Spawn(e.to_string()))?;

        Ok(Self {
            running,
            thread_handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop listening and join the thread.
    ///
    /// Returns `false` if the reader never came back from a blocking read
    /// within the stop timeout; the thread is then detached.
    pub fn stop(&mut self) -> bool {
        self.running.store(false, Ordering::SeqCst);

        let Some(handle) = self.thread_handle.take() else {
            return true;
        };

        let deadline = Instant::now() + STOP_TIMEOUT;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        if handle.is_finished() {
            let _ = handle.join();
            true
        } else {
            tracing::debug!("Button listener still blocked on read, detaching");
            false
        }
    }
}

impl Drop for ButtonListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen<R: BufRead>(mut reader: R, release_key: u8, injector: KeyInjector, running: Arc<AtomicBool>) {
    // A timeout can split a message; partial bytes stay in `line`
    let mut line = String::new();
    while running.load(Ordering::Relaxed) {
        match reader.read_line(&mut line) {
            Ok(0) => {
                tracing::info!("Button input closed");
                break;
            }
            Ok(_) => {
                if is_release(&line) && running.load(Ordering::Relaxed) {
                    tracing::debug!("Button released, injecting key {:?}", release_key as char);
                    injector.inject(release_key);
                }
                line.clear();
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) => {
                tracing::warn!("Button listener serial error: {}", e);
                line.clear();
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
}

fn is_release(line: &str) -> bool {
    line.trim() == RELEASE_MESSAGE
}

/// Find the most likely button port among the system's serial ports
pub fn detect_port() -> Option<String> {
    match serialport::available_ports() {
        Ok(ports) => pick_port(ports.iter().map(port_candidate)),
        Err(e) => {
            tracing::warn!("Cannot list serial ports: {}", e);
            None
        }
    }
}

/// Port name plus a lowercase description of the attached device
fn port_candidate(info: &SerialPortInfo) -> (String, String) {
    let description = match &info.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "{} {}",
            usb.manufacturer.as_deref().unwrap_or_default(),
            usb.product.as_deref().unwrap_or_default()
        ),
        _ => String::new(),
    };
    (info.port_name.clone(), description.to_lowercase())
}

/// Prefer a port describing an Arduino, then the first `ttyACM*`, then the
/// first `ttyUSB*`
fn pick_port(candidates: impl IntoIterator<Item = (String, String)>) -> Option<String> {
    let mut candidates: Vec<(String, String)> = candidates.into_iter().collect();
    candidates.sort();

    if let Some((name, _)) = candidates.iter().find(|(_, desc)| desc.contains("arduino")) {
        return Some(name.clone());
    }
    // ttyACM sorts before ttyUSB
    candidates
        .into_iter()
        .map(|(name, _)| name)
        .find(|name| name.contains("ttyACM") || name.contains("ttyUSB"))
}
