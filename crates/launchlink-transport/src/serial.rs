use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use launchlink_core::Strategy;
use launchlink_message::{construct_message, ComsError, Message};
use serialport::SerialPort;

/// `&` (0x26): ASCII JSON never contains it, so it is a safe frame
/// terminator without escaping.
const DEFAULT_TERMINATOR: u8 = b'&';
/// Read timeout on the underlying port, short enough that a pending
/// `cancel()` is noticed promptly without busy-spinning.
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// A strategy over a byte-oriented serial port.
///
/// Each message is its JSON encoding followed by a single terminator byte.
/// A mutex guards the port itself so a write from the sending thread cannot
/// interleave with the byte-at-a-time read running on the worker thread.
pub struct SerialStrategy {
    port: Mutex<Box<dyn SerialPort>>,
    terminator: u8,
    cancelled: AtomicBool,
}

impl SerialStrategy {
    /// Open `port_name` at `baud_rate` with the canonical `&` terminator.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, ComsError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_POLL_TIMEOUT)
            .open()
            .map_err(|e| ComsError::read(format!("failed to open {port_name}: {e}")))?;
        Ok(SerialStrategy {
            port: Mutex::new(port),
            terminator: DEFAULT_TERMINATOR,
            cancelled: AtomicBool::new(false),
        })
    }

    /// Use a non-default frame terminator (e.g. `\r`). Both peers of a link
    /// must agree on the same byte.
    pub fn with_terminator(mut self, terminator: u8) -> Self {
        self.terminator = terminator;
        self
    }
}

impl Strategy for SerialStrategy {
    fn read(&self) -> Result<Message, ComsError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(ComsError::read("serial strategy cancelled"));
            }
            let outcome = {
                let mut port = self.port.lock().unwrap();
                port.read(&mut byte)
            };
            match outcome {
                Ok(0) => return Err(ComsError::parse("serial port closed")),
                Ok(_) if byte[0] == self.terminator => {
                    let text = String::from_utf8_lossy(&buf);
                    return construct_message(text.into_owned());
                }
                Ok(_) => buf.push(byte[0]),
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(ComsError::parse(format!("serial port closed: {e}"))),
            }
        }
    }

    fn write(&self, m: &Message) -> Result<(), ComsError> {
        let frame = encode_frame(m, self.terminator);
        let mut port = self.port.lock().unwrap();
        port.write_all(&frame)
            .map_err(|e| ComsError::write(format!("serial write failed: {e}")))?;
        if port.bytes_to_write().unwrap_or(0) > 0 {
            port.flush()
                .map_err(|e| ComsError::write(format!("serial flush failed: {e}")))?;
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

fn encode_frame(m: &Message, terminator: u8) -> Vec<u8> {
    let mut frame = m.to_string().into_bytes();
    frame.push(terminator);
    frame
}
