use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Mutex;

use launchlink_core::Strategy;
use launchlink_message::{construct_message, ComsError, Message};

/// Fixed-width ASCII length header, right-padded with spaces.
const HEADER_LEN: usize = 64;

/// A strategy over a length-prefixed TCP connection.
///
/// The mutex around the stream guards interleaving of the two-part frame
/// (header then payload) across concurrent read/write; `shutdown_handle` is
/// a separate clone of the same socket used purely to unblock an in-flight
/// `read()` from [`SocketStrategy::cancel`] without taking that mutex.
pub struct SocketStrategy {
    stream: Mutex<TcpStream>,
    shutdown_handle: TcpStream,
}

impl SocketStrategy {
    fn from_stream(stream: TcpStream) -> Result<Self, ComsError> {
        let shutdown_handle = stream
            .try_clone()
            .map_err(|e| ComsError::read(format!("failed to clone socket: {e}")))?;
        Ok(SocketStrategy {
            stream: Mutex::new(stream),
            shutdown_handle,
        })
    }

    /// Bind, accept exactly one connection, and close the listener.
    pub fn accept_at(addr: impl ToSocketAddrs) -> Result<Self, ComsError> {
        let listener =
            TcpListener::bind(addr).map_err(|e| ComsError::read(format!("bind failed: {e}")))?;
        let (stream, _) = listener
            .accept()
            .map_err(|e| ComsError::read(format!("accept failed: {e}")))?;
        drop(listener);
        SocketStrategy::from_stream(stream)
    }

    pub fn connect_to(addr: impl ToSocketAddrs) -> Result<Self, ComsError> {
        let stream =
            TcpStream::connect(addr).map_err(|e| ComsError::read(format!("connect failed: {e}")))?;
        SocketStrategy::from_stream(stream)
    }
}

impl Strategy for SocketStrategy {
    fn read(&self) -> Result<Message, ComsError> {
        let mut header = [0u8; HEADER_LEN];
        let mut stream = self.stream.lock().unwrap();
        let n = stream
            .read(&mut header)
            .map_err(|e| ComsError::read(format!("header read failed: {e}")))?;
        if n == 0 {
            return Err(ComsError::read("empty header received"));
        }

        let text = String::from_utf8_lossy(&header[..n]);
        let len: usize = text
            .trim()
            .parse()
            .map_err(|_| ComsError::parse(format!("invalid length header: {text:?}")))?;

        let mut payload = vec![0u8; len];
        stream
            .read_exact(&mut payload)
            .map_err(|e| ComsError::read(format!("payload read failed: {e}")))?;
        let decoded = String::from_utf8(payload)
            .map_err(|e| ComsError::parse(format!("payload was not valid utf-8: {e}")))?;
        construct_message(decoded)
    }

    fn write(&self, m: &Message) -> Result<(), ComsError> {
        let payload = m.to_string().into_bytes();
        let header = encode_header(payload.len())?;
        let mut stream = self.stream.lock().unwrap();
        stream
            .write_all(&header)
            .map_err(|e| ComsError::write(format!("header write failed: {e}")))?;
        stream
            .write_all(&payload)
            .map_err(|e| ComsError::write(format!("payload write failed: {e}")))?;
        Ok(())
    }

    fn cancel(&self) {
        let _ = self.shutdown_handle.shutdown(Shutdown::Both);
    }
}

fn encode_header(len: usize) -> Result<[u8; HEADER_LEN], ComsError> {
    let digits = len.to_string();
    if digits.len() > HEADER_LEN {
        return Err(ComsError::write("message too long to generate a header"));
    }
    let mut header = [b' '; HEADER_LEN];
    header[..digits.len()].copy_from_slice(digits.as_bytes());
    Ok(header)
}
