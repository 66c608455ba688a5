//! Datagram receiver

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::MAX_UDP_PAYLOAD;
use crate::error::NetworkError;
use crate::network::udp::create_receive_socket;

/// Blocking receiver with a bounded wait
pub struct DatagramReceiver {
    socket: UdpSocket,
    buf: Vec<u8>,
    stats: Arc<ReceiverStats>,
}

impl DatagramReceiver {
    /// Bind on all interfaces; `timeout` bounds every `receive` call
    pub fn bind(port: u16, timeout: Duration) -> Result<Self, NetworkError> {
        let socket = create_receive_socket(port, timeout)?;
        Ok(Self::from_socket(socket))
    }

    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            buf: vec![0u8; MAX_UDP_PAYLOAD],
            stats: Arc::new(ReceiverStats::default()),
        }
    }

    /// Wait for one datagram.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing received.
    pub fn receive(&mut self) -> Result<Option<(&[u8], SocketAddr)>, NetworkError> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((len, source)) => {
                self.stats.datagrams_received.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
                Ok(Some((&self.buf[..len], source)))
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => {
                self.stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                Err(NetworkError::ReceiveFailed(e.to_string()))
            }
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.socket
            .local_addr()
            .map_err(|e| NetworkError::SocketSetup(e.to_string()))
    }

    pub fn stats(&self) -> Arc<ReceiverStats> {
        self.stats.clone()
    }
}

/// Receiver counters
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub datagrams_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub receive_errors: AtomicU64,
    /// Datagrams from addresses not in the peer directory
    pub unknown_sources: AtomicU64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_receive_times_out() {
        let mut receiver = DatagramReceiver::bind(0, Duration::from_millis(50)).unwrap();
        let start = Instant::now();
        assert!(receiver.receive().unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_receive_datagram() {
        let mut receiver = DatagramReceiver::bind(0, Duration::from_secs(2)).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"hello", ("127.0.0.1", port)).unwrap();

        let (data, source) = receiver.receive().unwrap().unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(source, sender.local_addr().unwrap());
        assert_eq!(receiver.stats().datagrams_received.load(Ordering::Relaxed), 1);
    }
}
