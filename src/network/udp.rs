//! UDP socket setup

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::NetworkError;

/// Socket buffer size requested for video bursts
const SOCKET_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Unbound socket used for all outgoing chunks
pub fn create_send_socket() -> Result<UdpSocket, NetworkError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::SocketSetup(e.to_string()))?;

    if let Err(e) = socket.set_send_buffer_size(SOCKET_BUFFER_SIZE) {
        tracing::debug!("Could not enlarge send buffer: {}", e);
    }

    let any: SocketAddr = ([0, 0, 0, 0], 0).into();
    socket
        .bind(&any.into())
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;

    Ok(socket.into())
}

/// Socket bound to `port` on all interfaces with a receive timeout.
///
/// The timeout keeps the receive loop responsive to shutdown.
pub fn create_receive_socket(port: u16, timeout: Duration) -> Result<UdpSocket, NetworkError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::SocketSetup(e.to_string()))?;

    socket
        .set_reuse_address(true)
        .map_err(|e| NetworkError::SocketSetup(e.to_string()))?;

    if let Err(e) = socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE) {
        tracing::debug!("Could not enlarge receive buffer: {}", e);
    }

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    socket
        .bind(&addr.into())
        .map_err(|e| NetworkError::BindFailed(format!("port {}: {}", port, e)))?;

    socket
        .set_read_timeout(Some(timeout))
        .map_err(|e| NetworkError::SocketSetup(e.to_string()))?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_socket_has_timeout() {
        let socket = create_receive_socket(0, Duration::from_millis(50)).unwrap();
        assert_eq!(socket.read_timeout().unwrap(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_send_socket_binds_ephemeral() {
        let socket = create_send_socket().unwrap();
        assert_ne!(socket.local_addr().unwrap().port(), 0);
    }
}
