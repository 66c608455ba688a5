//! Network subsystem for UDP video transport

pub mod receiver;
pub mod sender;
pub mod udp;

pub use receiver::{DatagramReceiver, ReceiverStats};
pub use sender::{FrameSender, SenderStats};
pub use udp::{create_receive_socket, create_send_socket};
