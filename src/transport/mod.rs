//! Leaf transports: the bottom of the executor stack, each one a thin
//! [`crate::executor::Executor`] wrapping a single socket kind.

pub mod tcp;
pub mod udp;

pub use tcp::TcpTransport;
pub use udp::UdpTransport;
