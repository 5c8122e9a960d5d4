//! The UDP transport executor: one datagram out, one (matching) datagram
//! back. No retry, no timeout — composition adds those.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::{decode_message, encode_message, MAX_UDP_PACKET};
use crate::error::DnsError;
use crate::executor::{check_cancelled, Executor};
use crate::message::{Message, Query};

pub struct UdpTransport {
    nameserver: SocketAddr,
}

impl UdpTransport {
    pub fn new(nameserver: SocketAddr) -> Self {
        Self { nameserver }
    }
}

#[async_trait]
impl Executor for UdpTransport {
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
        check_cancelled(&cancel)?;

        let request = Message::create_request(query.clone());
        let request_id = request.id;
        let packet = encode_message(&request)?;
        if packet.len() > MAX_UDP_PACKET {
            return Err(DnsError::QueryFailed(format!(
                "query for {} is {} bytes, exceeds the {MAX_UDP_PACKET}-byte UDP limit",
                query.name,
                packet.len()
            )));
        }

        let bind_addr: SocketAddr = if self.nameserver.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.nameserver).await?;

        debug!(name = %query.name, server = %self.nameserver, id = request_id, "sending UDP query");

        tokio::select! {
            _ = cancel.cancelled() => Err(DnsError::Cancelled),
            result = send_and_receive(&socket, &packet, request_id) => result,
        }
    }
}

async fn send_and_receive(
    socket: &UdpSocket,
    packet: &[u8],
    request_id: u16,
) -> Result<Message, DnsError> {
    let sent = socket.send(packet).await?;
    if sent != packet.len() {
        return Err(DnsError::QueryFailed(format!(
            "short UDP write: sent {sent} of {} bytes",
            packet.len()
        )));
    }

    let mut buf = vec![0u8; 4096];
    loop {
        let n = socket.recv(&mut buf).await?;
        let message = match decode_message(&buf[..n]) {
            Ok(message) => message,
            Err(err) => {
                // A stray or malformed datagram must not wedge the query:
                // discard it and keep listening.
                warn!(error = %err, "discarding malformed UDP datagram");
                continue;
            }
        };

        if message.id != request_id {
            trace!(got = message.id, want = request_id, "discarding mismatched transaction id");
            continue;
        }

        if message.is_truncated {
            return Err(DnsError::ResponseTruncated);
        }

        return Ok(message);
    }
}
