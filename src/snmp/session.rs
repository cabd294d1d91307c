// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! One-shot SNMP v2c session over UDP

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::SnmpError;
use super::ber::{Oid, Pdu, PduKind, Value, decode_message, encode_message};

/// Largest datagram we expect from an agent
const MAX_DATAGRAM: usize = 65_507;

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

fn next_request_id() -> i32 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
}

/// A session bound to one agent; the socket is closed when the session drops
pub(super) struct SnmpSession {
    socket: UdpSocket,
    host: Ipv4Addr,
    community: Vec<u8>,
    timeout: Duration,
}

impl SnmpSession {
    pub(super) async fn open(
        host: Ipv4Addr,
        port: u16,
        community: &str,
        timeout: Duration,
    ) -> Result<Self, SnmpError> {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
        socket.connect(SocketAddr::from((host, port))).await?;
        tracing::trace!("SNMP session opened to {}:{}", host, port);
        Ok(Self {
            socket,
            host,
            community: community.as_bytes().to_vec(),
            timeout,
        })
    }

    /// GET a single object; exception values are returned as-is
    pub(super) async fn get(&self, oid: &Oid) -> Result<Value, SnmpError> {
        let pdu = self
            .request(PduKind::Get, vec![(oid.clone(), Value::Null)])
            .await?;
        single_value(pdu)
    }

    pub(super) async fn get_next(&self, oid: &Oid) -> Result<(Oid, Value), SnmpError> {
        let pdu = self
            .request(PduKind::GetNext, vec![(oid.clone(), Value::Null)])
            .await?;
        pdu.varbinds
            .into_iter()
            .next()
            .ok_or_else(|| SnmpError::Decode("empty varbind list".to_string()))
    }

    pub(super) async fn set(&self, oid: &Oid, value: Value) -> Result<Value, SnmpError> {
        let pdu = self
            .request(PduKind::Set, vec![(oid.clone(), value)])
            .await?;
        single_value(pdu)
    }

    /// Walks every object below `root` with successive GETNEXT requests
    pub(super) async fn walk(&self, root: &Oid) -> Result<Vec<(Oid, Value)>, SnmpError> {
        let mut rows = Vec::new();
        let mut cursor = root.clone();
        loop {
            let (oid, value) = self.get_next(&cursor).await?;
            if !oid.starts_with(root) || value.is_exception() {
                break;
            }
            // agents that do not advance would loop forever
            if oid <= cursor {
                tracing::warn!("SNMP agent {} returned non-increasing OID {}", self.host, oid);
                break;
            }
            cursor = oid.clone();
            rows.push((oid, value));
        }
        tracing::trace!("Walked {} rows of {} on {}", rows.len(), root, self.host);
        Ok(rows)
    }

    async fn request(&self, kind: PduKind, varbinds: Vec<(Oid, Value)>) -> Result<Pdu, SnmpError> {
        let request_id = next_request_id();
        let datagram = encode_message(&self.community, &Pdu::request(kind, request_id, varbinds));
        self.socket.send(&datagram).await?;

        let pdu = timeout(self.timeout, async {
            let mut buf = vec![0u8; MAX_DATAGRAM];
            loop {
                let n = self.socket.recv(&mut buf).await?;
                let message = match decode_message(&buf[..n]) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::trace!("Skipping undecodable datagram from {}: {}", self.host, e);
                        continue;
                    }
                };
                if message.pdu.request_id == request_id {
                    return Ok::<Pdu, SnmpError>(message.pdu);
                }
                tracing::trace!(
                    "Dropping stale SNMP response {} from {}",
                    message.pdu.request_id,
                    self.host
                );
            }
        })
        .await
        .map_err(|_| SnmpError::Timeout { host: self.host })??;

        if pdu.error_status != 0 {
            return Err(SnmpError::ErrorStatus {
                host: self.host,
                status: pdu.error_status,
                index: pdu.error_index,
            });
        }
        Ok(pdu)
    }
}

fn single_value(pdu: Pdu) -> Result<Value, SnmpError> {
    pdu.varbinds
        .into_iter()
        .next()
        .map(|(_, value)| value)
        .ok_or_else(|| SnmpError::Decode("empty varbind list".to_string()))
}
