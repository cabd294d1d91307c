// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! SNMP v2c message encoding (BER subset)

use std::fmt;
use std::str::FromStr;

use super::SnmpError;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OBJECT_ID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_IP_ADDRESS: u8 = 0x40;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIME_TICKS: u8 = 0x43;
const TAG_COUNTER64: u8 = 0x46;
const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;

/// SNMP version field value for v2c
const VERSION_2C: i64 = 1;

/// Object identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    #[must_use]
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    #[must_use]
    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// Appends index arcs below this object
    #[must_use]
    pub fn child(&self, suffix: &[u32]) -> Self {
        let mut arcs = self.0.clone();
        arcs.extend_from_slice(suffix);
        Self(arcs)
    }

    #[must_use]
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }

    #[must_use]
    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self(arcs.to_vec())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = SnmpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arcs = s
            .trim_start_matches('.')
            .split('.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|_| SnmpError::Decode(format!("invalid OID '{s}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(arcs))
    }
}

/// Varbind value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// True for the v2c exception values that stand in for a missing object
    #[must_use]
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView
        )
    }
}

/// PDU kinds used by the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    Get,
    GetNext,
    Response,
    Set,
}

impl PduKind {
    const fn tag(self) -> u8 {
        match self {
            Self::Get => 0xA0,
            Self::GetNext => 0xA1,
            Self::Response => 0xA2,
            Self::Set => 0xA3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::Get),
            0xA1 => Some(Self::GetNext),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::Set),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub kind: PduKind,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<(Oid, Value)>,
}

impl Pdu {
    #[must_use]
    pub fn request(kind: PduKind, request_id: i32, varbinds: Vec<(Oid, Value)>) -> Self {
        Self {
            kind,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }
}

/// Decoded v2c message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

// BER definite length encoding - short form below 128, long form otherwise
#[allow(clippy::cast_possible_truncation)]
pub fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    let mut out = Vec::with_capacity(1 + significant.len());
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
    out
}

fn encode_tlv(tag: u8, content: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    out.extend_from_slice(&encode_length(content.len()));
    out.extend_from_slice(content);
}

/// Minimal two's complement encoding
fn integer_bytes(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn unsigned_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    let mut out = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

fn encode_subidentifier(mut arc: u32, out: &mut Vec<u8>) {
    let mut tmp = [0u8; 5];
    let mut i = tmp.len();
    loop {
        i -= 1;
        tmp[i] = (arc & 0x7F) as u8;
        arc >>= 7;
        if arc == 0 {
            break;
        }
    }
    let last = tmp.len() - 1;
    for byte in &mut tmp[i..last] {
        *byte |= 0x80;
    }
    out.extend_from_slice(&tmp[i..]);
}

fn oid_bytes(oid: &Oid) -> Vec<u8> {
    let arcs = oid.arcs();
    let mut out = Vec::with_capacity(arcs.len() + 4);
    match arcs {
        [] => {}
        [first] => encode_subidentifier(first * 40, &mut out),
        [first, second, rest @ ..] => {
            encode_subidentifier(first * 40 + second, &mut out);
            for arc in rest {
                encode_subidentifier(*arc, &mut out);
            }
        }
    }
    out
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Integer(v) => encode_tlv(TAG_INTEGER, &integer_bytes(*v), out),
        Value::OctetString(bytes) => encode_tlv(TAG_OCTET_STRING, bytes, out),
        Value::Null => encode_tlv(TAG_NULL, &[], out),
        Value::ObjectId(oid) => encode_tlv(TAG_OBJECT_ID, &oid_bytes(oid), out),
        Value::IpAddress(octets) => encode_tlv(TAG_IP_ADDRESS, octets, out),
        Value::Counter32(v) => encode_tlv(TAG_COUNTER32, &unsigned_bytes(u64::from(*v)), out),
        Value::Gauge32(v) => encode_tlv(TAG_GAUGE32, &unsigned_bytes(u64::from(*v)), out),
        Value::TimeTicks(v) => encode_tlv(TAG_TIME_TICKS, &unsigned_bytes(u64::from(*v)), out),
        Value::Counter64(v) => encode_tlv(TAG_COUNTER64, &unsigned_bytes(*v), out),
        Value::NoSuchObject => encode_tlv(TAG_NO_SUCH_OBJECT, &[], out),
        Value::NoSuchInstance => encode_tlv(TAG_NO_SUCH_INSTANCE, &[], out),
        Value::EndOfMibView => encode_tlv(TAG_END_OF_MIB_VIEW, &[], out),
    }
}

/// Encodes a complete v2c message ready to be sent as one datagram
#[must_use]
pub fn encode_message(community: &[u8], pdu: &Pdu) -> Vec<u8> {
    let mut varbinds = Vec::new();
    for (oid, value) in &pdu.varbinds {
        let mut varbind = Vec::new();
        encode_tlv(TAG_OBJECT_ID, &oid_bytes(oid), &mut varbind);
        encode_value(value, &mut varbind);
        encode_tlv(TAG_SEQUENCE, &varbind, &mut varbinds);
    }

    let mut body = Vec::new();
    encode_tlv(
        TAG_INTEGER,
        &integer_bytes(i64::from(pdu.request_id)),
        &mut body,
    );
    encode_tlv(TAG_INTEGER, &integer_bytes(pdu.error_status), &mut body);
    encode_tlv(TAG_INTEGER, &integer_bytes(pdu.error_index), &mut body);
    encode_tlv(TAG_SEQUENCE, &varbinds, &mut body);

    let mut message = Vec::new();
    encode_tlv(TAG_INTEGER, &integer_bytes(VERSION_2C), &mut message);
    encode_tlv(TAG_OCTET_STRING, community, &mut message);
    encode_tlv(pdu.kind.tag(), &body, &mut message);

    let mut out = Vec::with_capacity(message.len() + 4);
    encode_tlv(TAG_SEQUENCE, &message, &mut out);
    out
}

/// Cursor over a BER buffer
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn byte(&mut self) -> Result<u8, SnmpError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| SnmpError::Decode("unexpected end of message".to_string()))?;
        self.pos += 1;
        Ok(b)
    }

    fn length(&mut self) -> Result<usize, SnmpError> {
        let first = self.byte()?;
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }
        let count = usize::from(first & 0x7F);
        if count == 0 || count > 4 {
            return Err(SnmpError::Decode(format!(
                "unsupported length form 0x{first:02x}"
            )));
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | usize::from(self.byte()?);
        }
        Ok(len)
    }

    fn tlv(&mut self) -> Result<(u8, &'a [u8]), SnmpError> {
        let tag = self.byte()?;
        let len = self.length()?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| SnmpError::Decode(format!("element 0x{tag:02x} overruns message")))?;
        let content = &self.buf[self.pos..end];
        self.pos = end;
        Ok((tag, content))
    }

    fn expect(&mut self, expected: u8) -> Result<&'a [u8], SnmpError> {
        let (tag, content) = self.tlv()?;
        if tag != expected {
            return Err(SnmpError::Decode(format!(
                "expected tag 0x{expected:02x}, found 0x{tag:02x}"
            )));
        }
        Ok(content)
    }
}

fn decode_integer(content: &[u8]) -> Result<i64, SnmpError> {
    if content.is_empty() || content.len() > 8 {
        return Err(SnmpError::Decode(format!(
            "integer of {} bytes",
            content.len()
        )));
    }
    let mut value: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    for b in content {
        value = (value << 8) | i64::from(*b);
    }
    Ok(value)
}

fn decode_unsigned(content: &[u8]) -> Result<u64, SnmpError> {
    let trimmed = match content {
        [0, rest @ ..] if !rest.is_empty() => rest,
        other => other,
    };
    if trimmed.is_empty() || trimmed.len() > 8 {
        return Err(SnmpError::Decode(format!(
            "unsigned of {} bytes",
            content.len()
        )));
    }
    Ok(trimmed
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn decode_u32(content: &[u8]) -> Result<u32, SnmpError> {
    let value = decode_unsigned(content)?;
    u32::try_from(value).map_err(|_| SnmpError::Decode(format!("{value} exceeds 32 bits")))
}

fn decode_oid(content: &[u8]) -> Result<Oid, SnmpError> {
    let mut subids = Vec::with_capacity(content.len() + 1);
    let mut current: u32 = 0;
    for (i, b) in content.iter().enumerate() {
        current = current
            .checked_mul(128)
            .ok_or_else(|| SnmpError::Decode("OID arc overflow".to_string()))?
            | u32::from(b & 0x7F);
        if b & 0x80 == 0 {
            subids.push(current);
            current = 0;
        } else if i == content.len() - 1 {
            return Err(SnmpError::Decode("truncated OID".to_string()));
        }
    }

    let Some((&first, rest)) = subids.split_first() else {
        return Ok(Oid(Vec::new()));
    };
    let mut arcs = Vec::with_capacity(subids.len() + 1);
    match first {
        0..40 => arcs.extend([0, first]),
        40..80 => arcs.extend([1, first - 40]),
        _ => arcs.extend([2, first - 80]),
    }
    arcs.extend_from_slice(rest);
    Ok(Oid(arcs))
}

fn decode_value(tag: u8, content: &[u8]) -> Result<Value, SnmpError> {
    let value = match tag {
        TAG_INTEGER => Value::Integer(decode_integer(content)?),
        TAG_OCTET_STRING => Value::OctetString(content.to_vec()),
        TAG_NULL => Value::Null,
        TAG_OBJECT_ID => Value::ObjectId(decode_oid(content)?),
        TAG_IP_ADDRESS => {
            let octets: [u8; 4] = content
                .try_into()
                .map_err(|_| SnmpError::Decode("IpAddress must be 4 bytes".to_string()))?;
            Value::IpAddress(octets)
        }
        TAG_COUNTER32 => Value::Counter32(decode_u32(content)?),
        TAG_GAUGE32 => Value::Gauge32(decode_u32(content)?),
        TAG_TIME_TICKS => Value::TimeTicks(decode_u32(content)?),
        TAG_COUNTER64 => Value::Counter64(decode_unsigned(content)?),
        TAG_NO_SUCH_OBJECT => Value::NoSuchObject,
        TAG_NO_SUCH_INSTANCE => Value::NoSuchInstance,
        TAG_END_OF_MIB_VIEW => Value::EndOfMibView,
        other => {
            return Err(SnmpError::Decode(format!(
                "unsupported value tag 0x{other:02x}"
            )));
        }
    };
    Ok(value)
}

/// Decodes one datagram into a v2c message
pub fn decode_message(buf: &[u8]) -> Result<Message, SnmpError> {
    let mut outer = Reader::new(buf);
    let mut message = Reader::new(outer.expect(TAG_SEQUENCE)?);

    let version = decode_integer(message.expect(TAG_INTEGER)?)?;
    if version != VERSION_2C {
        return Err(SnmpError::Decode(format!("unsupported version {version}")));
    }
    let community = message.expect(TAG_OCTET_STRING)?.to_vec();

    let (pdu_tag, pdu_content) = message.tlv()?;
    let kind = PduKind::from_tag(pdu_tag)
        .ok_or_else(|| SnmpError::Decode(format!("unsupported PDU 0x{pdu_tag:02x}")))?;
    let mut pdu = Reader::new(pdu_content);

    let request_id = decode_integer(pdu.expect(TAG_INTEGER)?)?;
    let request_id = i32::try_from(request_id)
        .map_err(|_| SnmpError::Decode(format!("request id {request_id} out of range")))?;
    let error_status = decode_integer(pdu.expect(TAG_INTEGER)?)?;
    let error_index = decode_integer(pdu.expect(TAG_INTEGER)?)?;

    let mut list = Reader::new(pdu.expect(TAG_SEQUENCE)?);
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut varbind = Reader::new(list.expect(TAG_SEQUENCE)?);
        let oid = decode_oid(varbind.expect(TAG_OBJECT_ID)?)?;
        let (tag, content) = varbind.tlv()?;
        varbinds.push((oid, decode_value(tag, content)?));
    }

    Ok(Message {
        community,
        pdu: Pdu {
            kind,
            request_id,
            error_status,
            error_index,
            varbinds,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_length_short_and_long_form() {
        assert_eq!(encode_length(0), vec![0x00]);
        assert_eq!(encode_length(127), vec![0x7F]);
        assert_eq!(encode_length(128), vec![0x81, 0x80]);
        assert_eq!(encode_length(255), vec![0x81, 0xFF]);
        assert_eq!(encode_length(256), vec![0x82, 0x01, 0x00]);
    }

    #[test]
    fn test_integer_minimal_encoding() {
        assert_eq!(integer_bytes(0), vec![0x00]);
        assert_eq!(integer_bytes(127), vec![0x7F]);
        assert_eq!(integer_bytes(128), vec![0x00, 0x80]);
        assert_eq!(integer_bytes(256), vec![0x01, 0x00]);
        assert_eq!(integer_bytes(-1), vec![0xFF]);
        assert_eq!(integer_bytes(-129), vec![0xFF, 0x7F]);
        assert_eq!(decode_integer(&[0xFF, 0x7F]).unwrap(), -129);
        assert_eq!(decode_integer(&[0x00, 0x80]).unwrap(), 128);
    }

    #[test]
    fn test_unsigned_encoding_keeps_sign_bit_clear() {
        assert_eq!(unsigned_bytes(0), vec![0x00]);
        assert_eq!(unsigned_bytes(0x80), vec![0x00, 0x80]);
        assert_eq!(unsigned_bytes(u64::from(u32::MAX)), vec![0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decode_u32(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(), u32::MAX);
    }

    #[test]
    fn test_oid_encoding_matches_known_bytes() {
        let oid: Oid = "1.3.6.1.2.1.17.4.3.1.2".parse().unwrap();
        assert_eq!(
            oid_bytes(&oid),
            vec![0x2B, 0x06, 0x01, 0x02, 0x01, 0x11, 0x04, 0x03, 0x01, 0x02]
        );

        let wide = Oid::new(vec![1, 3, 6, 1, 4, 1, 890]);
        assert_eq!(oid_bytes(&wide), vec![0x2B, 0x06, 0x01, 0x04, 0x01, 0x86, 0x7A]);
        assert_eq!(decode_oid(&oid_bytes(&wide)).unwrap(), wide);
    }

    #[test]
    fn test_decode_rejects_truncated_oid() {
        assert!(decode_oid(&[0x2B, 0x86]).is_err());
    }

    #[test]
    fn test_get_request_wire_layout() {
        let oid: Oid = "1.3.6.1.2.1.1.5.0".parse().unwrap();
        let pdu = Pdu::request(PduKind::Get, 1, vec![(oid, Value::Null)]);
        let bytes = encode_message(b"public", &pdu);

        let expected = vec![
            0x30, 0x26, // message
            0x02, 0x01, 0x01, // version 2c
            0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', // community
            0xA0, 0x19, // GetRequest
            0x02, 0x01, 0x01, // request id
            0x02, 0x01, 0x00, // error status
            0x02, 0x01, 0x00, // error index
            0x30, 0x0E, // varbind list
            0x30, 0x0C, // varbind
            0x06, 0x08, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x05, 0x00, // oid
            0x05, 0x00, // null
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_decode_response_with_exception_values() {
        let fdb: Oid = "1.3.6.1.2.1.17.4.3.1.2.170.187.204.221.238.255".parse().unwrap();
        let status: Oid = "1.3.6.1.2.1.2.2.1.7.12".parse().unwrap();
        let pdu = Pdu {
            kind: PduKind::Response,
            request_id: 4242,
            error_status: 0,
            error_index: 0,
            varbinds: vec![
                (fdb.clone(), Value::NoSuchInstance),
                (status.clone(), Value::Integer(2)),
            ],
        };

        let message = decode_message(&encode_message(b"pub", &pdu)).unwrap();
        assert_eq!(message.community, b"pub".to_vec());
        assert_eq!(message.pdu.kind, PduKind::Response);
        assert_eq!(message.pdu.request_id, 4242);
        assert_eq!(message.pdu.varbinds[0], (fdb, Value::NoSuchInstance));
        assert_eq!(message.pdu.varbinds[1], (status, Value::Integer(2)));
        assert!(message.pdu.varbinds[0].1.is_exception());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_message(&[]).is_err());
        assert!(decode_message(&[0x30, 0x05, 0x02, 0x01]).is_err());
        assert!(decode_message(&[0x04, 0x00]).is_err());
    }

    #[test]
    fn test_oid_display_and_child() {
        let base: Oid = "1.3.6.1.2.1.17.7.1.2.2.1.2".parse().unwrap();
        let child = base.child(&[10, 1, 2, 3, 4, 5, 6]);
        assert!(child.starts_with(&base));
        assert_eq!(child.last(), Some(6));
        assert_eq!(base.to_string(), "1.3.6.1.2.1.17.7.1.2.2.1.2");
    }
}
