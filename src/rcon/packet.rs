//! Source RCON wire frames.
//!
//! ```text
//! i32 size | i32 request_id | i32 type | body (utf-8) | 0x00 | 0x00
//! ```
//!
//! All integers are little-endian and `size` counts everything after itself.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::rcon::error::ProtocolError;

/// id + type + the two terminators.
const HEADER_AND_TERMINATORS: i32 = 4 + 4 + 2;

/// Upper bound accepted for a single inbound frame.
pub const MAX_PACKET_SIZE: i32 = 64 * 1024;

/// Request id the server echoes when authentication fails.
pub const AUTH_FAILED_ID: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Auth,
    AuthResponse,
    ExecCommand,
    ResponseValue,
}

impl PacketType {
    pub fn wire_value(self) -> i32 {
        match self {
            PacketType::Auth => 3,
            PacketType::AuthResponse | PacketType::ExecCommand => 2,
            PacketType::ResponseValue => 0,
        }
    }

    // `2` means AuthResponse coming from the server and ExecCommand going to it.
    fn from_server(value: i32) -> Option<Self> {
        match value {
            2 => Some(PacketType::AuthResponse),
            0 => Some(PacketType::ResponseValue),
            _ => None,
        }
    }

    #[cfg(test)]
    fn from_client(value: i32) -> Option<Self> {
        match value {
            3 => Some(PacketType::Auth),
            2 => Some(PacketType::ExecCommand),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub request_id: i32,
    pub packet_type: PacketType,
    pub body: String,
}

impl Packet {
    pub fn new(request_id: i32, packet_type: PacketType, body: impl Into<String>) -> Self {
        Packet {
            request_id,
            packet_type,
            body: body.into(),
        }
    }

    pub fn size(&self) -> i32 {
        HEADER_AND_TERMINATORS + self.body.len() as i32
    }

    /// A body with an interior NUL is sent as-is; the peer will cut it at the NUL.
    pub fn encode(&self) -> Vec<u8> {
        let size = self.size();
        let mut buf = Vec::with_capacity(size as usize + 4);
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.request_id.to_le_bytes());
        buf.extend_from_slice(&self.packet_type.wire_value().to_le_bytes());
        buf.extend_from_slice(self.body.as_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf
    }

    /// Reads one frame sent by a server.
    pub async fn decode<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Packet, ProtocolError> {
        let frame = read_frame(reader).await?;
        frame.into_packet(PacketType::from_server)
    }

    /// Reads one frame sent by a client, as a server would.
    #[cfg(test)]
    pub async fn decode_request<R: AsyncRead + Unpin>(
        reader: &mut R,
    ) -> Result<Packet, ProtocolError> {
        let frame = read_frame(reader).await?;
        frame.into_packet(PacketType::from_client)
    }
}

struct RawFrame {
    request_id: i32,
    type_value: i32,
    body: String,
}

impl RawFrame {
    fn into_packet(
        self,
        resolve: impl Fn(i32) -> Option<PacketType>,
    ) -> Result<Packet, ProtocolError> {
        match resolve(self.type_value) {
            Some(packet_type) => Ok(Packet {
                request_id: self.request_id,
                packet_type,
                body: self.body,
            }),
            None => Err(ProtocolError::UnknownType {
                request_id: self.request_id,
                value: self.type_value,
                body: self.body,
            }),
        }
    }
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<RawFrame, ProtocolError> {
    let mut size_buf = [0u8; 4];
    reader
        .read_exact(&mut size_buf)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ProtocolError::TruncatedHeader,
            _ => ProtocolError::Io(e.to_string()),
        })?;

    let size = i32::from_le_bytes(size_buf);
    if !(HEADER_AND_TERMINATORS..=MAX_PACKET_SIZE).contains(&size) {
        return Err(ProtocolError::InvalidSize(size));
    }

    let mut payload = vec![0u8; size as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ProtocolError::Truncated { declared: size },
            _ => ProtocolError::Io(e.to_string()),
        })?;

    let request_id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let type_value = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);

    let rest = &payload[8..];
    let end = rest.iter().position(|b| *b == 0).unwrap_or(rest.len());
    let body = String::from_utf8_lossy(&rest[..end]).into_owned();

    Ok(RawFrame {
        request_id,
        type_value,
        body,
    })
}
