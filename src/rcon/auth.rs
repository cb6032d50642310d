use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::rcon::{
    connection::Connection,
    error::{AuthError, ProtocolError, RconError},
    packet::{AUTH_FAILED_ID, Packet, PacketType},
};

// Some servers put an empty ResponseValue in front of the AuthResponse, so one extra read is
// allowed before giving up.
const AUTH_READS: usize = 2;

/// Runs the password exchange on a fresh connection. The whole handshake shares one deadline.
pub async fn authenticate(
    conn: &mut Connection,
    password: &str,
    auth_timeout: Duration,
) -> Result<(), AuthError> {
    let deadline = Instant::now() + auth_timeout;
    let request_id = conn.next_request_id();

    conn.send(&Packet::new(request_id, PacketType::Auth, password))
        .await
        .map_err(interrupted)?;

    let mut received_id = request_id;
    for _ in 0..AUTH_READS {
        let (reply_id, reply_type) = match timeout_at(deadline, conn.recv()).await {
            Err(_) => return Err(AuthError::TimedOut(auth_timeout)),
            Ok(Ok(packet)) => (packet.request_id, Some(packet.packet_type)),
            Ok(Err(RconError::Protocol(ProtocolError::UnknownType { request_id, .. }))) => {
                (request_id, None)
            }
            Ok(Err(e)) => return Err(interrupted(e)),
        };

        if reply_id == AUTH_FAILED_ID {
            return Err(AuthError::BadCredentials);
        }
        if reply_id == request_id && reply_type == Some(PacketType::AuthResponse) {
            debug!("Authenticated with {}", conn.addr());
            return Ok(());
        }

        debug!(
            "Skipping auth reply {} ({:?}) from {}",
            reply_id,
            reply_type,
            conn.addr()
        );
        received_id = reply_id;
    }

    Err(AuthError::UnexpectedResponse {
        request_id,
        received_id,
    })
}

fn interrupted(e: RconError) -> AuthError {
    AuthError::Interrupted(e.to_string())
}
