use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::rcon::{
    connection::Connection,
    error::{AuthError, ProtocolError, RconError},
    packet::{AUTH_FAILED_ID, Packet, PacketType},
};

/// Result of sending one command.
///
/// `NoOutput` is not a failure: plenty of servers apply side-effecting commands without ever
/// answering, so silence until the timeout means "sent, effect unknown".
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Output(String),
    NoOutput,
    Error(RconError),
}

/// Sends `command` once and waits for the response carrying its request id.
pub async fn execute(
    conn: &mut Connection,
    command: &str,
    command_timeout: Duration,
) -> DispatchOutcome {
    let request_id = conn.next_request_id();
    if let Err(e) = conn
        .send(&Packet::new(request_id, PacketType::ExecCommand, command))
        .await
    {
        return DispatchOutcome::Error(e);
    }

    let deadline = Instant::now() + command_timeout;
    let mut unrelated = 0;
    loop {
        match timeout_at(deadline, conn.recv()).await {
            Err(_) if unrelated == 0 => {
                debug!("No response to {} from {}", request_id, conn.addr());
                return DispatchOutcome::NoOutput;
            }
            Err(_) => {
                return DispatchOutcome::Error(
                    ProtocolError::Unanswered {
                        request_id,
                        received: unrelated,
                    }
                    .into(),
                );
            }
            Ok(Ok(packet))
                if packet.request_id == request_id
                    && packet.packet_type == PacketType::ResponseValue =>
            {
                let body = join_buffered_parts(conn, request_id, packet.body, deadline).await;
                return DispatchOutcome::Output(body);
            }
            Ok(Ok(packet)) if packet.request_id == AUTH_FAILED_ID => {
                return DispatchOutcome::Error(AuthError::BadCredentials.into());
            }
            Ok(Err(RconError::Protocol(ProtocolError::UnknownType {
                request_id: id,
                value,
                body,
            }))) if id == request_id => {
                debug!("Passing through packet type {} for {}", value, request_id);
                return DispatchOutcome::Output(body);
            }
            Ok(Ok(packet)) => {
                debug!(
                    "Skipping packet {} ({:?}) while waiting for {}",
                    packet.request_id, packet.packet_type, request_id
                );
                unrelated += 1;
            }
            Ok(Err(RconError::Protocol(ProtocolError::UnknownType { request_id: id, .. }))) => {
                debug!("Skipping unknown packet {} while waiting for {}", id, request_id);
                unrelated += 1;
            }
            Ok(Err(e)) => return DispatchOutcome::Error(e),
        }
    }
}

// Long responses arrive as several ResponseValue frames with the same id. Only frames already
// read off the socket are joined, so a complete response costs no extra wait.
async fn join_buffered_parts(
    conn: &mut Connection,
    request_id: i32,
    mut body: String,
    deadline: Instant,
) -> String {
    while conn.has_buffered() {
        match timeout_at(deadline, conn.recv()).await {
            Ok(Ok(packet))
                if packet.request_id == request_id
                    && packet.packet_type == PacketType::ResponseValue =>
            {
                body.push_str(&packet.body);
            }
            _ => break,
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rcon::{
        auth::authenticate,
        error::ErrorKind,
        fake_server::{CommandBehavior, FakeServer, SPLIT_RESPONSE},
    };

    const TIMEOUT: Duration = Duration::from_secs(2);
    const SHORT: Duration = Duration::from_millis(200);

    async fn session(behavior: CommandBehavior) -> Connection {
        let server = FakeServer::new("pw").command(behavior).start().await;
        let mut conn = Connection::connect("127.0.0.1", server.port, TIMEOUT)
            .await
            .unwrap();
        authenticate(&mut conn, "pw", TIMEOUT).await.unwrap();
        conn
    }

    #[tokio::test]
    async fn returns_matching_output() {
        let mut conn = session(CommandBehavior::Echo(Duration::ZERO)).await;

        let outcome = execute(&mut conn, "GiveItemToPlayer 1 saddle", TIMEOUT).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Output("ran: GiveItemToPlayer 1 saddle".to_owned())
        );
    }

    #[tokio::test]
    async fn split_response_is_joined() {
        let mut conn = session(CommandBehavior::Split).await;

        let outcome = execute(&mut conn, "ListPlayers", TIMEOUT).await;

        assert_eq!(outcome, DispatchOutcome::Output(SPLIT_RESPONSE.concat()));
    }

    #[tokio::test]
    async fn silence_is_no_output() {
        let mut conn = session(CommandBehavior::Silent).await;

        let outcome = execute(&mut conn, "SaveWorld", SHORT).await;

        assert_eq!(outcome, DispatchOutcome::NoOutput);
    }

    #[tokio::test]
    async fn unknown_type_with_matching_id_passes_through() {
        let mut conn = session(CommandBehavior::UnknownType).await;

        let outcome = execute(&mut conn, "ListPlayers", TIMEOUT).await;

        assert_eq!(outcome, DispatchOutcome::Output("aux output".to_owned()));
    }

    #[tokio::test]
    async fn only_unrelated_packets_is_an_error() {
        let mut conn = session(CommandBehavior::WrongId).await;

        let outcome = execute(&mut conn, "ListPlayers", SHORT).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Error(
                ProtocolError::Unanswered {
                    request_id: 2,
                    received: 1,
                }
                .into()
            )
        );
    }

    #[tokio::test]
    async fn malformed_reply_is_a_protocol_error() {
        let mut conn = session(CommandBehavior::Garbage).await;

        let outcome = execute(&mut conn, "ListPlayers", TIMEOUT).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Error(ProtocolError::InvalidSize(3).into())
        );
    }

    #[tokio::test]
    async fn hang_up_is_an_error() {
        let mut conn = session(CommandBehavior::HangUp).await;

        let outcome = execute(&mut conn, "ListPlayers", TIMEOUT).await;

        match outcome {
            DispatchOutcome::Error(e) => assert_eq!(e.kind(), ErrorKind::Protocol),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn closed_connection_is_an_error() {
        let mut conn = session(CommandBehavior::Echo(Duration::ZERO)).await;
        conn.close().await;

        let outcome = execute(&mut conn, "ListPlayers", TIMEOUT).await;

        match outcome {
            DispatchOutcome::Error(e) => assert_eq!(e.kind(), ErrorKind::Connection),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
