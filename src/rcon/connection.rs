use std::time::Duration;

use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

use crate::rcon::{
    error::{ConnectionError, RconError},
    packet::Packet,
};

/// One TCP session with an RCON server.
///
/// The socket is owned here and released either by [`Connection::close`] or when the value is
/// dropped, which also covers a cancelled purchase future.
pub struct Connection {
    addr: String,
    stream: Option<BufReader<TcpStream>>,
    last_request_id: i32,
}

impl Connection {
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let addr = format!("{}:{}", host, port);
        debug!("Connecting to {}", addr);

        let stream = match timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ConnectionError::Unreachable {
                    addr,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(ConnectionError::TimedOut {
                    addr,
                    after: connect_timeout,
                });
            }
        };

        Ok(Connection {
            addr,
            stream: Some(BufReader::new(stream)),
            last_request_id: 0,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// True when bytes of a further frame were already read off the socket.
    pub fn has_buffered(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| !s.buffer().is_empty())
    }

    /// Ids start at 1 and never take the auth-failure value.
    pub fn next_request_id(&mut self) -> i32 {
        self.last_request_id = match self.last_request_id.checked_add(1) {
            Some(id) => id,
            None => 1,
        };
        self.last_request_id
    }

    pub async fn send(&mut self, packet: &Packet) -> Result<(), RconError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::Closed)?;
        let bytes = packet.encode();

        stream
            .get_mut()
            .write_all(&bytes)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;
        stream
            .get_mut()
            .flush()
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        debug!(
            "Sent packet {} ({:?}, {} bytes) to {}",
            packet.request_id,
            packet.packet_type,
            bytes.len(),
            self.addr
        );
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<Packet, RconError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::Closed)?;
        Ok(Packet::decode(stream).await?)
    }

    /// Safe to call repeatedly; shutdown failures are only logged.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.get_mut().shutdown().await {
                debug!("Shutdown of {} failed: {}", self.addr, e);
            }
            debug!("Closed connection to {}", self.addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tokio::net::TcpListener;

    use super::*;
    use crate::rcon::packet::PacketType;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn refused_port_is_a_connection_error() {
        let port = closed_port().await;

        let err = Connection::connect("127.0.0.1", port, Duration::from_secs(2))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, ConnectionError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn unroutable_host_fails_within_timeout() {
        let connect_timeout = Duration::from_millis(300);
        let started = Instant::now();

        // TEST-NET-1, never routed.
        let result = Connection::connect("192.0.2.1", 27020, connect_timeout).await;

        assert!(result.is_err());
        assert!(started.elapsed() < connect_timeout + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let mut conn = Connection::connect("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap();
        let _server_side = accept.await.unwrap();

        assert!(conn.is_open());
        conn.close().await;
        conn.close().await;
        assert!(!conn.is_open());

        let err = conn
            .send(&Packet::new(1, PacketType::ExecCommand, "noop"))
            .await
            .unwrap_err();
        assert_eq!(err, RconError::Connection(ConnectionError::Closed));
    }

    #[test]
    fn request_ids_increase_and_wrap_past_max() {
        let mut conn = Connection {
            addr: "test".to_owned(),
            stream: None,
            last_request_id: 0,
        };

        assert_eq!(conn.next_request_id(), 1);
        assert_eq!(conn.next_request_id(), 2);

        conn.last_request_id = i32::MAX;
        assert_eq!(conn.next_request_id(), 1);
    }
}
