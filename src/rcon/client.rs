use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{debug, warn};

use crate::rcon::{
    auth::authenticate,
    connection::Connection,
    dispatch::{DispatchOutcome, execute},
};

/// Game server address and credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct RconTarget {
    pub host: String,
    pub port: u16,
    pub password: String,
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Each step gets its own budget; there is no overall deadline.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RconTimeouts {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "connect_timeout_ms", default = "default_timeout")]
    pub connect: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "auth_timeout_ms", default = "default_timeout")]
    pub auth: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "command_timeout_ms", default = "default_timeout")]
    pub command: Duration,
}

impl Default for RconTimeouts {
    fn default() -> Self {
        RconTimeouts {
            connect: default_timeout(),
            auth: default_timeout(),
            command: default_timeout(),
        }
    }
}

/// Sends a single command to a game server.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn send_command(&self, target: &RconTarget, command: &str) -> DispatchOutcome;
}

/// Opens a fresh connection per command: connect, authenticate, execute, close.
pub struct RconClient {
    timeouts: RconTimeouts,
}

impl RconClient {
    pub fn new(timeouts: RconTimeouts) -> Self {
        RconClient { timeouts }
    }

    async fn run(&self, conn: &mut Connection, password: &str, command: &str) -> DispatchOutcome {
        if let Err(e) = authenticate(conn, password, self.timeouts.auth).await {
            return DispatchOutcome::Error(e.into());
        }
        execute(conn, command, self.timeouts.command).await
    }
}

#[async_trait]
impl CommandTransport for RconClient {
    async fn send_command(&self, target: &RconTarget, command: &str) -> DispatchOutcome {
        let mut conn = match Connection::connect(&target.host, target.port, self.timeouts.connect)
            .await
        {
            Ok(conn) => conn,
            Err(e) => {
                warn!("RCON connect failed: {}", e);
                return DispatchOutcome::Error(e.into());
            }
        };

        let outcome = self.run(&mut conn, &target.password, command).await;
        conn.close().await;

        match &outcome {
            DispatchOutcome::Error(e) => warn!("RCON {} error on {}: {}", e.kind(), conn.addr(), e),
            _ => debug!("RCON command done on {}", conn.addr()),
        }
        outcome
    }
}
