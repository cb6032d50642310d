//! Scripted RCON server on loopback for tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};

use crate::rcon::packet::{AUTH_FAILED_ID, Packet, PacketType};

/// Frames sent for `CommandBehavior::Split`.
pub(crate) const SPLIT_RESPONSE: [&str; 2] =
    ["0. Rex, 76561198000000000\n", "1. Raptor, 76561198000000001\n"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum AuthBehavior {
    Normal,
    /// Empty ResponseValue before the real AuthResponse.
    SpuriousFirst,
    /// Two unrelated packets before the real AuthResponse.
    StrayTwice,
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CommandBehavior {
    /// Replies `ran: <command>` after the given delay.
    Echo(Duration),
    Silent,
    HangUp,
    WrongId,
    Garbage,
    UnknownType,
    /// Answers in two ResponseValue frames written together.
    Split,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeServer {
    pub password: String,
    pub auth: AuthBehavior,
    pub command: CommandBehavior,
}

pub(crate) struct RunningServer {
    pub port: u16,
    accepted: Arc<AtomicUsize>,
    closed_by_client: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl RunningServer {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Waits up to a second for `n` sessions to see the client close its end.
    pub async fn wait_closed_by_client(&self, n: usize) -> usize {
        let _ = tokio::time::timeout(Duration::from_secs(1), async {
            while self.closed_by_client.load(Ordering::SeqCst) < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        self.closed_by_client.load(Ordering::SeqCst)
    }
}

impl FakeServer {
    pub fn new(password: &str) -> Self {
        FakeServer {
            password: password.to_owned(),
            auth: AuthBehavior::Normal,
            command: CommandBehavior::Echo(Duration::ZERO),
        }
    }

    pub fn auth(mut self, auth: AuthBehavior) -> Self {
        self.auth = auth;
        self
    }

    pub fn command(mut self, command: CommandBehavior) -> Self {
        self.command = command;
        self
    }

    pub async fn start(self) -> RunningServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let closed_by_client = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(Mutex::new(vec![]));

        let accepted_c = accepted.clone();
        let closed_c = closed_by_client.clone();
        let commands_c = commands.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accepted_c.fetch_add(1, Ordering::SeqCst);
                let server = self.clone();
                let closed = closed_c.clone();
                let commands = commands_c.clone();
                tokio::spawn(async move {
                    if server.serve(stream, commands).await {
                        closed.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        RunningServer {
            port,
            accepted,
            closed_by_client,
            commands,
        }
    }

    // Returns true when the session ended because the client went away.
    async fn serve(self, mut stream: TcpStream, commands: Arc<Mutex<Vec<String>>>) -> bool {
        loop {
            let Ok(request) = Packet::decode_request(&mut stream).await else {
                return true;
            };
            let id = request.request_id;
            match request.packet_type {
                PacketType::Auth => {
                    let mut replies = vec![];
                    match self.auth {
                        AuthBehavior::Silent => continue,
                        AuthBehavior::SpuriousFirst => {
                            replies.push(Packet::new(id, PacketType::ResponseValue, ""));
                        }
                        AuthBehavior::StrayTwice => {
                            replies.push(Packet::new(id + 50, PacketType::ResponseValue, ""));
                            replies.push(Packet::new(id + 51, PacketType::ResponseValue, ""));
                        }
                        AuthBehavior::Normal => {}
                    }
                    let answer_id = if request.body == self.password {
                        id
                    } else {
                        AUTH_FAILED_ID
                    };
                    replies.push(Packet::new(answer_id, PacketType::AuthResponse, ""));

                    for reply in replies {
                        if stream.write_all(&reply.encode()).await.is_err() {
                            return false;
                        }
                    }
                }
                PacketType::ExecCommand => {
                    commands.lock().unwrap().push(request.body.clone());
                    let bytes = match self.command {
                        CommandBehavior::Echo(delay) => {
                            tokio::time::sleep(delay).await;
                            let body = format!("ran: {}", request.body);
                            Packet::new(id, PacketType::ResponseValue, body).encode()
                        }
                        CommandBehavior::Silent => continue,
                        CommandBehavior::HangUp => return false,
                        CommandBehavior::WrongId => {
                            Packet::new(id + 100, PacketType::ResponseValue, "stray").encode()
                        }
                        CommandBehavior::Garbage => 3i32.to_le_bytes().to_vec(),
                        CommandBehavior::UnknownType => raw_frame(id, 9, b"aux output"),
                        CommandBehavior::Split => SPLIT_RESPONSE
                            .iter()
                            .flat_map(|part| {
                                Packet::new(id, PacketType::ResponseValue, *part).encode()
                            })
                            .collect(),
                    };
                    if stream.write_all(&bytes).await.is_err() {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

fn raw_frame(request_id: i32, type_value: i32, body: &[u8]) -> Vec<u8> {
    let mut buf = (10 + body.len() as i32).to_le_bytes().to_vec();
    buf.extend_from_slice(&request_id.to_le_bytes());
    buf.extend_from_slice(&type_value.to_le_bytes());
    buf.extend_from_slice(body);
    buf.extend_from_slice(&[0, 0]);
    buf
}
