//! Helpers shared by the integration tests.

#![allow(dead_code, clippy::panic)]

use std::cell::{Cell, RefCell};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use shared_ws::config::HostConfig;
use shared_ws::domain::{ConnectionId, EventSink, Port};
use shared_ws::listener::Listener;
use shared_ws::server::Registry;

/// Registry bound to the loopback interface.
pub fn local_registry() -> Registry {
    Registry::new(HostConfig {
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ..HostConfig::default()
    })
}

/// A port that was free a moment ago.
pub fn free_port() -> Port {
    let Ok(reserved) = std::net::TcpListener::bind("127.0.0.1:0") else {
        panic!("bind ephemeral port");
    };
    let Ok(addr) = reserved.local_addr() else {
        panic!("ephemeral port addr");
    };
    let Ok(port) = Port::new(addr.port()) else {
        panic!("valid port");
    };
    port
}

/// Sink that records everything it is told.
#[derive(Debug, Default)]
pub struct Recorder {
    pub messages: RefCell<Vec<String>>,
    pub errors: RefCell<Vec<String>>,
    pub opened: Cell<usize>,
    pub closed: Cell<usize>,
}

impl EventSink for Recorder {
    fn on_message(&self, text: &str) {
        self.messages.borrow_mut().push(text.to_string());
    }

    fn on_error(&self, description: &str) {
        self.errors.borrow_mut().push(description.to_string());
    }

    fn on_open(&self, _connection: ConnectionId) {
        self.opened.set(self.opened.get() + 1);
    }

    fn on_close(&self, _connection: ConnectionId) {
        self.closed.set(self.closed.get() + 1);
    }
}

/// Polls `listener` on the test thread until `done` holds or time runs out.
pub fn poll_until(listener: &Listener, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        listener.poll();
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

/// A WebSocket peer running on its own thread and runtime.
///
/// Every text frame it receives, and finally `close:<code>`, is forwarded
/// to `inbox`.
pub struct Client {
    pub inbox: mpsc::Receiver<String>,
    pub thread: JoinHandle<()>,
}

impl Client {
    /// Connects to `port` and sends `outgoing` right after the handshake.
    pub fn connect(port: Port, outgoing: &[&str]) -> Self {
        Self::spawn(port, outgoing, false)
    }

    /// Connects, sends `outgoing`, then closes from the client side.
    pub fn connect_and_leave(port: Port, outgoing: &[&str]) -> Self {
        Self::spawn(port, outgoing, true)
    }

    fn spawn(port: Port, outgoing: &[&str], leave: bool) -> Self {
        let (tx, inbox) = mpsc::channel();
        let url = format!("ws://127.0.0.1:{}/", port.get());
        let outgoing: Vec<String> = outgoing.iter().map(|s| (*s).to_string()).collect();

        let thread = thread::spawn(move || {
            let Ok(rt) = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            else {
                return;
            };
            rt.block_on(async move {
                let session = async move {
                    let Ok((mut ws, _)) = connect_async(url.as_str()).await else {
                        let _ = tx.send("connect-failed".to_string());
                        return;
                    };
                    for text in outgoing {
                        if ws.send(Message::text(text)).await.is_err() {
                            return;
                        }
                    }
                    if leave {
                        let _ = ws.close(None).await;
                    }
                    while let Some(frame) = ws.next().await {
                        match frame {
                            Ok(Message::Text(text)) => {
                                let _ = tx.send(text.as_str().to_string());
                            }
                            Ok(Message::Close(frame)) => {
                                let code = frame.map_or(0, |f| u16::from(f.code));
                                let _ = tx.send(format!("close:{code}"));
                                break;
                            }
                            Ok(_) => {}
                            Err(_) => break,
                        }
                    }
                };
                let _ = tokio::time::timeout(Duration::from_secs(10), session).await;
            });
        });

        Self { inbox, thread }
    }

    /// Polls `listener` until the client has received `expected`.
    pub fn expect(&self, listener: &Listener, expected: &str) -> bool {
        let mut seen = Vec::new();
        poll_until(listener, || {
            while let Ok(text) = self.inbox.try_recv() {
                seen.push(text);
            }
            seen.iter().any(|t| t == expected)
        })
    }

    /// Waits (without polling anything) for the client to receive `expected`.
    pub fn expect_without_polling(&self, expected: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match self.inbox.recv_timeout(left) {
                Ok(text) if text == expected => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
        false
    }
}
