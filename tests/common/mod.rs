//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use dynamic_namespaces::config::ServerConfig;
use dynamic_namespaces::http::{ClientPacket, HttpServer, ServerPacket};
use dynamic_namespaces::lifecycle::Shutdown;
use dynamic_namespaces::namespace::ChannelDirectory;
use dynamic_namespaces::net::{Connection, ConnectionId};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Connection that records everything the channel layer sends to it.
pub struct MockConnection {
    id: ConnectionId,
    host: Option<String>,
    pub connected: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<(String, String)>>,
}

impl MockConnection {
    pub fn new(host: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            host: host.map(str::to_string),
            connected: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        })
    }
}

impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn host(&self) -> Option<String> {
        self.host.clone()
    }

    fn send_connect(&self, channel: &str) {
        self.connected.lock().push(channel.to_string());
    }

    fn send_error(&self, channel: &str, message: &str) {
        self.errors.lock().push((channel.to_string(), message.to_string()));
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub directory: ChannelDirectory,
    pub shutdown: Arc<Shutdown>,
}

/// Start a server on a random port with the directory built from `config`.
pub async fn start_server(config: ServerConfig) -> TestServer {
    let directory = config.namespaces.build_directory().expect("directory from config");
    start_server_with(config, directory).await
}

/// Start a server on a random port over an already configured directory.
pub async fn start_server_with(config: ServerConfig, directory: ChannelDirectory) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());

    let server = HttpServer::new(&config, directory.clone(), Arc::clone(&shutdown));
    tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });

    TestServer { addr, directory, shutdown }
}

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open `/ws`, optionally overriding the Host header.
pub async fn connect_ws(addr: SocketAddr, host: Option<&str>) -> WsClient {
    let mut request = format!("ws://{}/ws", addr).into_client_request().unwrap();
    if let Some(host) = host {
        request.headers_mut().insert("Host", host.parse().unwrap());
    }
    let (stream, _) = tokio::time::timeout(TIMEOUT, tokio_tungstenite::connect_async(request))
        .await
        .expect("connect timed out")
        .expect("websocket handshake");
    stream
}

pub async fn send(ws: &mut WsClient, packet: &ClientPacket) {
    let text = serde_json::to_string(packet).unwrap();
    ws.send(Message::Text(text.into())).await.unwrap();
}

/// Next server packet, skipping control frames.
pub async fn recv(ws: &mut WsClient) -> ServerPacket {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, ws.next())
            .await
            .expect("no packet before timeout")
            .expect("stream ended")
            .expect("read error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

pub fn connect(nsp: &str) -> ClientPacket {
    ClientPacket::Connect { nsp: nsp.to_string() }
}

pub fn disconnect(nsp: &str) -> ClientPacket {
    ClientPacket::Disconnect { nsp: nsp.to_string() }
}

pub fn connected(nsp: &str) -> ServerPacket {
    ServerPacket::Connected { nsp: nsp.to_string() }
}

/// Poll `check` until it holds or the timeout elapses.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
