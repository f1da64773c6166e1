// Shared primitives for one-time server bootstrapping across integration
// tests. Grounded in the teacher's `tests/support/mod.rs::ensure_server`
// (`OnceLock` + dedicated background thread + polling readiness), extended
// with a WebSocket client helper since this system's only endpoint worth
// exercising end to end is `/ws`.
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

static SERVER_URL: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Ensure the test server is running and return its `ws://` base URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("ws://{}", addr));
                game_arcade::run(listener).await.expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL.get().expect("server url initialized").as_str()
}

fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("ws://")
        .expect("base url should use ws://");

    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}

/// Open a WebSocket connection to the test server's `/ws` endpoint.
pub async fn connect() -> WsStream {
    let base = ensure_server();
    let (stream, _response) = connect_async(format!("{base}/ws"))
        .await
        .expect("websocket handshake should succeed");
    stream
}

pub async fn send_json(stream: &mut WsStream, value: &serde_json::Value) {
    stream
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send should succeed");
}

pub async fn recv_json(stream: &mut WsStream) -> serde_json::Value {
    loop {
        match stream.next().await.expect("stream should not end").expect("valid ws frame") {
            Message::Text(text) => return serde_json::from_str(&text).expect("valid json frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
