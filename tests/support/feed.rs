//! One-shot WebSocket server for exercising `WebSocketConnector`.
//!
//! Accepts a single connection, completes the handshake and hands the
//! socket to the test's session closure.

use std::future::Future;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;

pub type ServerSocket = WebSocketStream<TcpStream>;

/// Serve one WebSocket session and return its `ws://` URL.
pub async fn serve_once<F, Fut>(session: F) -> String
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        session(ws).await;
    });

    format!("ws://{addr}/")
}

/// Read until the client goes away.
pub async fn drain(mut ws: ServerSocket) {
    while let Some(Ok(_)) = ws.next().await {}
}
