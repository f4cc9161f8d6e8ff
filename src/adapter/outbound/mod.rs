//! Outbound adapters (driven side).

pub mod http;
pub mod listener;
pub mod websocket;

pub use http::HttpPeer;
pub use listener::TracingListener;
pub use websocket::WebSocketConnector;
