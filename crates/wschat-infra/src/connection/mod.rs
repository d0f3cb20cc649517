//! Network implementations of the `wschat-core` connection traits.

pub mod websocket;

pub use websocket::{WsConnection, WsConnector};
