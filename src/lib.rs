#![warn(missing_docs)]
#![deny(unused_mut)]

//! An embeddable server-side implementation of the WebSocket wire protocol
//! (RFC6455), designed to sit on top of an existing blocking HTTP
//! request/response pipeline.
//!
//! The embedding layer keeps ownership of sockets and HTTP parsing. Once it
//! has a parsed request it offers the request and the raw stream to
//! [`Server::handle_upgrade`]; requests that are not WebSocket upgrades are
//! handed straight back. For upgrades, the server validates the handshake,
//! writes the `101 Switching Protocols` response and runs the connection's
//! read loop on the calling thread, fanning lifecycle events
//! (handshake, connect, message, pong, error, close) out to registered
//! [`Handler`]s in registration order.
//!
//! The lower-level pieces are usable on their own: the [`frame`] module
//! reads and writes single RFC6455 frames with masking and all three
//! payload length encodings, and [`Connection`] drives a framed session
//! over anything that implements `Read + Write`.
//!
//! Compression extensions, sub-protocol negotiation and origin checking are
//! deliberately unsupported; a frame with any RSV bit set fails the
//! connection.

#[macro_use]
extern crate bitflags;

pub mod connection;
pub mod frame;
pub mod handler;
pub mod header;
pub mod message;
pub mod result;
pub mod server;
pub mod stream;

#[cfg(test)]
mod test_util;

pub use crate::connection::{Connection, State};
pub use crate::handler::Handler;
pub use crate::message::Message;
pub use crate::result::{WebSocketError, WebSocketResult};
pub use crate::server::{Request, Server, UpgradeRequest, UpgradeStatus};
pub use crate::stream::{NetworkStream, ReadWritePair, Stream};
