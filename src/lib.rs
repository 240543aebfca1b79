//! 📢 UDP broadcast connections for LAN announcement & discovery.
//!
//! A [`BroadcastConnection`] wraps one UDP socket that is used both to send
//! broadcast datagrams to a fixed port on the local network segment and to
//! receive datagrams addressed to that port. Construction is side-effect
//! free; the socket is opened lazily on the first send (or via an explicit
//! [`BroadcastConnection::open`]). Inbound datagrams are delivered on a
//! background reactor thread to a caller-supplied data handler, together
//! with the sender's decoded [`Endpoint`]. Failures on the receive path are
//! delivered to an error handler and close the connection; the next send
//! reopens it.
//!
//! ```no_run
//! use loudhailer::BroadcastConnectionBuilder;
//!
//! let conn = BroadcastConnectionBuilder::new(5559)
//!     .data_handler(|host, port, payload| {
//!         println!("{}:{} says {:?}", host, port, payload);
//!     })
//!     .error_handler(|err| eprintln!("broadcast error: {err}"))
//!     .build();
//!
//! conn.send_broadcast_text("Hello!").unwrap();
//! ```

#[macro_use]
extern crate thiserror;

mod socket;

pub mod connection;
pub mod errors;
pub mod net;

pub use connection::{BroadcastConnection, BroadcastConnectionBuilder};
pub use errors::ConnectionError;
pub use net::Endpoint;

/// Capacity of the buffer used to receive one datagram.
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Practical payload ceiling for broadcast datagrams.
///
/// Payloads up to this size stay comfortably below the path MTU of any real
/// network segment and will never be fragmented. Larger payloads are sent
/// as-is; keeping under this limit is the caller's responsibility.
pub const RECOMMENDED_MAX_PAYLOAD: usize = 512;

#[cfg(test)]
mod tests;
