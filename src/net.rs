//! Endpoint decoding for sender addresses.

use crate::errors::ConnectionError;
use std::net::SocketAddr;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// The decoded source of a received datagram: a textual host address and a
/// host-byte-order port.
///
/// Produced only by [`decode_endpoint`]; never persisted by this crate.
pub struct Endpoint {
	/// The sender's IP address, in dotted-decimal (IPv4) or standard textual
	/// IPv6 representation.
	pub host: String,

	/// The sender's port.
	pub port: u16,
}

impl std::fmt::Display for Endpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.host, self.port)
	}
}

/// Converts a native socket address into an [`Endpoint`].
///
/// IPv4 and IPv6 senders decode to their textual address and port; any other
/// address family is [`ConnectionError::EndpointDecodeFailed`], never a panic.
pub fn decode_endpoint(addr: &socket2::SockAddr) -> Result<Endpoint, ConnectionError> {
	match addr.as_socket() {
		Some(SocketAddr::V4(addr)) => Ok(Endpoint {
			host: addr.ip().to_string(),
			port: addr.port(),
		}),

		Some(SocketAddr::V6(addr)) => Ok(Endpoint {
			host: addr.ip().to_string(),
			port: addr.port(),
		}),

		None => Err(ConnectionError::EndpointDecodeFailed),
	}
}
