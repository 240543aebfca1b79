use std::io;

#[derive(Debug, Error)]
/// An error occurred on a [`BroadcastConnection`](crate::BroadcastConnection).
///
/// Failures from the synchronous surface (`open`, `send_broadcast`) are
/// returned directly; failures on the receive path are delivered through the
/// registered error handler. Every reported error closes the connection, so
/// after observing one of these the socket is gone and the next send will
/// lazily open a fresh one.
pub enum ConnectionError {
	#[error("failed to create broadcast socket: {0}")]
	/// The underlying socket creation, configuration or bind call failed.
	SocketCreationFailed(#[source] io::Error),

	#[error("failed to reopen broadcast socket: {0}")]
	/// A lazy re-open after a previous close failed.
	ReopeningSocketFailed(#[source] Box<ConnectionError>),

	#[error("failed to send broadcast datagram: {0}")]
	/// The transmit call returned an error.
	SendingMessageFailed(#[source] io::Error),

	#[error("failed to receive datagram: {0}")]
	/// The receive call returned an error, or a zero-byte read was taken as
	/// an end-of-stream indication (carried as [`io::ErrorKind::UnexpectedEof`]).
	ReceiveFailed(#[source] io::Error),

	#[error("unsupported or malformed sender address")]
	/// The sender's address family was neither IPv4 nor IPv6.
	EndpointDecodeFailed,

	#[error("{0}")]
	/// A lower-level failure not otherwise classified.
	Underlying(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ConnectionError {
	/// The originating OS error code, where one exists.
	pub fn os_error(&self) -> Option<i32> {
		match self {
			Self::SocketCreationFailed(err) | Self::SendingMessageFailed(err) | Self::ReceiveFailed(err) => err.raw_os_error(),
			Self::ReopeningSocketFailed(cause) => cause.os_error(),
			Self::EndpointDecodeFailed | Self::Underlying(_) => None,
		}
	}

	/// Whether this is the receive path's end-of-stream indication
	/// (a zero-byte read, atypical for UDP).
	pub fn is_eof(&self) -> bool {
		matches!(self, Self::ReceiveFailed(err) if err.kind() == io::ErrorKind::UnexpectedEof)
	}
}
