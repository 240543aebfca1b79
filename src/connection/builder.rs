use super::{wildcard, BroadcastConnection, DataHandler, ErrorHandler};
use crate::errors::ConnectionError;
use std::{
	net::{Ipv4Addr, SocketAddr, SocketAddrV4},
	sync::{atomic::AtomicBool, Arc, Mutex},
};

/// Builds a [`BroadcastConnection`].
///
/// Building is infallible and side-effect free; socket errors surface later
/// through [`send_broadcast`](BroadcastConnection::send_broadcast),
/// [`open`](BroadcastConnection::open) or the error handler.
pub struct BroadcastConnectionBuilder {
	port: u16,
	destination: Ipv4Addr,
	data_handler: Option<DataHandler>,
	error_handler: Option<ErrorHandler>,
}

impl BroadcastConnectionBuilder {
	/// Starts a builder for a connection broadcasting to `port`, targeting
	/// the all-ones broadcast address.
	pub fn new(port: u16) -> Self {
		Self {
			port,
			destination: Ipv4Addr::BROADCAST,
			data_handler: None,
			error_handler: None,
		}
	}

	/// Overrides the broadcast destination address.
	pub fn destination(mut self, destination: Ipv4Addr) -> Self {
		self.destination = destination;
		self
	}

	/// Targets the loopback segment's broadcast address instead of the
	/// all-ones address, so datagrams stay on this host. Intended for
	/// same-host testing.
	pub fn loopback(self) -> Self {
		self.destination(Ipv4Addr::new(127, 255, 255, 255))
	}

	/// Registers the handler invoked for each received datagram with
	/// `(source host, source port, payload)`.
	pub fn data_handler<F>(mut self, handler: F) -> Self
	where
		F: Fn(&str, u16, &[u8]) + Send + Sync + 'static,
	{
		self.data_handler = Some(Arc::new(handler));
		self
	}

	/// Registers the handler invoked for receive-path failures.
	pub fn error_handler<F>(mut self, handler: F) -> Self
	where
		F: Fn(ConnectionError) + Send + Sync + 'static,
	{
		self.error_handler = Some(Arc::new(handler));
		self
	}

	pub fn build(self) -> BroadcastConnection {
		let BroadcastConnectionBuilder {
			port,
			destination,
			data_handler,
			error_handler,
		} = self;

		let destination = SocketAddrV4::new(destination, port);

		BroadcastConnection {
			destination,
			native_destination: socket2::SockAddr::from(SocketAddr::V4(destination)),
			local: wildcard(port),
			data_handler,
			error_handler,
			state: Arc::new(Mutex::new(None)),
			opened_before: AtomicBool::new(false),
		}
	}
}
