//! The broadcast connection: socket lifecycle, send path and receive path.

use crate::{
	errors::ConnectionError,
	net::{self, Endpoint},
	socket, RECV_BUFFER_SIZE,
};
use log::{debug, trace, warn};
use std::{
	io,
	net::{Ipv4Addr, SocketAddr, SocketAddrV4},
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Mutex,
	},
};
use tokio::{io::Interest, net::UdpSocket as AsyncUdpSocket};

mod builder;
pub use builder::BroadcastConnectionBuilder;

/// Handles one received datagram: `(source host, source port, payload)`.
///
/// Runs on the connection's reactor thread and must not block.
pub type DataHandler = Arc<dyn Fn(&str, u16, &[u8]) + Send + Sync + 'static>;

/// Handles an asynchronous receive-path failure.
///
/// Runs on the connection's reactor thread and must not block. By the time
/// the handler is invoked the connection has already closed itself, so
/// re-sending from inside the handler opens a fresh socket.
pub type ErrorHandler = Arc<dyn Fn(ConnectionError) + Send + Sync + 'static>;

/// A UDP broadcast connection.
///
/// Construction records the broadcast destination and handlers but performs
/// no socket creation; the socket is opened lazily by the first
/// [`send_broadcast`](Self::send_broadcast) (or an explicit
/// [`open`](Self::open)) and stays open, receiving datagrams addressed to
/// the configured port, until [`close`](Self::close), drop, or a
/// receive-path failure.
pub struct BroadcastConnection {
	// Both addresses are fixed at construction; the destination's port is
	// converted to network byte order once, inside the stored SockAddr.
	destination: SocketAddrV4,
	native_destination: socket2::SockAddr,
	local: SocketAddrV4,
	data_handler: Option<DataHandler>,
	error_handler: Option<ErrorHandler>,
	state: Arc<Mutex<Option<OpenSocket>>>,
	opened_before: AtomicBool,
}

impl BroadcastConnection {
	/// Creates a handler-less connection broadcasting to `port`.
	///
	/// Use [`BroadcastConnectionBuilder`] to register data and error
	/// handlers.
	pub fn new(port: u16) -> Self {
		BroadcastConnectionBuilder::new(port).build()
	}

	/// The port broadcasts are sent to and received on.
	pub fn port(&self) -> u16 {
		self.destination.port()
	}

	/// Whether the underlying socket is currently open.
	pub fn is_open(&self) -> bool {
		self.state.lock().unwrap().is_some()
	}

	/// The local address of the underlying socket, if it is open.
	pub fn local_addr(&self) -> Option<SocketAddr> {
		self.state
			.lock()
			.unwrap()
			.as_ref()
			.and_then(|open| open.socket.local_addr().ok())
	}

	/// Opens the underlying socket and starts listening for inbound
	/// datagrams. No-op if the socket is already open.
	///
	/// Calling this is only needed for a receive-only connection;
	/// [`send_broadcast`](Self::send_broadcast) opens the socket on demand.
	pub fn open(&self) -> Result<(), ConnectionError> {
		self.ensure_open().map(|_| ())
	}

	/// Closes the underlying socket and stops the receive loop. No-op if
	/// the socket is not open. Also runs on drop.
	pub fn close(&self) {
		let open = self.state.lock().unwrap().take();
		if open.is_some() {
			debug!("closing broadcast socket on port {}", self.port());
		}
		drop(open);
	}

	/// Sends `payload` as one broadcast datagram to the configured port,
	/// opening the socket first if necessary.
	///
	/// The payload should stay under
	/// [`RECOMMENDED_MAX_PAYLOAD`](crate::RECOMMENDED_MAX_PAYLOAD) bytes to
	/// avoid IP fragmentation; larger payloads are transmitted as-is. A
	/// short send is logged, never silent. On a transmit error the
	/// connection closes itself and the next send reopens it.
	pub fn send_broadcast(&self, payload: &[u8]) -> Result<(), ConnectionError> {
		let socket = self.ensure_open()?;

		match socket::send_to_addr(&socket, payload, &self.native_destination) {
			Ok(sent) => {
				if sent < payload.len() {
					warn!("short send: {sent} of {} bytes reached the socket", payload.len());
				}
				trace!("sent {sent} bytes to {}", self.destination);
				Ok(())
			}

			Err(err) => {
				self.close();
				Err(ConnectionError::SendingMessageFailed(err))
			}
		}
	}

	/// Sends `text` as UTF-8 bytes via [`send_broadcast`](Self::send_broadcast).
	pub fn send_broadcast_text(&self, text: &str) -> Result<(), ConnectionError> {
		self.send_broadcast(text.as_bytes())
	}

	fn ensure_open(&self) -> Result<Arc<AsyncUdpSocket>, ConnectionError> {
		let mut state = self.state.lock().unwrap();
		if let Some(open) = state.as_ref() {
			return Ok(open.socket.clone());
		}

		let reopening = self.opened_before.load(Ordering::Relaxed);
		let open = OpenSocket::open(
			self.local,
			self.data_handler.clone(),
			self.error_handler.clone(),
			self.state.clone(),
		)
		.map_err(|err| {
			if reopening {
				ConnectionError::ReopeningSocketFailed(Box::new(err))
			} else {
				err
			}
		})?;

		let socket = open.socket.clone();
		*state = Some(open);
		self.opened_before.store(true, Ordering::Relaxed);

		Ok(socket)
	}
}

impl Drop for BroadcastConnection {
	fn drop(&mut self) {
		self.close();
	}
}

impl std::fmt::Debug for BroadcastConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BroadcastConnection")
			.field("destination", &self.destination)
			.field("open", &self.is_open())
			.finish()
	}
}

/// The open half of a connection: the shared socket handle plus the reactor
/// thread draining it. At most one exists per connection at any time.
struct OpenSocket {
	socket: Arc<AsyncUdpSocket>,
	shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
	thread: Option<std::thread::JoinHandle<()>>,
}

impl OpenSocket {
	fn open(
		bind_addr: SocketAddrV4,
		data_handler: Option<DataHandler>,
		error_handler: Option<ErrorHandler>,
		state: Arc<Mutex<Option<OpenSocket>>>,
	) -> Result<Self, ConnectionError> {
		let std_socket = socket::create_broadcast_socket(bind_addr).map_err(ConnectionError::SocketCreationFailed)?;

		let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);
		let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

		let thread = std::thread::spawn(move || {
			tokio::runtime::Builder::new_current_thread()
				.thread_name("Loudhailer broadcast reactor (Tokio)")
				.enable_all()
				.build()
				.unwrap()
				.block_on(async move {
					// Registration with the reactor has to happen on the
					// runtime's own thread.
					let socket = match AsyncUdpSocket::from_std(std_socket) {
						Ok(socket) => Arc::new(socket),
						Err(err) => {
							ready_tx.send(Err(err)).ok();
							return;
						}
					};
					ready_tx.send(Ok(socket.clone())).ok();

					tokio::select! {
						biased;
						_ = shutdown_rx => {},
						_ = recv_loop(socket, data_handler, error_handler, state) => {},
					}
				})
		});

		let socket = match ready_rx.recv() {
			Ok(Ok(socket)) => socket,
			Ok(Err(err)) => {
				thread.join().ok();
				return Err(ConnectionError::SocketCreationFailed(err));
			}
			Err(_) => {
				thread.join().ok();
				return Err(ConnectionError::SocketCreationFailed(io::Error::new(
					io::ErrorKind::Other,
					"broadcast reactor thread failed to start",
				)));
			}
		};

		Ok(OpenSocket {
			socket,
			shutdown_tx: Some(shutdown_tx),
			thread: Some(thread),
		})
	}
}

impl Drop for OpenSocket {
	fn drop(&mut self) {
		if let Some(shutdown_tx) = self.shutdown_tx.take() {
			shutdown_tx.send(()).ok();
		}

		// Shut both directions before the last handle drops; ENOTCONN from
		// an unconnected UDP socket is harmless.
		socket2::SockRef::from(&*self.socket)
			.shutdown(std::net::Shutdown::Both)
			.ok();

		if let Some(thread) = self.thread.take() {
			// The receive loop tears its own state down from the reactor
			// thread; joining there would deadlock.
			if thread.thread().id() != std::thread::current().id() {
				thread.join().ok();
			}
		}
	}
}

/// The result of draining one readiness notification.
pub(crate) enum RecvOutcome {
	/// A datagram of `usize` bytes from the decoded sender.
	Datagram(usize, Endpoint),

	/// Spurious readiness; re-arm and wait again.
	WouldBlock,

	/// The socket is no longer trustworthy; report and close.
	Failed(ConnectionError),
}

pub(crate) fn classify_recv(result: io::Result<(usize, socket2::SockAddr)>) -> RecvOutcome {
	match result {
		Err(err) if err.kind() == io::ErrorKind::WouldBlock => RecvOutcome::WouldBlock,

		Err(err) => RecvOutcome::Failed(ConnectionError::ReceiveFailed(err)),

		// A zero-byte read is an end-of-stream indication, atypical for UDP.
		Ok((0, _)) => RecvOutcome::Failed(ConnectionError::ReceiveFailed(io::Error::new(
			io::ErrorKind::UnexpectedEof,
			"zero-length read on broadcast socket",
		))),

		Ok((count, addr)) => match net::decode_endpoint(&addr) {
			Ok(endpoint) => RecvOutcome::Datagram(count, endpoint),
			Err(err) => RecvOutcome::Failed(err),
		},
	}
}

async fn recv_loop(
	socket: Arc<AsyncUdpSocket>,
	data_handler: Option<DataHandler>,
	error_handler: Option<ErrorHandler>,
	state: Arc<Mutex<Option<OpenSocket>>>,
) {
	loop {
		if let Err(err) = socket.readable().await {
			fail(&state, &error_handler, ConnectionError::ReceiveFailed(err));
			return;
		}

		// One fresh buffer per event; the reactor is single-threaded so
		// receives never overlap.
		let mut buf = vec![0u8; RECV_BUFFER_SIZE];
		let result = socket.try_io(Interest::READABLE, || socket::recv_with_source(&socket, &mut buf));

		match classify_recv(result) {
			RecvOutcome::WouldBlock => continue,

			RecvOutcome::Datagram(count, endpoint) => {
				buf.truncate(count);
				trace!("received {count} bytes from {endpoint}");
				if let Some(handler) = &data_handler {
					handler(&endpoint.host, endpoint.port, &buf);
				}
			}

			RecvOutcome::Failed(err) => {
				fail(&state, &error_handler, err);
				return;
			}
		}
	}
}

/// Fail-closed: tear down the socket, then notify. Closing first means a
/// handler that immediately re-sends gets a fresh socket.
fn fail(state: &Mutex<Option<OpenSocket>>, error_handler: &Option<ErrorHandler>, err: ConnectionError) {
	debug!("closing broadcast socket after receive failure: {err}");
	drop(state.lock().unwrap().take());

	if let Some(handler) = error_handler {
		handler(err);
	}
}

pub(crate) fn wildcard(port: u16) -> SocketAddrV4 {
	SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)
}
