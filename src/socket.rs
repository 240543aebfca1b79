use socket2::{Domain, Protocol, SockAddr, Type};
use std::{
	io,
	net::{SocketAddr, SocketAddrV4},
};
use tokio::net::UdpSocket as AsyncUdpSocket;

/// How long one send will wait for the socket to accept a datagram when the
/// send buffer is full, before giving up.
const SEND_READY_TIMEOUT_MS: i32 = 1000;

/// Creates and configures the datagram socket used for broadcasting.
///
/// The socket is broadcast-enabled, address-reusable (so several connections
/// on one host can share the port), SIGPIPE-safe and non-blocking, bound to
/// the given wildcard address. If any step fails the partially-created
/// socket is dropped, which closes the descriptor.
pub(crate) fn create_broadcast_socket(bind_addr: SocketAddrV4) -> io::Result<std::net::UdpSocket> {
	let socket = socket2::Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
	socket.set_broadcast(true)?;
	socket.set_reuse_address(true)?;

	#[cfg(unix)]
	{
		socket.set_reuse_port(true)?;
	}

	set_nosigpipe(&socket)?;

	socket.bind(&SockAddr::from(SocketAddr::V4(bind_addr)))?;
	socket.set_nonblocking(true)?;

	Ok(socket.into())
}

#[cfg(unix)]
/// Reads one datagram, capturing the sender's native socket address.
///
/// Returns the raw `sockaddr_storage`-backed address rather than a
/// pre-decoded `SocketAddr` so that non-INET sender families surface as a
/// decode failure instead of being swallowed by the standard library.
pub(crate) fn recv_with_source(socket: &AsyncUdpSocket, buf: &mut [u8]) -> io::Result<(usize, SockAddr)> {
	use std::os::unix::io::AsRawFd;

	let fd = socket.as_raw_fd();
	let mut received = 0usize;
	let ((), addr) = unsafe {
		SockAddr::init(|storage, len| {
			let count = libc::recvfrom(fd, buf.as_mut_ptr().cast(), buf.len(), 0, storage.cast(), len);
			if count < 0 {
				return Err(io::Error::last_os_error());
			}
			received = count as usize;
			Ok(())
		})
	}?;

	Ok((received, addr))
}

#[cfg(windows)]
/// Reads one datagram, capturing the sender's native socket address.
pub(crate) fn recv_with_source(socket: &AsyncUdpSocket, buf: &mut [u8]) -> io::Result<(usize, SockAddr)> {
	use std::os::windows::io::AsRawSocket;
	use winapi::um::winsock2::{recvfrom, SOCKET_ERROR};

	let raw = socket.as_raw_socket();
	let mut received = 0usize;
	let ((), addr) = unsafe {
		SockAddr::init(|storage, len| {
			let count = recvfrom(raw as _, buf.as_mut_ptr().cast(), buf.len() as _, 0, storage.cast(), len.cast());
			if count == SOCKET_ERROR {
				return Err(io::Error::last_os_error());
			}
			received = count as usize;
			Ok(())
		})
	}?;

	Ok((received, addr))
}

#[cfg(unix)]
/// Transmits `payload` as one datagram to `dest`.
///
/// Issues the `sendto` syscall directly rather than going through tokio's
/// cached write readiness: the send path is synchronous and may run on a
/// thread that has never observed writability, where `try_send_to` would
/// report a spurious `WouldBlock` for a socket the OS is happy to accept a
/// datagram on. A genuine full send buffer is waited out (bounded) and the
/// send retried.
pub(crate) fn send_to_addr(socket: &AsyncUdpSocket, payload: &[u8], dest: &SockAddr) -> io::Result<usize> {
	use std::os::unix::io::AsRawFd;

	let fd = socket.as_raw_fd();
	loop {
		let count = unsafe { libc::sendto(fd, payload.as_ptr().cast(), payload.len(), 0, dest.as_ptr(), dest.len()) };
		if count >= 0 {
			return Ok(count as usize);
		}

		let err = io::Error::last_os_error();
		match err.kind() {
			io::ErrorKind::Interrupted => continue,
			io::ErrorKind::WouldBlock => wait_writable(fd)?,
			_ => return Err(err),
		}
	}
}

#[cfg(unix)]
fn wait_writable(fd: std::os::unix::io::RawFd) -> io::Result<()> {
	let mut pfd = libc::pollfd {
		fd,
		events: libc::POLLOUT,
		revents: 0,
	};

	loop {
		let res = unsafe { libc::poll(&mut pfd, 1, SEND_READY_TIMEOUT_MS) };
		if res > 0 {
			return Ok(());
		}
		if res == 0 {
			return Err(io::Error::new(
				io::ErrorKind::TimedOut,
				"timed out waiting for the socket to accept a datagram",
			));
		}

		let err = io::Error::last_os_error();
		if err.kind() != io::ErrorKind::Interrupted {
			return Err(err);
		}
	}
}

#[cfg(windows)]
/// Transmits `payload` as one datagram to `dest`.
pub(crate) fn send_to_addr(socket: &AsyncUdpSocket, payload: &[u8], dest: &SockAddr) -> io::Result<usize> {
	use std::os::windows::io::AsRawSocket;
	use winapi::um::winsock2::{sendto, SOCKET_ERROR};

	let raw = socket.as_raw_socket();
	loop {
		let count = unsafe { sendto(raw as _, payload.as_ptr().cast(), payload.len() as _, 0, dest.as_ptr().cast(), dest.len() as _) };
		if count != SOCKET_ERROR {
			return Ok(count as usize);
		}

		let err = io::Error::last_os_error();
		if err.kind() == io::ErrorKind::WouldBlock {
			wait_writable(raw)?;
			continue;
		}
		return Err(err);
	}
}

#[cfg(windows)]
fn wait_writable(raw: std::os::windows::io::RawSocket) -> io::Result<()> {
	use winapi::um::winsock2::{WSAPoll, POLLWRNORM, WSAPOLLFD};

	let mut pfd = WSAPOLLFD {
		fd: raw as _,
		events: POLLWRNORM,
		revents: 0,
	};

	let res = unsafe { WSAPoll(&mut pfd, 1, SEND_READY_TIMEOUT_MS as _) };
	if res > 0 {
		Ok(())
	} else if res == 0 {
		Err(io::Error::new(
			io::ErrorKind::TimedOut,
			"timed out waiting for the socket to accept a datagram",
		))
	} else {
		Err(io::Error::last_os_error())
	}
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
/// Disables SIGPIPE delivery on broken-pipe writes to this socket.
fn set_nosigpipe(socket: &socket2::Socket) -> io::Result<()> {
	use std::os::unix::io::AsRawFd;

	let enable: libc::c_int = 1;
	let res = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			libc::SOL_SOCKET,
			libc::SO_NOSIGPIPE,
			&enable as *const _ as *const _,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if res == 0 {
		Ok(())
	} else {
		Err(io::Error::last_os_error())
	}
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
/// SO_NOSIGPIPE only exists on Apple platforms; elsewhere plain errno
/// semantics apply to datagram sends and there is nothing to disable.
fn set_nosigpipe(_socket: &socket2::Socket) -> io::Result<()> {
	Ok(())
}
