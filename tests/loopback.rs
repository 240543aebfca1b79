use loudhailer::{BroadcastConnection, BroadcastConnectionBuilder, ConnectionError};
use std::{
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn construction_is_inert() {
	let connections: Vec<BroadcastConnection> = (0..100).map(|_| BroadcastConnection::new(40911)).collect();

	for conn in &connections {
		assert!(!conn.is_open());
		assert!(conn.local_addr().is_none());
	}
}

#[test]
fn lifecycle_open_close_reopen() {
	let errors = Arc::new(AtomicUsize::new(0));

	let conn = {
		let errors = errors.clone();
		BroadcastConnectionBuilder::new(40912)
			.loopback()
			.error_handler(move |_| {
				errors.fetch_add(1, Ordering::SeqCst);
			})
			.build()
	};

	assert!(!conn.is_open());

	// First send lazily opens exactly one socket.
	conn.send_broadcast(b"hello").expect("first send should open and succeed");
	assert!(conn.is_open());
	assert_eq!(conn.local_addr().expect("open socket has a local address").port(), 40912);

	conn.close();
	assert!(!conn.is_open());
	assert!(conn.local_addr().is_none());

	// Second close is a no-op and never reaches the error handler.
	conn.close();
	assert_eq!(errors.load(Ordering::SeqCst), 0);

	// A send after an explicit close reopens cleanly.
	conn.send_broadcast(b"again").expect("send after close should reopen");
	assert!(conn.is_open());
}

#[test]
fn loopback_round_trip() {
	let (tx, rx) = std::sync::mpsc::sync_channel(4);

	let listener = BroadcastConnectionBuilder::new(40913)
		.loopback()
		.data_handler(move |host, port, payload| {
			tx.try_send((host.to_string(), port, payload.to_vec())).ok();
		})
		.build();
	listener.open().expect("listener should open");

	let sender = BroadcastConnectionBuilder::new(40913).loopback().build();
	sender.send_broadcast(b"Hello!").expect("broadcast should send");

	let (host, port, payload) = rx.recv_timeout(RECV_TIMEOUT).expect("listener should receive the broadcast");

	assert_eq!(payload, b"Hello!");
	assert_eq!(host, "127.0.0.1");
	assert_eq!(port, sender.local_addr().expect("sender is open after sending").port());
}

#[test]
fn oversized_payload_is_never_silently_truncated() {
	let (tx, rx) = std::sync::mpsc::sync_channel(4);

	let listener = BroadcastConnectionBuilder::new(40914)
		.loopback()
		.data_handler(move |_, _, payload| {
			tx.try_send(payload.to_vec()).ok();
		})
		.build();
	listener.open().expect("listener should open");

	let sender = BroadcastConnectionBuilder::new(40914).loopback().build();

	// Well past the recommended 512-byte guidance; must arrive whole or
	// fail loudly.
	let payload = vec![0xAB; 600];
	match sender.send_broadcast(&payload) {
		Ok(()) => {
			let received = rx.recv_timeout(RECV_TIMEOUT).expect("payload should arrive");
			assert_eq!(received, payload);
		}
		Err(ConnectionError::SendingMessageFailed(_)) => {}
		Err(other) => panic!("unexpected error kind: {other}"),
	}
}

#[test]
fn zero_byte_datagram_closes_with_eof() {
	let (err_tx, err_rx) = std::sync::mpsc::sync_channel(4);
	let datagrams = Arc::new(AtomicUsize::new(0));

	let listener = {
		let datagrams = datagrams.clone();
		BroadcastConnectionBuilder::new(40916)
			.loopback()
			.data_handler(move |_, _, _| {
				datagrams.fetch_add(1, Ordering::SeqCst);
			})
			.error_handler(move |err| {
				err_tx.try_send(err).ok();
			})
			.build()
	};
	listener.open().expect("listener should open");

	let sender = BroadcastConnectionBuilder::new(40916).loopback().build();

	// An empty payload arrives as a zero-byte read, which the receive path
	// treats as an end-of-stream indication.
	sender.send_broadcast(b"").expect("empty broadcast should send");

	let err = err_rx.recv_timeout(RECV_TIMEOUT).expect("error handler should fire");
	assert!(err.is_eof(), "expected the EOF sentinel, got {err}");

	// Fail-closed: the connection tears down before the handler runs and
	// reports the failure exactly once.
	assert!(!listener.is_open());
	assert_eq!(datagrams.load(Ordering::SeqCst), 0);
	assert!(err_rx.recv_timeout(Duration::from_millis(500)).is_err());

	// The taxonomy carries no OS code for the sentinel.
	assert_eq!(err.os_error(), None);
}

#[test]
fn explicit_open_is_idempotent() {
	let conn = BroadcastConnectionBuilder::new(40915).loopback().build();

	conn.open().expect("open should succeed");
	let addr = conn.local_addr();
	conn.open().expect("second open is a no-op");
	assert_eq!(conn.local_addr(), addr);
}
