use crate::{
	connection::{classify_recv, RecvOutcome},
	errors::ConnectionError,
	net::decode_endpoint,
};
use std::{
	io,
	net::{Ipv6Addr, SocketAddr, SocketAddrV6},
};

#[test]
fn decodes_ipv4_endpoint() {
	let addr = socket2::SockAddr::from(SocketAddr::from(([1, 2, 3, 4], 5678)));
	let endpoint = decode_endpoint(&addr).unwrap();
	assert_eq!(endpoint.host, "1.2.3.4");
	assert_eq!(endpoint.port, 5678);
	assert_eq!(endpoint.to_string(), "1.2.3.4:5678");
}

#[test]
fn decodes_ipv6_endpoint() {
	let addr = socket2::SockAddr::from(SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 9, 0, 0)));
	let endpoint = decode_endpoint(&addr).unwrap();
	assert_eq!(endpoint.host, "::1");
	assert_eq!(endpoint.port, 9);
}

#[cfg(unix)]
#[test]
fn rejects_non_inet_address_family() {
	let addr = socket2::SockAddr::unix("/tmp/loudhailer-test.sock").unwrap();
	assert!(matches!(decode_endpoint(&addr), Err(ConnectionError::EndpointDecodeFailed)));
}

#[test]
fn os_receive_error_classifies_with_its_code() {
	let outcome = classify_recv(Err(io::Error::from_raw_os_error(9)));
	match outcome {
		RecvOutcome::Failed(err @ ConnectionError::ReceiveFailed(_)) => {
			assert_eq!(err.os_error(), Some(9));
			assert!(!err.is_eof());
		}
		_ => panic!("expected ReceiveFailed"),
	}
}

#[test]
fn zero_byte_read_classifies_as_eof() {
	let addr = socket2::SockAddr::from(SocketAddr::from(([127, 0, 0, 1], 1234)));
	match classify_recv(Ok((0, addr))) {
		RecvOutcome::Failed(err @ ConnectionError::ReceiveFailed(_)) => {
			assert!(err.is_eof());
			assert_eq!(err.os_error(), None);
		}
		_ => panic!("expected EOF ReceiveFailed"),
	}
}

#[test]
fn would_block_is_not_a_failure() {
	let outcome = classify_recv(Err(io::Error::new(io::ErrorKind::WouldBlock, "spurious wakeup")));
	assert!(matches!(outcome, RecvOutcome::WouldBlock));
}

#[cfg(unix)]
#[test]
fn undecodable_sender_classifies_as_decode_failure() {
	let addr = socket2::SockAddr::unix("/tmp/loudhailer-test.sock").unwrap();
	assert!(matches!(
		classify_recv(Ok((16, addr))),
		RecvOutcome::Failed(ConnectionError::EndpointDecodeFailed)
	));
}

#[test]
fn datagram_classifies_with_count_and_endpoint() {
	let addr = socket2::SockAddr::from(SocketAddr::from(([10, 0, 0, 2], 40000)));
	match classify_recv(Ok((42, addr))) {
		RecvOutcome::Datagram(count, endpoint) => {
			assert_eq!(count, 42);
			assert_eq!(endpoint.host, "10.0.0.2");
			assert_eq!(endpoint.port, 40000);
		}
		_ => panic!("expected Datagram"),
	}
}

#[test]
fn reopen_failure_carries_nested_code() {
	let err = ConnectionError::ReopeningSocketFailed(Box::new(ConnectionError::SocketCreationFailed(
		io::Error::from_raw_os_error(13),
	)));
	assert_eq!(err.os_error(), Some(13));
}
