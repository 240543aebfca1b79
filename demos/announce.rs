use loudhailer::BroadcastConnectionBuilder;
use std::time::Duration;

fn main() {
	simple_logger::SimpleLogger::new().env().init().unwrap();

	let conn = BroadcastConnectionBuilder::new(5559)
		.data_handler(|host, port, payload| {
			println!("reply from {}:{} -> {}", host, port, String::from_utf8_lossy(payload));
		})
		.error_handler(|err| eprintln!("connection error: {err}"))
		.build();

	println!("Announcing on port {} every 2 seconds, Ctrl-C to stop.", conn.port());

	loop {
		if let Err(err) = conn.send_broadcast_text("Hello!") {
			eprintln!("send failed: {err}");
		}

		std::thread::sleep(Duration::from_secs(2));
	}
}
