use loudhailer::BroadcastConnectionBuilder;

fn main() {
	simple_logger::SimpleLogger::new().env().init().unwrap();

	let conn = BroadcastConnectionBuilder::new(5559)
		.data_handler(|host, port, payload| {
			println!("{}:{} -> {}", host, port, String::from_utf8_lossy(payload));
		})
		.error_handler(|err| {
			eprintln!("connection error: {err}");
			std::process::exit(1);
		})
		.build();

	conn.open().unwrap();

	println!("Listening for broadcasts on port {}...", conn.port());

	loop {
		std::thread::park();
	}
}
