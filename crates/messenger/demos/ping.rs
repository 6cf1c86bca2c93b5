//! Publishes a counter and prints every `Test` message the broker relays.
//!
//! Run with a broker listening on port 5805:
//!   cargo run -p messenger --example ping --features logging -- localhost 5805
//!
//! Stops after ten rounds.

use std::thread;
use std::time::Duration;

use messenger::logging::{init_logging, LogFormat, LogLevel};
use messenger::{MessengerClient, DEFAULT_PORT};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LogFormat::Text, LogLevel::Info);

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => DEFAULT_PORT,
    };

    let mut client = MessengerClient::new(&host, port, "ping-demo", true)?;
    client.add_handler("Test", |msg_type, mut reader| match reader.read_int() {
        Ok(value) => eprintln!("{msg_type}: {value}"),
        Err(e) => eprintln!("{msg_type}: malformed payload: {e}"),
    })?;

    for round in 0..10 {
        client.prepare("Test").add_int(round).send()?;
        thread::sleep(Duration::from_millis(500));
        client.read_messages();
        eprintln!("round {round}: {}", client.state());
    }

    client.disconnect();
    Ok(())
}
