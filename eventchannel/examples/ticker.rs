//! Publishes simulated thermometer readings over an in-memory transport and
//! consumes a few of them from the other end.
//!
//! Run with `cargo run --example ticker`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use eventchannel::{EventChannel, EventStreamClient, MemoryMessenger, StreamHandlerFn};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use simplelog::{Config, LevelFilter, SimpleLogger};

const CHANNEL: &str = "sensors/thermometer";

#[derive(Debug, Serialize)]
struct Reading {
    sequence: u64,
    celsius: f64,
}

fn thermometer() -> StreamHandlerFn {
    StreamHandlerFn::new(|args, sink| {
        let interval = Duration::from_millis(args["interval_ms"].as_u64().unwrap_or(100));
        log::info!("🌡️ Thermometer started, interval {:?}", interval);

        thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut sequence = 0;
            while sink.is_active() {
                sequence += 1;
                if rng.gen_bool(0.1) {
                    let details = json!({"sequence": sequence});
                    sink.error("glitch", Some("reading out of range"), &details);
                } else {
                    sink.success(&Reading {
                        sequence,
                        celsius: rng.gen_range(18.0..26.0),
                    });
                }
                thread::sleep(interval);
            }
            log::info!("Thermometer thread exiting after {} readings", sequence);
        });
        Ok(())
    })
    .with_cancel(|_| {
        log::info!("🛑 Thermometer stopped");
        Ok(())
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    SimpleLogger::init(LevelFilter::Debug, Config::default())?;

    let (host, remote) = MemoryMessenger::pair();

    let channel = EventChannel::builder(CHANNEL).build(Arc::new(host))?;
    channel.set_stream_handler(Some(Arc::new(thermometer())));

    let client = EventStreamClient::new(Arc::new(remote), CHANNEL);
    let mut stream = client.listen(json!({"interval_ms": 50})).await?;

    let mut received = 0;
    while let Some(event) = stream.next().await {
        match event {
            Ok(reading) => println!("reading: {}", reading),
            Err(err) => println!("error event: {}", err),
        }
        received += 1;
        if received == 10 {
            break;
        }
    }

    stream.cancel(serde_json::Value::Null).await?;
    println!("channel stats: {:?}", channel.stats());

    // Give the producer thread a moment to notice the cancellation
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
