//! Sample workload: one thread per insert and one per removal sharing a
//! single queue.
//!
//! Run with `RUST_LOG=bounded_blocking_queue=debug` to see queue events.
//! `BBQ_THREADS` and `BBQ_CAPACITY` override the defaults (the CPU count).

use bounded_blocking_queue::BoundedBlockingQueue;
use rand::Rng;
use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Pause after each operation, to make the interleaving visible
const PAUSE: Duration = Duration::from_millis(50);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bounded_blocking_queue=debug,producer_consumer=info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .init();
}

fn env_or(name: &str, default: usize) -> usize {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            error!(name, value = %raw, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}

fn main() {
    init_tracing();

    let threads = env_or("BBQ_THREADS", num_cpus::get());
    let capacity = env_or("BBQ_CAPACITY", num_cpus::get());

    let queue = match BoundedBlockingQueue::<u32>::new(capacity) {
        Ok(queue) => Arc::new(queue),
        Err(err) => {
            error!(%err, "cannot create queue");
            std::process::exit(1);
        }
    };

    info!(threads, capacity, "starting producers and consumers");

    let mut handles = Vec::with_capacity(threads * 2);

    for i in 0..threads {
        let q = Arc::clone(&queue);
        let handle = thread::Builder::new()
            .name(format!("producer-{}", i))
            .spawn(move || {
                let value = rand::rng().random_range(1..=100);
                q.insert(value);
                thread::sleep(PAUSE);
            });
        match handle {
            Ok(handle) => handles.push(handle),
            Err(err) => error!(%err, "failed to spawn producer"),
        }
    }

    for i in 0..threads {
        let q = Arc::clone(&queue);
        let handle = thread::Builder::new()
            .name(format!("consumer-{}", i))
            .spawn(move || {
                // Peek and remove are separate calls, so under contention the
                // removed value may differ from the one peeked at.
                let front = q.peek_front();
                info!(front, "front value of the queue");
                let removed = q.remove_front();
                info!(removed, "removed value");
                thread::sleep(PAUSE);
            });
        match handle {
            Ok(handle) => handles.push(handle),
            Err(err) => error!(%err, "failed to spawn consumer"),
        }
    }

    for handle in handles {
        if handle.join().is_err() {
            error!("worker thread panicked");
        }
    }

    info!(size = queue.size(), "all workers finished");
}
