//! Launch five workers at once and wait for all of them.
//!
//! Each worker sleeps for a second, so the whole join takes about one second.
//! Results are printed in the order the workers finished, which is not
//! stable across runs.

use pullstage::prelude::*;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

async fn worker(n: u32) -> Result<u32> {
    sleep(Duration::from_secs(1)).await;
    println!("worker {} finished", n);
    Ok(n)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut set = TaskSet::new();
    for n in 0..5 {
        set.launch_named(format!("worker-{}", n), worker(n));
    }

    let joined = set.join_all(None).await;
    for task in &joined.done {
        println!("result: {}", task.result()?);
    }
    Ok(())
}
