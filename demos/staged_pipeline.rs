//! Three delayed stages pulled one item at a time.
//!
//! Simulates an audio stream feeding a model whose chunks are turned into
//! speech: every item pays each stage's one-second delay before the next item
//! starts, so five items take about fifteen seconds.

use pullstage::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let delay = Duration::from_secs(1);
    let pipeline = Pipeline::new(RangeSource::new(1..6))
        .push_stage(
            StageConfig {
                name: Some("audio".to_string()),
                delay: Some(delay),
                ..StageConfig::default()
            },
            Ok,
        )
        .push_stage(
            StageConfig {
                name: Some("model".to_string()),
                delay: Some(delay),
                ..StageConfig::default()
            },
            |value: i64| Ok(value * value),
        )
        .push_stage(
            StageConfig {
                name: Some("speech".to_string()),
                delay: Some(delay),
                ..StageConfig::default()
            },
            |value: i64| Ok(value.to_string()),
        );

    let summary = pipeline.run(PrintConsumer::<String>::new()).await?;
    println!("total elapsed: {:.2}s", summary.elapsed.as_secs_f64());
    Ok(())
}
