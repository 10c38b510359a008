//! A small multi-stage pipeline.
//!
//! Numbers are pushed by a producer task, filtered and scaled in order,
//! split into two lanes, enriched concurrently, then merged back together.

use std::time::Duration;

use queueweld::prelude::*;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Simple Queue Pipeline Example ===");

    let source = Queue::new();
    let producer = source.clone();
    let producing = tokio::spawn(async move {
        for i in 0..20u64 {
            producer.push(i)?;
            if producer.size() > 4 {
                producer.wait_for_shift().await;
            }
        }
        producer.end()
    });

    let (small, large) = source
        .pipe(|x| Ok((x % 3 != 0).then_some(x * 2)))?
        .split(|x| Ok((x, (x >= 20) as usize)))?;

    let large = large.upipe(
        |x| async move {
            sleep(Duration::from_millis(40 - x)).await;
            Ok(Some(x * 100))
        },
        4usize,
    )?;

    small
        .umerge(&large)?
        .map(|x| {
            println!("Processed: {}", x);
            Ok(())
        })
        .await?;
    producing.await??;

    println!("Simple pipeline completed!\n");
    Ok(())
}
