//! Smoke command implementation.
//!
//! Runs a short workload against the in-memory service: every segment is
//! created, appended to, read back and sealed through the segment service.

use super::CommandError;
use segstore_server::{ServiceBuilder, ServiceBuilderConfig, StreamSegmentStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Smoke workload parameters.
#[derive(Debug, Clone, Copy)]
pub struct SmokeOptions {
    /// Number of segment containers.
    pub containers: u32,
    /// Worker threads in the execution context.
    pub threads: usize,
    /// Number of segments to exercise.
    pub segments: usize,
}

/// Smoke workload outcome.
#[derive(Debug, Serialize)]
pub struct SmokeSummary {
    /// Segments created, written, read and sealed.
    pub segments: usize,
    /// Total bytes appended.
    pub bytes_written: u64,
    /// Segments per container.
    pub per_container: BTreeMap<u32, usize>,
    /// Wall time of the workload in milliseconds.
    pub elapsed_ms: u128,
}

fn payload(index: usize) -> Vec<u8> {
    format!("segment {index} payload").into_bytes()
}

/// Runs the workload and returns its summary.
///
/// The builder is always closed, including when a step fails.
pub async fn execute(options: SmokeOptions) -> Result<SmokeSummary, Box<dyn std::error::Error>> {
    let config = ServiceBuilderConfig::new()
        .with_container_count(options.containers)
        .with_thread_pool_size(options.threads);
    let builder = ServiceBuilder::in_memory(config)?;

    let started = Instant::now();
    let outcome = workload(&builder, options.segments).await;
    builder.close().await;

    let (bytes_written, per_container) = outcome?;
    Ok(SmokeSummary {
        segments: options.segments,
        bytes_written,
        per_container,
        elapsed_ms: started.elapsed().as_millis(),
    })
}

async fn workload(
    builder: &ServiceBuilder,
    segments: usize,
) -> Result<(u64, BTreeMap<u32, usize>), Box<dyn std::error::Error>> {
    builder.initialize(OPERATION_TIMEOUT).await?;
    let store = builder.create_segment_service()?;

    let mut bytes_written = 0u64;
    let mut per_container = BTreeMap::new();

    for index in 0..segments {
        let segment = format!("smoke/stream/{index}");
        let data = payload(index);

        store.create_segment(&segment, OPERATION_TIMEOUT).await?;
        store
            .append(&segment, data.clone(), OPERATION_TIMEOUT)
            .await?;

        let read = store
            .read(&segment, 0, data.len(), OPERATION_TIMEOUT)
            .await?;
        if read.data != data {
            return Err(CommandError::Mismatch {
                segment,
                reason: format!("read {} bytes, expected {}", read.data.len(), data.len()),
            }
            .into());
        }

        let length = store.seal_segment(&segment, OPERATION_TIMEOUT).await?;
        let info = store.get_segment_info(&segment, OPERATION_TIMEOUT).await?;
        if !info.sealed || length != data.len() as u64 {
            return Err(CommandError::Mismatch {
                segment,
                reason: format!("sealed={} length={length}", info.sealed),
            }
            .into());
        }

        tracing::debug!(segment = %segment, length, "segment verified");
        bytes_written += length;
        *per_container
            .entry(builder.mapper().container_id(&segment))
            .or_insert(0) += 1;
    }

    Ok((bytes_written, per_container))
}

/// Runs the smoke command.
pub fn run(options: SmokeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(execute(options))?;

    println!("Smoke run complete");
    println!("  Segments:      {}", summary.segments);
    println!("  Bytes written: {}", summary.bytes_written);
    println!("  Elapsed:       {} ms", summary.elapsed_ms);
    for (container_id, count) in &summary.per_container {
        println!("  Container {container_id}: {count} segment(s)");
    }

    Ok(())
}
