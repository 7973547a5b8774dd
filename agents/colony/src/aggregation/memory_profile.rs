use std::collections::HashMap;

use tracing::warn;

use colony_core::{bucket_minute, stack_hash, MemoryProfileSummary, MemorySample};

use super::FrameInterner;

/// Roll allocation samples up into one-minute buckets keyed by
/// `(bucket, build, stack)`, summing bytes and objects. Stacks are encoded
/// through the interner first; a sample whose stack fails to encode is
/// skipped with a warning, never fatal to the batch.
pub async fn aggregate_memory_samples(
    agent_id: &str,
    samples: &[MemorySample],
    interner: &FrameInterner,
) -> Vec<MemoryProfileSummary> {
    let mut by_key: HashMap<(i64, String, String, String), MemoryProfileSummary> = HashMap::new();

    for sample in samples {
        let frame_ids = match interner.encode_stack(&sample.stack_frames).await {
            Ok(ids) => ids,
            Err(report) => {
                warn!(
                    agent_id,
                    seq_id = sample.seq_id,
                    error = ?report,
                    "failed to encode sample stack, skipping sample"
                );
                continue;
            }
        };
        let hash = stack_hash(&frame_ids);

        let summary = by_key
            .entry((
                bucket_minute(sample.timestamp),
                sample.service.clone(),
                sample.build_id.clone(),
                hash.clone(),
            ))
            .or_insert_with(|| MemoryProfileSummary {
                bucket_minute: bucket_minute(sample.timestamp),
                agent_id: agent_id.into(),
                service: sample.service.clone(),
                build_id: sample.build_id.clone(),
                stack_hash: hash,
                frame_ids,
                alloc_bytes: 0,
                alloc_objects: 0,
            });
        summary.alloc_bytes += sample.alloc_bytes;
        summary.alloc_objects += sample.alloc_objects;
    }

    let mut summaries: Vec<_> = by_key.into_values().collect();
    summaries.sort_by(|a, b| {
        (a.bucket_minute, &a.service, &a.build_id, &a.stack_hash).cmp(&(
            b.bucket_minute,
            &b.service,
            &b.build_id,
            &b.stack_hash,
        ))
    });
    summaries
}
