use std::collections::HashMap;

use colony_core::{FunctionSamples, Hotspot, ProfilingInsight};

/// Strip symbolizer noise from a frame name: inlining markers, template
/// whitespace, trailing offsets.
pub(crate) fn clean_frame(frame: &str) -> String {
    let mut cleaned = frame.trim();
    for prefix in ["[inlined] ", "inlined at "] {
        if let Some(rest) = cleaned.strip_prefix(prefix) {
            cleaned = rest.trim();
        }
    }
    for suffix in [" (inlined)", " [inlined]"] {
        if let Some(rest) = cleaned.strip_suffix(suffix) {
            cleaned = rest.trim();
        }
    }
    if let Some(idx) = cleaned.rfind("+0x") {
        cleaned = cleaned[..idx].trim_end();
    }
    cleaned.to_owned()
}

/// Build the profiling insight for one service from its ranked hotspots.
///
/// The hottest stack is reversed into caller -> callee order for the hot
/// path; leaf-function names across all hotspots are deduplicated into the
/// per-function sample attribution, hottest first.
pub(crate) fn build_insight(total_samples: u64, hotspots: &[Hotspot]) -> ProfilingInsight {
    let hot_path = hotspots
        .first()
        .map(|hottest| {
            hottest
                .frames
                .iter()
                .rev()
                .map(|f| clean_frame(f))
                .filter(|f| !f.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut by_function: HashMap<String, u64> = HashMap::new();
    for hotspot in hotspots {
        let Some(leaf) = hotspot.frames.first() else {
            continue;
        };
        let leaf = clean_frame(leaf);
        if leaf.is_empty() {
            continue;
        }
        *by_function.entry(leaf).or_default() += hotspot.sample_count;
    }

    let mut samples_by_function: Vec<FunctionSamples> = by_function
        .into_iter()
        .map(|(function, samples)| FunctionSamples { function, samples })
        .collect();
    samples_by_function.sort_by(|a, b| b.samples.cmp(&a.samples).then(a.function.cmp(&b.function)));

    ProfilingInsight {
        total_samples,
        hot_path,
        samples_by_function,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cleans_inlining_markers_and_offsets() {
        assert_eq!(clean_frame("[inlined] alloc_buffer"), "alloc_buffer");
        assert_eq!(clean_frame("handle_request (inlined)"), "handle_request");
        assert_eq!(clean_frame("memcpy+0x1f"), "memcpy");
        assert_eq!(clean_frame("  plain  "), "plain");
    }

    fn hotspot(rank: u32, frames: &[&str], samples: u64) -> Hotspot {
        Hotspot {
            rank,
            frames: frames.iter().map(|f| f.to_string()).collect(),
            percentage: 0.0,
            sample_count: samples,
        }
    }

    #[test]
    fn hot_path_is_reversed_to_caller_order() {
        let spots = vec![
            hotspot(1, &["leaf", "mid", "main"], 80),
            hotspot(2, &["other", "main"], 20),
        ];
        let insight = build_insight(100, &spots);
        assert_eq!(insight.hot_path, vec!["main", "mid", "leaf"]);
    }

    #[test]
    fn leaf_functions_are_deduplicated() {
        let spots = vec![
            hotspot(1, &["alloc", "a"], 50),
            hotspot(2, &["alloc", "b"], 30),
            hotspot(3, &["read", "c"], 20),
        ];
        let insight = build_insight(100, &spots);
        assert_eq!(insight.samples_by_function.len(), 2);
        assert_eq!(insight.samples_by_function[0].function, "alloc");
        assert_eq!(insight.samples_by_function[0].samples, 80);
    }
}
