use std::collections::HashMap;

use colony_core::{Hotspot, RegressionIndicator};

use super::enrich::clean_frame;

/// A leaf function must gain at least this many percentage points over its
/// baseline share to be flagged.
const REGRESSION_DELTA_PCT: f64 = 5.0;

/// Compare the current build's hotspots against the previous build's
/// baseline by leaf function share. Output order is deterministic: largest
/// delta first, function name as tiebreak.
pub(crate) fn compare_hotspots(
    kind: &str,
    baseline: &[Hotspot],
    current: &[Hotspot],
) -> Vec<RegressionIndicator> {
    let baseline_by_leaf: HashMap<String, f64> = leaf_shares(baseline);
    let current_by_leaf: HashMap<String, f64> = leaf_shares(current);

    let mut indicators: Vec<RegressionIndicator> = current_by_leaf
        .into_iter()
        .filter_map(|(function, current_pct)| {
            let baseline_pct = baseline_by_leaf.get(&function).copied().unwrap_or(0.0);
            let delta = current_pct - baseline_pct;
            (delta >= REGRESSION_DELTA_PCT).then(|| RegressionIndicator {
                kind: kind.into(),
                message: format!(
                    "{function}: {baseline_pct:.1}% of samples on previous build, {current_pct:.1}% now"
                ),
                baseline_pct,
                current_pct,
                delta,
            })
        })
        .collect();

    indicators.sort_by(|a, b| {
        b.delta
            .partial_cmp(&a.delta)
            .expect("deltas are finite")
            .then_with(|| a.message.cmp(&b.message))
    });
    indicators
}

fn leaf_shares(hotspots: &[Hotspot]) -> HashMap<String, f64> {
    let mut shares: HashMap<String, f64> = HashMap::new();
    for hotspot in hotspots {
        let Some(leaf) = hotspot.frames.first() else {
            continue;
        };
        let leaf = clean_frame(leaf);
        if leaf.is_empty() {
            continue;
        }
        *shares.entry(leaf).or_default() += hotspot.percentage;
    }
    shares
}

#[cfg(test)]
mod test {
    use super::*;

    fn hotspot(frames: &[&str], pct: f64) -> Hotspot {
        Hotspot {
            rank: 0,
            frames: frames.iter().map(|f| f.to_string()).collect(),
            percentage: pct,
            sample_count: 0,
        }
    }

    #[test]
    fn flags_functions_that_grew_past_the_threshold() {
        let baseline = vec![hotspot(&["compress", "main"], 10.0)];
        let current = vec![
            hotspot(&["compress", "main"], 30.0),
            hotspot(&["parse", "main"], 3.0),
        ];

        let indicators = compare_hotspots("cpu_hotspot", &baseline, &current);
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators[0].kind, "cpu_hotspot");
        assert_eq!(indicators[0].baseline_pct, 10.0);
        assert_eq!(indicators[0].current_pct, 30.0);
        assert_eq!(indicators[0].delta, 20.0);
    }

    #[test]
    fn new_functions_compare_against_zero_baseline() {
        let current = vec![hotspot(&["brand_new"], 12.0)];
        let indicators = compare_hotspots("cpu_hotspot", &[], &current);
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators[0].baseline_pct, 0.0);
    }

    #[test]
    fn small_shifts_are_ignored() {
        let baseline = vec![hotspot(&["f"], 10.0)];
        let current = vec![hotspot(&["f"], 12.0)];
        assert!(compare_hotspots("cpu_hotspot", &baseline, &current).is_empty());
    }
}
