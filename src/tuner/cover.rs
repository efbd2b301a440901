//! Selection of the configurations that explain everything found so far.
//!
//! Two independent passes over the observation history:
//!
//! * a greedy maximum-coverage cover, repeatedly taking the observation that
//!   adds the most not-yet-covered ids;
//! * a defect attribution, crediting every distinct defect to the most recent
//!   observation that exhibited it.
//!
//! Ties in the greedy pass go to the earliest observation.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use crate::models::{Draw, Observation};

/// Indices of greedily chosen observations, in pick order.
///
/// Stops when no remaining observation adds coverage, or after `limit` picks.
pub fn coverage_core(observations: &[Observation], limit: Option<usize>) -> Vec<usize> {
    let mut accumulated: BTreeSet<&str> = BTreeSet::new();
    let mut remaining: Vec<usize> = (0..observations.len()).collect();
    let mut picks = Vec::new();

    while limit.map_or(true, |k| picks.len() < k) {
        let best = remaining
            .iter()
            .enumerate()
            .map(|(pos, &idx)| {
                let gain = observations[idx]
                    .coverage
                    .iter()
                    .filter(|id| !accumulated.contains(id.as_str()))
                    .count();
                (pos, gain)
            })
            // strict comparison keeps the earliest of equal gains
            .fold(None, |best: Option<(usize, usize)>, (pos, gain)| match best {
                Some((_, best_gain)) if best_gain >= gain => best,
                _ => Some((pos, gain)),
            });

        let Some((pos, gain)) = best else {
            break;
        };
        if gain == 0 {
            break;
        }

        let idx = remaining.remove(pos);
        accumulated.extend(observations[idx].coverage.iter().map(String::as_str));
        picks.push(idx);
    }

    picks
}

/// Index of the latest discoverer of each distinct defect, newest first.
///
/// An observation that is the latest discoverer of several defects appears
/// once per defect.
pub fn defect_core(observations: &[Observation]) -> Vec<usize> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut picks = Vec::new();

    for (idx, observation) in observations.iter().enumerate().rev() {
        for defect in &observation.defects {
            if seen.insert(defect.as_str()) {
                picks.push(idx);
            }
        }
    }

    picks
}

/// Draws of the core configurations: coverage picks first, then defect picks.
pub fn extract_core(observations: &[Observation]) -> Vec<&Draw> {
    coverage_core(observations, None)
        .into_iter()
        .chain(defect_core(observations))
        .map(|idx| &observations[idx].draw)
        .collect()
}

/// Artifacts worth seeding the next run with.
///
/// Defect-attributed artifacts first, then at most `k` coverage picks.
pub fn curated_artifacts(observations: &[Observation], k: usize) -> Vec<PathBuf> {
    defect_core(observations)
        .into_iter()
        .chain(coverage_core(observations, Some(k)))
        .map(|idx| observations[idx].artifact.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParamValue;

    fn observation(coverage: &[u32], defects: &[&str], tag: &str) -> Observation {
        let mut draw = Draw::new();
        draw.insert("-search".to_string(), vec![ParamValue::text(tag)]);
        Observation::new(
            coverage.iter().map(|c| c.to_string()).collect(),
            defects.iter().map(|d| d.to_string()).collect(),
            PathBuf::from(format!("{}.ktest", tag)),
            draw,
        )
    }

    fn tag(draw: &Draw) -> String {
        draw["-search"][0].to_string()
    }

    #[test]
    fn test_greedy_cover_picks_largest_first_and_covers_union() {
        let observations = vec![
            observation(&[1, 2, 3], &[], "a"),
            observation(&[3, 4], &[], "b"),
            observation(&[5], &[], "c"),
        ];

        let picks = coverage_core(&observations, None);
        assert_eq!(picks[0], 0);

        let covered: BTreeSet<&String> = picks
            .iter()
            .flat_map(|&i| observations[i].coverage.iter())
            .collect();
        assert_eq!(covered.len(), 5);
        // b and c tie on residual size 1; the earlier one goes first
        assert_eq!(picks, vec![0, 1, 2]);
    }

    #[test]
    fn test_greedy_cover_skips_redundant_observations() {
        let observations = vec![
            observation(&[1, 2], &[], "a"),
            observation(&[1, 2, 3, 4], &[], "b"),
            observation(&[2, 3], &[], "c"),
            observation(&[], &[], "d"),
        ];
        assert_eq!(coverage_core(&observations, None), vec![1]);
    }

    #[test]
    fn test_greedy_cover_respects_limit() {
        let observations = vec![
            observation(&[1], &[], "a"),
            observation(&[2, 3], &[], "b"),
            observation(&[4, 5, 6], &[], "c"),
        ];
        assert_eq!(coverage_core(&observations, Some(2)), vec![2, 1]);
        assert!(coverage_core(&observations, Some(0)).is_empty());
    }

    #[test]
    fn test_defect_attributed_to_latest_discoverer() {
        let observations = vec![
            observation(&[], &["X"], "first"),
            observation(&[], &["Y"], "middle"),
            observation(&[], &["X"], "last"),
        ];
        assert_eq!(defect_core(&observations), vec![2, 1]);
    }

    #[test]
    fn test_extract_core_orders_coverage_before_defects() {
        let observations = vec![
            observation(&[1, 2], &["X"], "a"),
            observation(&[3], &[], "b"),
            observation(&[], &["X", "Y"], "c"),
        ];
        let core: Vec<String> = extract_core(&observations).into_iter().map(tag).collect();
        assert_eq!(core, vec!["a", "b", "c", "c"]);
    }

    #[test]
    fn test_curated_artifacts_defects_then_top_k() {
        let observations = vec![
            observation(&[1, 2, 3], &[], "wide"),
            observation(&[4], &["X"], "buggy"),
            observation(&[5], &[], "narrow"),
        ];
        let seeds = curated_artifacts(&observations, 1);
        assert_eq!(
            seeds,
            vec![PathBuf::from("buggy.ktest"), PathBuf::from("wide.ktest")]
        );
    }

    #[test]
    fn test_empty_history() {
        assert!(extract_core(&[]).is_empty());
        assert!(curated_artifacts(&[], 10).is_empty());
    }
}
