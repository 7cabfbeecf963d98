use astre::detector::{DetectionOptions, Detector, Silent};
use astre::points::PointsFile;
use astre::scorer::physics::DiscreteArea;
use astre::scorer::setup::{log_cnk_table, log_k_table, log_kfact_table, log_nprod_table};
use astre::scorer::NfaModel;
use proptest::prelude::*;
use std::collections::HashSet;

// --- STRATEGIES ---

prop_compose! {
    fn arb_counts()(counts in prop::collection::vec(0usize..6, 3..9)) -> Vec<usize> {
        counts
    }
}

prop_compose! {
    /// Small random scenes: 3 to 6 frames of up to 5 integer points.
    fn arb_scene()(
        frames in prop::collection::vec(
            prop::collection::vec((0u32..40, 0u32..40), 0..5),
            3..7,
        )
    ) -> PointsFile {
        let tags = vec![Some("x".to_string()), Some("y".to_string())];
        let mut points = PointsFile::new(40, 40, tags, frames.len());
        for (k, frame) in frames.iter().enumerate() {
            for &(x, y) in frame {
                points.push_point(k, &[x as f64, y as f64]).unwrap();
            }
        }
        points
    }
}

/// Largest product of point counts over `s` frames of the window, endpoints included.
fn brute_force_nprod(counts: &[usize], k: usize, l: usize, s: usize) -> Option<usize> {
    let interior: Vec<usize> = counts[k + 1..k + l - 1].to_vec();
    let mut best = None;
    for mask in 0u32..(1 << interior.len()) {
        if mask.count_ones() as usize != s - 2 {
            continue;
        }
        let mut prod = counts[k] * counts[k + l - 1];
        for (i, n) in interior.iter().enumerate() {
            if mask & (1 << i) != 0 {
                prod *= n;
            }
        }
        best = best.max(Some(prod));
    }
    best
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_discrete_area_symmetry(x in -50i64..=50, y in -50i64..=50) {
        let disc = DiscreteArea::default();
        let a = disc.area(x, y);
        prop_assert_eq!(a, disc.area(y, x));
        prop_assert_eq!(a, disc.area(-x, y));
        prop_assert_eq!(a, disc.area(x, -y));
    }

    #[test]
    fn prop_discrete_area_grows_with_radius(
        x1 in 0i64..60, y1 in 0i64..60, x2 in 0i64..60, y2 in 0i64..60
    ) {
        let disc = DiscreteArea::default();
        if x1 * x1 + y1 * y1 <= x2 * x2 + y2 * y2 {
            prop_assert!(disc.area(x1, y1) <= disc.area(x2, y2));
        }
        prop_assert!(disc.area(x1.max(y1), 0) <= disc.area(x1.max(y1) + 1, 0));
    }

    #[test]
    fn prop_binomial_symmetry_and_factorial_recurrence(n in 0usize..40) {
        let log_k = log_k_table(40);
        let log_kfact = log_kfact_table(&log_k);
        let cnk = log_cnk_table(&log_kfact);
        for k in 0..=n {
            prop_assert!((cnk[n * 41 + k] - cnk[n * 41 + n - k]).abs() < 1e-9);
        }
        if n >= 2 {
            prop_assert!((log_kfact[n] - log_k[n] - log_kfact[n - 1]).abs() < 1e-9);
        }
    }

    #[test]
    fn prop_nprod_is_an_upper_bound(counts in arb_counts()) {
        let (table, offsets) = log_nprod_table(&counts);
        for k in 0..counts.len() {
            for l in 2..=(counts.len() - k) {
                for s in 2..=l {
                    let v = table[offsets[k] + l * (l + 1) / 2 + s];
                    match brute_force_nprod(&counts, k, l, s) {
                        Some(best) if best > 0 => {
                            prop_assert!((v - (best as f64).log10()).abs() < 1e-9);
                        }
                        _ => prop_assert_eq!(v, -1.0),
                    }
                }
            }
        }
    }

    #[test]
    fn prop_nfa_increases_with_criterion(
        a in 1e-6f32..0.5, factor in 1.01f32..10.0, s in 3usize..6, holes in 0usize..2
    ) {
        let tags = vec![Some("x".to_string()), Some("y".to_string())];
        let mut points = PointsFile::new(100, 100, tags, 8);
        for k in 0..8 {
            points.push_point(k, &[k as f64, 1.0]).unwrap();
            points.push_point(k, &[k as f64, 50.0]).unwrap();
        }
        let m = NfaModel::new(&points, false, false).unwrap();
        let l = s + holes;
        let j = if holes > 0 { 2 } else { 1 };
        let b = (a * factor).min(1.0);
        if b > a {
            prop_assert!(m.log_nfa(7, a, l, s, j) < m.log_nfa(7, b, l, s, j));
        }
    }

    #[test]
    fn prop_detections_are_disjoint_and_consistent(points in arb_scene(), max_hole in -1i64..2) {
        let total = points.total_points();
        let options = DetectionOptions { max_hole, ..Default::default() };
        let result = Detector::new(options).run(points, &Silent).unwrap();

        let mut seen = HashSet::new();
        for traj in &result.store {
            prop_assert!(traj.size() >= 3);
            for p in traj.real_points() {
                prop_assert!(seen.insert(p));
            }
        }
        for (traj, c) in result.store.iter().zip(&result.characteristics) {
            prop_assert!(c.log_nfa <= 1e-2);
            let stored: f64 = traj.payload.parse().unwrap();
            prop_assert!((stored - c.log_nfa).abs() < 1e-2);
        }
        prop_assert!(result.rounds <= total.max(1));
    }
}
