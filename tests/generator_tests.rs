use astre::cripple::{cripple, CrippleParams};
use astre::error::AstreError;
use astre::generator::{generate, SceneParams};
use std::collections::HashSet;

fn params(seed: u64) -> SceneParams {
    SceneParams {
        frames: 12,
        trajectories: 6,
        width: 300,
        height: 300,
        noise: 10,
        seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn test_same_seed_same_scene() {
    let a = generate(&params(3)).unwrap();
    let b = generate(&params(3)).unwrap();
    assert_eq!(a.points.render().split("DATA").nth(1), b.points.render().split("DATA").nth(1));
    assert_eq!(a.trajectories, 6);
}

#[test]
fn test_points_are_integral_distinct_and_inside() {
    let scene = generate(&params(11)).unwrap();
    let p = &scene.points;
    assert_eq!(p.n_frames(), 12);
    assert_eq!(p.n_fields(), 3);

    for k in 0..p.n_frames() {
        let mut seen = HashSet::new();
        for i in 0..p.n_points(k) {
            let (x, y) = p.xy(k, i);
            assert_eq!(x.fract(), 0.0);
            assert_eq!(y.fract(), 0.0);
            assert!((0.0..300.0).contains(&x) && (0.0..300.0).contains(&y));
            assert!(seen.insert((x as i64, y as i64)));
        }
    }
}

#[test]
fn test_each_trajectory_covers_every_frame() {
    let scene = generate(&params(5)).unwrap();
    let trajs = scene.points.extract_trajectories(2).unwrap();
    assert_eq!(trajs.len(), 6);
    for t in &trajs {
        assert_eq!(t.start, 0);
        assert_eq!(t.size(), 12);
    }

    let noise: usize = (0..12)
        .map(|k| {
            (0..scene.points.n_points(k))
                .filter(|&i| scene.points.point(k, i)[2] < 0.0)
                .count()
        })
        .sum();
    assert_eq!(noise, 12 * 10);
}

#[test]
fn test_random_noise_is_bounded() {
    let scene = generate(&SceneParams {
        trajectories: 0,
        random_noise: true,
        ..params(8)
    })
    .unwrap();
    for k in 0..12 {
        assert!(scene.points.n_points(k) <= 10);
    }
}

#[test]
fn test_exiting_trajectories_are_cut() {
    let scene = generate(&SceneParams {
        frames: 30,
        trajectories: 3,
        width: 60,
        height: 60,
        mean_speed: 6.0,
        allow_exit: true,
        noise: 0,
        seed: Some(1),
        ..Default::default()
    })
    .unwrap();
    let trajs = scene.points.extract_trajectories(2).unwrap();
    assert_eq!(trajs.len(), scene.trajectories);
    for t in &trajs {
        assert!(t.size() >= 3);
        assert_eq!(t.size(), t.len());
    }
}

#[test]
fn test_invalid_parameters() {
    let bad = SceneParams {
        width: 0,
        ..Default::default()
    };
    assert!(matches!(generate(&bad), Err(AstreError::Config(_))));

    let bad = SceneParams {
        speed_sigma: -1.0,
        ..Default::default()
    };
    assert!(matches!(generate(&bad), Err(AstreError::Config(_))));
}

#[test]
fn test_crowded_frame_fails() {
    let crowded = SceneParams {
        frames: 3,
        trajectories: 0,
        width: 2,
        height: 2,
        noise: 5,
        seed: Some(0),
        ..Default::default()
    };
    assert!(matches!(generate(&crowded), Err(AstreError::Validation(_))));
}

// --- CRIPPLING ---

fn rate(rate: i64) -> CrippleParams {
    CrippleParams {
        rate,
        seed: Some(5),
        ..Default::default()
    }
}

#[test]
fn test_cripple_zero_rate_keeps_everything() {
    let scene = generate(&params(2)).unwrap();
    let out = cripple(&scene.points, &rate(0)).unwrap();
    assert_eq!(out.removed, 0);

    // Only the uid may differ
    let mut kept = out.points;
    kept.uid = scene.points.uid;
    assert_eq!(kept, scene.points);
}

#[test]
fn test_cripple_full_rate_keeps_only_trajectory_ends() {
    let scene = generate(&params(4)).unwrap();
    let out = cripple(&scene.points, &rate(100)).unwrap();

    // Six trajectories over twelve frames lose their eight inner points
    assert_eq!(out.removed, 6 * 8);
    assert_eq!(out.points.total_points(), scene.points.total_points() - 48);

    let trajs = out.points.extract_trajectories(2).unwrap();
    assert_eq!(trajs.len(), 6);
    for t in &trajs {
        let frames: Vec<usize> = t.real_points().map(|(k, _)| k).collect();
        assert_eq!(frames, vec![0, 1, 10, 11]);
    }

    // Noise is untouched
    let noise = |p: &astre::points::PointsFile| {
        p.trajectory_ids(2).unwrap().iter().flatten().filter(|id| **id < 0).count()
    };
    assert_eq!(noise(&out.points), noise(&scene.points));
}

#[test]
fn test_cripple_is_seeded() {
    let scene = generate(&params(8)).unwrap();
    let a = cripple(&scene.points, &rate(50)).unwrap();
    let b = cripple(&scene.points, &rate(50)).unwrap();
    assert_eq!(a.removed, b.removed);
    assert!(a.removed > 0 && a.removed < 48);
    assert_eq!(a.points.render().split("DATA").nth(1), b.points.render().split("DATA").nth(1));
}

#[test]
fn test_cripple_rejects_bad_parameters() {
    let scene = generate(&params(1)).unwrap();
    for bad in [-1, 101] {
        assert!(matches!(cripple(&scene.points, &rate(bad)), Err(AstreError::Config(_))));
    }
    let on_y = CrippleParams {
        traj_field: 1,
        ..rate(20)
    };
    assert!(matches!(cripple(&scene.points, &on_y), Err(AstreError::Config(_))));
}
