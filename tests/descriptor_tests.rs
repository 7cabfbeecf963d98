use astre::error::AstreError;
use astre::trajectory::{Step, Trajectory, TrajectoryStore};
use rstest::rstest;

#[rstest]
#[case("S0 P1 P2 P3", 0, vec![Step::Real(1), Step::Real(2), Step::Real(3)])]
#[case("S2 P0 H2 P4;", 2, vec![Step::Real(0), Step::Absent, Step::Absent, Step::Real(4)])]
#[case("S1 P0 F4 P1", 1, vec![Step::Real(0), Step::Absent, Step::Absent, Step::Real(1)])]
#[case("S0 P5 C1 P6 C2", 0, vec![Step::Real(5), Step::Real(6)])]
#[case("  S3\tP1 H1\nP2 ; trailing junk", 3, vec![Step::Real(1), Step::Absent, Step::Real(2)])]
#[case("S0 P1 A 2.5 -3 P0", 0, vec![Step::Real(1), Step::Interpolated { x: 2.5, y: -3.0 }, Step::Real(0)])]
fn test_parse(#[case] text: &str, #[case] start: usize, #[case] steps: Vec<Step>) {
    let t = Trajectory::parse_descriptor(text).unwrap();
    assert_eq!(t.start, start);
    assert_eq!(t.steps, steps);
}

#[rstest]
#[case("")]
#[case("P1 S0")]
#[case("S0 P1 S1")]
#[case("S-1 P0")]
#[case("S0 P1 F0")]
#[case("S0 P1 C3")]
#[case("S0 Q1")]
#[case("S0 Px")]
#[case("S0 A 1")]
fn test_parse_errors(#[case] text: &str) {
    assert!(matches!(
        Trajectory::parse_descriptor(text),
        Err(AstreError::Descriptor(_))
    ));
}

#[rstest]
#[case("S0 P0 H4000000000 P1")]
#[case("S0 P0 F9000000000000000000 P1")]
#[case("S0 P0 F4000000000")]
#[case("S9223372036854775807 P0")]
fn test_huge_spans_are_rejected(#[case] text: &str) {
    assert!(matches!(
        Trajectory::parse_descriptor(text),
        Err(AstreError::Descriptor(_))
    ));
}

#[rstest]
#[case("S0 P0 H2 P1", true)]
#[case("S0 P0 H3 P1", false)]
#[case("S1 P0 F3 P1", true)]
#[case("S1 P0 F4 P1", false)]
#[case("S3 P0", true)]
#[case("S4 P0", false)]
#[case("S2 P0 A 1 1", true)]
#[case("S2 P0 P1 A 1 1", false)]
fn test_parse_within_frame_count(#[case] text: &str, #[case] fits: bool) {
    match Trajectory::parse_descriptor_within(text, 4) {
        Ok(t) => {
            assert!(fits, "{} should overflow 4 frames", text);
            assert!(t.end() < 4);
        }
        Err(e) => {
            assert!(!fits, "{} should fit: {}", text, e);
            assert!(matches!(e, AstreError::Descriptor(_)));
        }
    }
}

#[test]
fn test_print() {
    let t = Trajectory::new(4, vec![Step::Real(3), Step::Absent, Step::Real(0)]);
    assert_eq!(t.descriptor(), "S4 P3 H1 P0 ");
    let back: Trajectory = t.descriptor().parse().unwrap();
    assert_eq!(back, t);
}

#[test]
fn test_shape_helpers() {
    let t: Trajectory = "S2 P0 H3 P1 P4".parse().unwrap();
    assert_eq!(t.len(), 6);
    assert_eq!(t.end(), 7);
    assert_eq!(t.size(), 3);
    assert_eq!(t.count_links(), 2);
    let reals: Vec<_> = t.real_points().collect();
    assert_eq!(reals, vec![(2, 0), (6, 1), (7, 4)]);
}

#[test]
fn test_store() {
    let mut store = TrajectoryStore::new();
    assert!(store.is_empty());
    assert_eq!(store.push("S0 P0 P0 P0".parse().unwrap()), 0);
    assert_eq!(store.push("S1 P1 H1 P1".parse().unwrap()), 1);
    assert_eq!(store.len(), 2);
    assert_eq!(store.count_links(), 3);
    assert_eq!(store.get(1).map(|t| t.start), Some(1));
    assert!(store.get(2).is_none());
    assert_eq!((&store).into_iter().count(), 2);
}
