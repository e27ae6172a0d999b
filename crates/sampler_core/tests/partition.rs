use pretty_assertions::assert_eq;
use sampler_core::{partition, SizeRange};

/// Assert that `ranges`, sorted, exactly tile `bounds` with no gaps and no
/// overlaps.
fn assert_exact_cover(bounds: SizeRange, mut ranges: Vec<SizeRange>) {
    ranges.sort();
    assert!(!ranges.is_empty());
    assert_eq!(ranges.first().unwrap().low, bounds.low);
    assert_eq!(ranges.last().unwrap().high, bounds.high);
    for pair in ranges.windows(2) {
        assert_eq!(
            pair[0].high + 1,
            pair[1].low,
            "gap or overlap between {} and {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn partition_covers_bounds_exactly() {
    for (low, high, width) in [
        (1, 16, 4),
        (1, 16, 5),
        (1, 1, 1),
        (1, 393_216, 1024),
        (7, 19, 100),
    ] {
        let bounds = SizeRange::new(low, high);
        assert_exact_cover(bounds, partition(bounds, width));
    }
}

#[test]
fn partition_worked_example() {
    let strata = partition(SizeRange::new(1, 16), 4);
    assert_eq!(
        strata,
        vec![
            SizeRange::new(1, 4),
            SizeRange::new(5, 8),
            SizeRange::new(9, 12),
            SizeRange::new(13, 16),
        ]
    );
}

#[test]
fn final_stratum_may_be_shorter() {
    let strata = partition(SizeRange::new(1, 10), 4);
    assert_eq!(strata.last().unwrap(), &SizeRange::new(9, 10));
}

#[test]
fn bisection_preserves_cover() {
    let bounds = SizeRange::new(1, 100);
    let mut ranges = partition(bounds, 7);
    // Split every splittable range once, twice over.
    for _ in 0..2 {
        ranges = ranges
            .into_iter()
            .flat_map(|r| {
                if r.is_unit() {
                    vec![r]
                } else {
                    let (a, b) = r.bisect();
                    vec![a, b]
                }
            })
            .collect();
    }
    assert_exact_cover(bounds, ranges);
}

#[test]
fn bisection_terminates_within_log2_depth() {
    for len in [1u64, 2, 3, 5, 8, 1000, 393_216] {
        let mut ranges = vec![SizeRange::new(1, len)];
        let bound = 64 - (len.max(1) - 1).leading_zeros(); // ceil(log2(len))
        let mut depth = 0u32;
        while ranges.iter().any(|r| !r.is_unit()) {
            ranges = ranges
                .into_iter()
                .flat_map(|r| {
                    if r.is_unit() {
                        vec![r]
                    } else {
                        let (a, b) = r.bisect();
                        vec![a, b]
                    }
                })
                .collect();
            depth += 1;
            assert!(depth <= bound, "length {len} took more than {bound} splits");
        }
    }
}
