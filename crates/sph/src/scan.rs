//! Work-efficient exclusive prefix sum (Blelloch 1990).
//!
//! The spatial hash converts per-bucket counts into bucket offsets with this
//! scan. Each level of the up-sweep and down-sweep is a synchronization point
//! in the GPU formulation; here every level is a plain loop over independent
//! pairs, so the levels map one-to-one onto compute dispatches.

/// Replace `values` with its exclusive prefix sum and return the total.
///
/// Internally pads to the next power of two:
/// 1. up-sweep, `log2(n)` levels building partial sums in place;
/// 2. reset of the root to zero;
/// 3. down-sweep, `log2(n)` levels distributing the partial sums.
pub fn exclusive_scan_in_place(values: &mut Vec<u32>) -> u32 {
    let len = values.len();
    if len == 0 {
        return 0;
    }
    let n = len.next_power_of_two();
    values.resize(n, 0);

    // Up-sweep (reduce)
    let mut stride = 1;
    while stride < n {
        let step = stride * 2;
        for right in (step - 1..n).step_by(step) {
            values[right] = values[right].wrapping_add(values[right - stride]);
        }
        stride = step;
    }

    let total = values[n - 1];
    values[n - 1] = 0;

    // Down-sweep
    let mut stride = n / 2;
    while stride >= 1 {
        let step = stride * 2;
        for right in (step - 1..n).step_by(step) {
            let left = right - stride;
            let carried = values[left];
            values[left] = values[right];
            values[right] = values[right].wrapping_add(carried);
        }
        stride /= 2;
    }

    values.truncate(len);
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential(values: &[u32]) -> (Vec<u32>, u32) {
        let mut running = 0;
        let out = values
            .iter()
            .map(|&v| {
                let before = running;
                running += v;
                before
            })
            .collect();
        (out, running)
    }

    #[test]
    fn empty() {
        let mut v = Vec::new();
        assert_eq!(exclusive_scan_in_place(&mut v), 0);
        assert!(v.is_empty());
    }

    #[test]
    fn single() {
        let mut v = vec![7];
        assert_eq!(exclusive_scan_in_place(&mut v), 7);
        assert_eq!(v, vec![0]);
    }

    #[test]
    fn power_of_two_length() {
        let mut v = vec![3, 1, 7, 0, 4, 1, 6, 3];
        let total = exclusive_scan_in_place(&mut v);
        assert_eq!(v, vec![0, 3, 4, 11, 11, 15, 16, 22]);
        assert_eq!(total, 25);
    }

    #[test]
    fn matches_sequential_for_odd_lengths() {
        for len in [2usize, 3, 5, 13, 100, 1000] {
            let input: Vec<u32> = (0..len).map(|i| ((i * 7919) % 13) as u32).collect();
            let (expected, expected_total) = sequential(&input);
            let mut v = input.clone();
            let total = exclusive_scan_in_place(&mut v);
            assert_eq!(v, expected, "len={len}");
            assert_eq!(total, expected_total, "len={len}");
        }
    }
}
