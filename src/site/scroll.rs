/// Scroll offsets for a read-through in `steps` equal slices, clamped so the
/// last slices stop where the viewport reaches the bottom.
pub fn scroll_positions(total_height: i64, viewport_height: i64, steps: u32) -> Vec<i64> {
    if steps == 0 {
        return Vec::new();
    }
    let step = total_height / i64::from(steps);
    let max_offset = (total_height - viewport_height).max(0);

    (1..=i64::from(steps))
        .map(|i| (i * step).min(max_offset))
        .collect()
}
