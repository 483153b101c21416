use rand::Rng;

const MS_PER_MINUTE: u64 = 60_000;

/// Split `items` into `min(clusters, len)` contiguous chunks, sizes differing
/// by at most one with the larger chunks first. `clusters == 0` counts as 1.
pub fn partition<T>(items: Vec<T>, clusters: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let clusters = clusters.max(1).min(items.len());
    let base = items.len() / clusters;
    let extra = items.len() % clusters;

    let mut chunks = Vec::with_capacity(clusters);
    let mut rest = items.into_iter();
    for index in 0..clusters {
        let size = base + usize::from(index < extra);
        chunks.push(rest.by_ref().take(size).collect());
    }
    chunks
}

/// Start delay of chunk `index`, in milliseconds. Chunk 0 starts right away;
/// every other chunk draws independently from `[min_minutes, max_minutes]`.
pub fn stagger_delay(index: usize, min_minutes: u64, max_minutes: u64) -> u64 {
    if index == 0 {
        return 0;
    }
    let min = min_minutes.saturating_mul(MS_PER_MINUTE);
    let max = max_minutes.saturating_mul(MS_PER_MINUTE);
    if min >= max {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}
