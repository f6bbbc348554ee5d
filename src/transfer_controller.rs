use std::sync::Mutex;
use std::time::Instant;

use humansize::{format_size, BINARY};
use tracing::info;

use crate::config::{S3_MAX_PART_NUMBER, S3_MIN_CHUNK_SIZE, S3_PART_NUMBER_MARGIN};
use crate::object_store_driver::ProgressCallback;

/// Smallest chunk size that keeps a transfer of `send_size` bytes under
/// `S3_MAX_PART_NUMBER - S3_PART_NUMBER_MARGIN` parts, floored at
/// `S3_MIN_CHUNK_SIZE`.
pub fn chunk_size_for(send_size: u64) -> u64 {
    let max_parts = S3_MAX_PART_NUMBER - S3_PART_NUMBER_MARGIN;
    let needed = send_size.div_ceil(max_parts);
    needed.max(S3_MIN_CHUNK_SIZE)
}

/// Builds a [`ProgressCallback`] that logs at most once every few seconds
/// (the driver gates call frequency; this just shapes what gets logged).
/// Each call reports instantaneous throughput — bytes and time since the
/// *previous* call, not since the transfer started — plus percent complete
/// and transferred/total.
pub fn logging_progress_callback(label: String) -> ProgressCallback {
    let state = Mutex::new((Instant::now(), 0u64));
    Box::new(move |transferred, total| {
        let (prev_time, prev_transferred) = {
            let mut state = state.lock().unwrap();
            let prev = *state;
            *state = (Instant::now(), transferred);
            prev
        };
        let elapsed = prev_time.elapsed();
        let delta = transferred.saturating_sub(prev_transferred);
        let speed = if elapsed.as_secs_f64() > 0.0 {
            delta as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let progress = if total > 0 {
            transferred as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        info!(
            label = %label,
            progress = format!("{progress:.1}%"),
            speed = format!("{}/s", format_size(speed as u64, BINARY)),
            transferred = format!("{}/{}", format_size(transferred, BINARY), format_size(total, BINARY)),
            "transfer progress",
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_respects_part_limit() {
        let send_size = 200 * 1024 * 1024 * 1024u64; // 200 GiB
        let chunk = chunk_size_for(send_size);
        let max_parts = S3_MAX_PART_NUMBER - S3_PART_NUMBER_MARGIN;
        assert!(send_size.div_ceil(chunk) <= max_parts);
    }

    #[test]
    fn chunk_size_floors_at_minimum() {
        assert_eq!(chunk_size_for(1024), S3_MIN_CHUNK_SIZE);
    }
}
