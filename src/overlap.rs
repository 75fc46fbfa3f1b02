use crate::models::SyncEntry;

/// Shifts overlapping entries of one task so that no two intervals overlap.
/// An entry starting before the previous entry ends is moved to start exactly
/// at that end; its duration is preserved, never truncated. Later entries can
/// end up pushed past their original wall-clock times, which the sync target
/// tolerates better than overlapping intervals.
pub fn shift_overlaps(mut entries: Vec<SyncEntry>) -> Vec<SyncEntry> {
    entries.sort_by_key(|entry| entry.start_ms);

    let mut running_end: Option<i64> = None;
    for entry in &mut entries {
        if let Some(end) = running_end {
            if entry.start_ms < end {
                entry.start_ms = end;
                entry.end_ms = end + entry.duration_ms;
            }
        }
        running_end = Some(entry.end_ms);
    }
    entries
}
