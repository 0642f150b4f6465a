//! Frame-to-event clustering
//!
//! Folds frame-level detections into contiguous events. A detection joins the
//! running event when its frame is at most `max_gap` frames past the event's
//! current end frame; otherwise the running event is closed and a new one
//! starts at that detection.
//!
//! The gap is measured from the running end, so a sequence creeping forward by
//! exactly `max_gap` each step stays a single event of unbounded length.

use crate::types::{ClusteredEvent, FrameDetection};

/// Group detections into events by frame gap.
///
/// Input order does not matter: detections are sorted by frame first. Ties on
/// frame keep their input order. Every input detection is counted in exactly
/// one output event, and an empty input yields no events.
pub fn cluster_frames_into_events(
    detections: &[FrameDetection],
    max_gap: u64,
) -> Vec<ClusteredEvent> {
    let mut sorted: Vec<&FrameDetection> = detections.iter().collect();
    sorted.sort_by_key(|d| d.frame);

    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };

    let mut events = Vec::new();
    let mut current = open_event(first);

    for detection in iter {
        // Widened so frames at opposite ends of i64 cannot overflow.
        let gap = i128::from(detection.frame) - i128::from(current.end_frame);
        if gap <= i128::from(max_gap) {
            current.end_frame = detection.frame;
            current.end_time = detection.timestamp;
            current.frame_count += 1;
        } else {
            events.push(current);
            current = open_event(detection);
        }
    }
    events.push(current);

    tracing::debug!(
        detections = detections.len(),
        events = events.len(),
        max_gap,
        "Clustered detections"
    );

    events
}

fn open_event(detection: &FrameDetection) -> ClusteredEvent {
    ClusteredEvent {
        match_id: detection.match_id.clone(),
        start_frame: detection.frame,
        end_frame: detection.frame,
        start_time: detection.timestamp,
        end_time: detection.timestamp,
        frame_count: 1,
    }
}
