//! Compositor task
//!
//! Runs for the lifetime of a conference, independent of any connection.
//! Each tick drains at most one frame per camera buffer, composes them over
//! the current screen share, and broadcasts the result on the video
//! channel. Cadence is fixed; with no input the placeholder background
//! still goes out, so subscribers always have a live stream.

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};

use super::conference::ConferenceRelay;

pub(super) async fn run(relay: Arc<ConferenceRelay>) {
    let mut ticker = interval(relay.compositor_interval());
    // A stalled tick (slow subscriber sockets) must not cause a burst of
    // catch-up frames afterwards.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        relay.composite_once().await;
    }
}
