//! Periodic heartbeat producer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info_span, trace, Instrument};

use super::{Event, Stream, DEFAULT_HEARTBEAT_INTERVAL};
use crate::context::Context;

/// Send a heartbeat event into `stream` every `interval`.
///
/// The first heartbeat goes out one interval after spawning. The task
/// stops when the stream closes, `ctx` stops, or a send fails, and yields
/// the number of heartbeats delivered. A zero `interval` falls back to
/// [`DEFAULT_HEARTBEAT_INTERVAL`].
#[must_use]
pub fn spawn_heartbeat(
    stream: Arc<dyn Stream>,
    interval: Duration,
    ctx: Context,
) -> JoinHandle<u64> {
    let interval = if interval.is_zero() {
        DEFAULT_HEARTBEAT_INTERVAL
    } else {
        interval
    };
    let span = info_span!("heartbeat", stream_id = %stream.id());

    tokio::spawn(
        async move {
            let done = stream.done();
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut sent: u64 = 0;

            loop {
                tokio::select! {
                    biased;
                    reason = ctx.done() => {
                        debug!(%reason, sent, "heartbeat stopped by context");
                        break;
                    }
                    () = done.wait() => {
                        debug!(sent, "heartbeat stopped, stream closed");
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                match stream.send(&ctx, Event::heartbeat()).await {
                    Ok(()) => {
                        sent += 1;
                        trace!(sent, "heartbeat sent");
                    }
                    Err(err) => {
                        debug!(%err, sent, "heartbeat send failed");
                        break;
                    }
                }
            }

            sent
        }
        .instrument(span),
    )
}
