//! Unit tests for the bounded stream: ordering, overflow policies,
//! closure, and drain.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use agent_stream::stream::{Backpressure, BufferedStream, Event, Stream};
use agent_stream::{CancelReason, Context, StreamError};

fn progress(n: u64) -> Event {
    Event::progress(json!(n))
}

fn payload(event: &Event) -> u64 {
    event.data.as_u64().expect("numeric payload")
}

// ── Ordering ─────────────────────────────────────────────────

#[tokio::test]
async fn block_mode_delivers_all_events_in_order_after_close() {
    let stream = BufferedStream::new(10, Backpressure::Block);
    let ctx = Context::background();

    for n in 0..10 {
        stream.send(&ctx, progress(n)).await.expect("send");
    }
    stream.close();

    let mut seen = Vec::new();
    while let Some(event) = stream.recv().await {
        seen.push(payload(&event));
    }
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn single_producer_order_is_preserved_under_concurrent_consumer() {
    let stream = Arc::new(BufferedStream::new(3, Backpressure::Block));

    let consumer = {
        let stream = Arc::clone(&stream);
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(event) = stream.recv().await {
                seen.push(payload(&event));
            }
            seen
        })
    };

    let ctx = Context::background();
    for n in 0..50 {
        stream.send(&ctx, progress(n)).await.expect("send");
    }
    stream.close();

    let seen = consumer.await.expect("consumer");
    assert_eq!(seen, (0..50).collect::<Vec<_>>());
}

// ── Overflow policies ────────────────────────────────────────

#[tokio::test]
async fn drop_mode_rejects_when_full() {
    let stream = BufferedStream::new(1, Backpressure::Drop);
    let ctx = Context::background();

    assert_eq!(stream.send(&ctx, progress(1)).await, Ok(()));
    assert_eq!(
        stream.send(&ctx, progress(2)).await,
        Err(StreamError::BufferFull)
    );
    assert_eq!(stream.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn block_mode_send_honours_context_deadline() {
    let stream = BufferedStream::new(1, Backpressure::Block);
    let ctx = Context::background().with_timeout(Duration::from_millis(10));

    assert_eq!(stream.send(&ctx, progress(1)).await, Ok(()));
    assert_eq!(
        stream.send(&ctx, progress(2)).await,
        Err(StreamError::Cancelled(CancelReason::DeadlineExceeded))
    );
    assert_eq!(stream.len(), 1, "timed-out event must not be enqueued");
}

#[tokio::test]
async fn blocked_send_resumes_when_consumer_frees_space() {
    let stream = Arc::new(BufferedStream::new(1, Backpressure::Block));
    let ctx = Context::background();
    stream.send(&ctx, progress(1)).await.expect("first send");

    let sender = {
        let stream = Arc::clone(&stream);
        tokio::spawn(async move { stream.send(&Context::background(), progress(2)).await })
    };
    tokio::task::yield_now().await;
    assert!(!sender.is_finished());

    assert_eq!(stream.recv().await.map(|e| payload(&e)), Some(1));
    assert_eq!(sender.await.expect("join"), Ok(()));
    assert_eq!(stream.recv().await.map(|e| payload(&e)), Some(2));
}

#[tokio::test]
async fn cancelled_context_fails_send_immediately() {
    let stream = BufferedStream::new(4, Backpressure::Block);
    let ctx = Context::background();
    ctx.cancel();

    assert_eq!(
        stream.send(&ctx, progress(1)).await,
        Err(StreamError::Cancelled(CancelReason::Canceled))
    );
    assert!(stream.is_empty());
}

#[tokio::test]
async fn cancelling_a_blocked_send_returns_cancel_reason() {
    let stream = Arc::new(BufferedStream::new(1, Backpressure::Block));
    stream
        .send(&Context::background(), progress(1))
        .await
        .expect("fill");

    let ctx = Context::background();
    let sender = {
        let stream = Arc::clone(&stream);
        let ctx = ctx.clone();
        tokio::spawn(async move { stream.send(&ctx, progress(2)).await })
    };
    tokio::task::yield_now().await;
    ctx.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(1), sender)
        .await
        .expect("bounded response to cancellation")
        .expect("join");
    assert_eq!(outcome, Err(StreamError::Cancelled(CancelReason::Canceled)));
}

// ── Closure ──────────────────────────────────────────────────

#[tokio::test]
async fn send_after_close_is_rejected() {
    let stream = BufferedStream::new(4, Backpressure::Block);
    stream.close();
    assert_eq!(
        stream.send(&Context::background(), progress(1)).await,
        Err(StreamError::Closed)
    );
}

#[tokio::test]
async fn close_releases_blocked_sender() {
    let stream = Arc::new(BufferedStream::new(1, Backpressure::Block));
    stream
        .send(&Context::background(), progress(1))
        .await
        .expect("fill");

    let sender = {
        let stream = Arc::clone(&stream);
        tokio::spawn(async move { stream.send(&Context::background(), progress(2)).await })
    };
    tokio::task::yield_now().await;
    stream.close();

    assert_eq!(sender.await.expect("join"), Err(StreamError::Closed));
    assert_eq!(stream.len(), 1);
}

#[tokio::test]
async fn close_is_idempotent() {
    let stream = BufferedStream::new(2, Backpressure::Block);
    let ctx = Context::background();
    stream.send(&ctx, progress(1)).await.expect("send");

    for _ in 0..3 {
        stream.close();
        Stream::close(&stream).await;
    }

    assert!(stream.is_closed());
    assert!(stream.done().is_ready());
    assert_eq!(stream.recv().await.map(|e| payload(&e)), Some(1));
    assert!(stream.recv().await.is_none());
    assert!(stream.recv().await.is_none());
}

#[tokio::test]
async fn event_sequence_ends_after_residue_is_read() {
    let stream = BufferedStream::new(5, Backpressure::Drop);
    let ctx = Context::background();
    for n in 0..3 {
        stream.send(&ctx, progress(n)).await.expect("send");
    }
    stream.close();

    let mut reads = 0;
    while stream.recv().await.is_some() {
        reads += 1;
    }
    assert_eq!(reads, 3);
}

#[tokio::test]
async fn waiting_consumer_is_woken_by_close() {
    let stream = Arc::new(BufferedStream::new(2, Backpressure::Block));
    let consumer = {
        let stream = Arc::clone(&stream);
        tokio::spawn(async move { stream.recv().await })
    };
    tokio::task::yield_now().await;
    stream.close();

    let next = tokio::time::timeout(Duration::from_secs(1), consumer)
        .await
        .expect("consumer woken")
        .expect("join");
    assert!(next.is_none());
}

#[tokio::test]
async fn done_is_observed_by_every_clone() {
    let stream = BufferedStream::new(1, Backpressure::Block);
    let first = stream.done();
    let second = stream.done();
    assert!(!first.is_ready());

    stream.close();
    first.wait().await;
    second.wait().await;
    assert!(stream.done().is_ready());
}

// ── Drain ────────────────────────────────────────────────────

#[tokio::test]
async fn drain_returns_queued_count_and_never_waits() {
    let stream = BufferedStream::new(8, Backpressure::Block);
    assert_eq!(stream.drain(), 0);

    let ctx = Context::background();
    for n in 0..5 {
        stream.send(&ctx, progress(n)).await.expect("send");
    }
    assert_eq!(stream.drain(), 5);
    assert!(stream.is_empty());
}

#[tokio::test]
async fn drained_events_are_never_delivered() {
    let stream = BufferedStream::new(8, Backpressure::Block);
    let ctx = Context::background();
    for n in 0..3 {
        stream.send(&ctx, progress(n)).await.expect("send");
    }
    assert_eq!(stream.drain(), 3);

    for n in 10..12 {
        stream.send(&ctx, progress(n)).await.expect("send");
    }
    stream.close();

    let mut seen = Vec::new();
    while let Some(event) = stream.recv().await {
        seen.push(payload(&event));
    }
    assert_eq!(seen, vec![10, 11]);
}

// ── Accounting across producers ──────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn successful_sends_equal_delivered_plus_residue() {
    let stream = Arc::new(BufferedStream::new(16, Backpressure::Drop));

    let consumer = {
        let stream = Arc::clone(&stream);
        tokio::spawn(async move {
            let mut delivered = 0usize;
            for _ in 0..40 {
                if stream.recv().await.is_none() {
                    break;
                }
                delivered += 1;
            }
            delivered
        })
    };

    let producers: Vec<_> = (0..8)
        .map(|p| {
            let stream = Arc::clone(&stream);
            tokio::spawn(async move {
                let ctx = Context::background();
                let mut ok = 0usize;
                for n in 0..50 {
                    if stream.send(&ctx, progress(p * 100 + n)).await.is_ok() {
                        ok += 1;
                    }
                }
                ok
            })
        })
        .collect();

    let mut sent = 0usize;
    for producer in producers {
        sent += producer.await.expect("producer");
    }
    stream.close();
    let delivered = consumer.await.expect("consumer");

    let mut residue = 0usize;
    while stream.recv().await.is_some() {
        residue += 1;
    }
    assert_eq!(sent, delivered + residue);
}

#[tokio::test]
async fn events_adapter_yields_queue_then_ends() {
    use futures_util::StreamExt as _;

    let stream = BufferedStream::new(4, Backpressure::Block);
    let ctx = Context::background();
    for n in 0..3 {
        stream.send(&ctx, progress(n)).await.expect("send");
    }
    stream.close();

    let receiver = stream.events().expect("buffered streams expose events");
    let seen: Vec<u64> = agent_stream::stream::events_stream(receiver)
        .map(|event| payload(&event))
        .collect()
        .await;
    assert_eq!(seen, vec![0, 1, 2]);
}
