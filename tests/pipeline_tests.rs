// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the frame queue and frontbuffer table

use depthview::media::{Frame, FrameData, PixelFormat, StreamKind};
use depthview::pipeline::{
    FrameQueue, FrontbufferTable, OverflowPolicy, PushOutcome, WaitOutcome,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn frame(stream: StreamKind, sequence: u64) -> Frame {
    Frame::new(stream, 2, 1, PixelFormat::Y8, vec![0u8, 1]).with_sequence(sequence, Duration::ZERO)
}

#[test]
fn test_two_producers_one_consumer() {
    let queue = Arc::new(FrameQueue::new(4, OverflowPolicy::Block));
    let per_stream = 50u64;

    let producers: Vec<_> = [StreamKind::Depth, StreamKind::Color]
        .into_iter()
        .map(|stream| {
            let producer = queue.register_producer();
            thread::spawn(move || {
                for seq in 0..per_stream {
                    assert!(producer.push(frame(stream, seq)).accepted());
                }
            })
        })
        .collect();

    let mut last = [None::<u64>; StreamKind::COUNT];
    let mut received = 0;
    while let Some(f) = queue.wait_for_frame() {
        // Per-stream order survives interleaving
        let slot = &mut last[f.stream().index()];
        assert!(slot.is_none_or(|prev| prev < f.sequence()));
        *slot = Some(f.sequence());
        received += 1;
    }

    for handle in producers {
        handle.join().unwrap();
    }
    assert_eq!(received, per_stream * 2);
    assert_eq!(queue.dropped(), 0);
}

#[test]
fn test_flush_wakes_blocked_consumer() {
    let queue = Arc::new(FrameQueue::new(2, OverflowPolicy::DropOldest));
    let _producer = queue.register_producer();

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.wait_for_frame())
    };
    thread::sleep(Duration::from_millis(20));
    queue.flush();

    assert!(consumer.join().unwrap().is_none());
}

#[test]
fn test_close_releases_blocked_producer() {
    let queue = Arc::new(FrameQueue::new(1, OverflowPolicy::Block));
    let producer = queue.register_producer();
    assert_eq!(producer.push(frame(StreamKind::Depth, 0)), PushOutcome::Enqueued);

    let blocked = thread::spawn(move || producer.push(frame(StreamKind::Depth, 1)));
    thread::sleep(Duration::from_millis(20));
    queue.close();

    assert_eq!(blocked.join().unwrap(), PushOutcome::Closed);
}

#[test]
fn test_overflow_outcome_is_deterministic() {
    for (policy, expected) in [
        (OverflowPolicy::DropOldest, PushOutcome::DroppedOldest),
        (OverflowPolicy::DropNewest, PushOutcome::DroppedNewest),
    ] {
        for _ in 0..3 {
            let queue = FrameQueue::new(3, policy);
            for seq in 0..3 {
                assert_eq!(queue.push(frame(StreamKind::Infrared, seq)), PushOutcome::Enqueued);
            }
            assert_eq!(queue.push(frame(StreamKind::Infrared, 3)), expected);
            assert_eq!(queue.len(), 3);
        }
    }
}

#[test]
fn test_timeout_then_frame() {
    let queue = Arc::new(FrameQueue::new(2, OverflowPolicy::DropOldest));
    let producer = queue.register_producer();

    assert!(matches!(
        queue.wait_for_frame_timeout(Duration::from_millis(10)),
        WaitOutcome::TimedOut
    ));

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        producer.push(frame(StreamKind::Color, 7));
    });

    match queue.wait_for_frame_timeout(Duration::from_secs(5)) {
        WaitOutcome::Frame(f) => assert_eq!(f.sequence(), 7),
        other => panic!("expected a frame, got {:?}", other),
    }
}

#[test]
fn test_frontbuffer_releases_overwritten_frames() {
    let table = FrontbufferTable::new();
    let data: Arc<[u8]> = Arc::from(vec![0u8; 4]);

    for seq in 0..5 {
        let frame = Frame::new(
            StreamKind::Depth,
            1,
            2,
            PixelFormat::Z16,
            FrameData::from(Arc::clone(&data)),
        )
        .with_sequence(seq, Duration::ZERO);
        table.update(frame);
        // Test handle plus the single installed frame
        assert_eq!(Arc::strong_count(&data), 2);
    }

    assert_eq!(table.get(StreamKind::Depth).unwrap().sequence(), 4);
    assert!(table.get(StreamKind::Color).is_none());

    table.clear();
    assert_eq!(Arc::strong_count(&data), 1);
}

#[test]
fn test_frontbuffer_slots_are_independent() {
    let table = FrontbufferTable::new();
    table.update(frame(StreamKind::Color, 1));
    table.update(frame(StreamKind::Infrared, 2));
    table.update(frame(StreamKind::Color, 3));

    let order: Vec<(StreamKind, u64)> = table
        .populated()
        .iter()
        .map(|f| (f.stream(), f.sequence()))
        .collect();
    assert_eq!(order, vec![(StreamKind::Infrared, 2), (StreamKind::Color, 3)]);
}
