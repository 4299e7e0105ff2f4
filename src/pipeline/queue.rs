// SPDX-License-Identifier: GPL-3.0-only

//! Bounded frame queue shared by all stream producers
//!
//! Any number of producer threads push frames; a single consumer drains them
//! in arrival order. When the queue is full the configured
//! [`OverflowPolicy`] decides what happens to the incoming frame.
//!
//! The consumer never blocks forever: once the queue has been flushed (and
//! nothing was pushed since), closed, or every registered producer has gone
//! away, waiting returns a terminal result instead.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::media::Frame;

/// What happens to a push when the queue is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// The producer waits until the consumer makes room
    Block,
    /// The oldest pending frame is discarded to make room
    #[default]
    DropOldest,
    /// The incoming frame is discarded
    DropNewest,
}

impl OverflowPolicy {
    pub const ALL: [OverflowPolicy; 3] = [
        OverflowPolicy::Block,
        OverflowPolicy::DropOldest,
        OverflowPolicy::DropNewest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OverflowPolicy::Block => "block",
            OverflowPolicy::DropOldest => "drop-oldest",
            OverflowPolicy::DropNewest => "drop-newest",
        }
    }
}

impl std::fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OverflowPolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                format!("unknown overflow policy '{}' (block, drop-oldest, drop-newest)", s)
            })
    }
}

/// Result of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Frame queued without loss
    Enqueued,
    /// Frame queued after evicting the oldest pending frame
    DroppedOldest,
    /// Queue was full, the pushed frame was discarded
    DroppedNewest,
    /// Queue is closed, the pushed frame was discarded
    Closed,
}

impl PushOutcome {
    /// Whether the pushed frame is now in the queue
    pub fn accepted(&self) -> bool {
        matches!(self, PushOutcome::Enqueued | PushOutcome::DroppedOldest)
    }
}

/// Result of a bounded wait
#[derive(Debug)]
pub enum WaitOutcome {
    /// The oldest pending frame
    Frame(Frame),
    /// No frame arrived within the timeout
    TimedOut,
    /// Queue flushed, closed, or abandoned by all producers
    Terminated,
}

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<Frame>,
    /// Set by flush, cleared by the next accepted push
    flushed: bool,
    closed: bool,
    producers: usize,
    had_producers: bool,
    dropped: u64,
}

impl QueueState {
    fn is_terminal(&self) -> bool {
        self.flushed || self.closed || (self.had_producers && self.producers == 0)
    }
}

/// Bounded FIFO of frames awaiting display
#[derive(Debug)]
pub struct FrameQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames (at least one)
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// Frames discarded by the overflow policy so far
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of live producer handles
    pub fn producer_count(&self) -> usize {
        self.lock().producers
    }

    /// Register a producer
    ///
    /// The queue counts live producers; once the last handle is dropped an
    /// empty queue reports termination instead of blocking the consumer.
    pub fn register_producer(self: &Arc<Self>) -> Producer {
        let mut state = self.lock();
        state.producers += 1;
        state.had_producers = true;
        debug!(producers = state.producers, "Producer registered");
        Producer {
            queue: Arc::clone(self),
        }
    }

    /// Enqueue a frame, applying the overflow policy when full
    pub fn push(&self, frame: Frame) -> PushOutcome {
        let mut state = self.lock();

        if state.closed {
            return PushOutcome::Closed;
        }

        let mut outcome = PushOutcome::Enqueued;
        if state.frames.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropNewest => {
                    state.dropped += 1;
                    trace!(stream = %frame.stream(), "Queue full, dropping incoming frame");
                    return PushOutcome::DroppedNewest;
                }
                OverflowPolicy::DropOldest => {
                    if let Some(evicted) = state.frames.pop_front() {
                        trace!(stream = %evicted.stream(), "Queue full, evicting oldest frame");
                    }
                    state.dropped += 1;
                    outcome = PushOutcome::DroppedOldest;
                }
                OverflowPolicy::Block => {
                    while state.frames.len() >= self.capacity && !state.closed {
                        state = self
                            .not_full
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    if state.closed {
                        return PushOutcome::Closed;
                    }
                }
            }
        }

        state.frames.push_back(frame);
        state.flushed = false;
        drop(state);
        self.not_empty.notify_one();
        outcome
    }

    /// Block until a frame is available and return the oldest one
    ///
    /// Returns `None` once the queue is flushed, closed, or abandoned by all
    /// of its producers.
    pub fn wait_for_frame(&self) -> Option<Frame> {
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.frames.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(frame);
            }
            if state.is_terminal() {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`wait_for_frame`](Self::wait_for_frame) but gives up after `timeout`
    pub fn wait_for_frame_timeout(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.frames.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return WaitOutcome::Frame(frame);
            }
            if state.is_terminal() {
                return WaitOutcome::Terminated;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            state = self
                .not_empty
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Take the oldest frame without blocking
    pub fn poll_for_frame(&self) -> Option<Frame> {
        let frame = self.lock().frames.pop_front();
        if frame.is_some() {
            self.not_full.notify_one();
        }
        frame
    }

    /// Discard all pending frames and wake every waiter
    ///
    /// A consumer waiting now, or waiting later before anything new is
    /// pushed, receives the terminal result. Returns the number of frames
    /// discarded.
    pub fn flush(&self) -> usize {
        let discarded: Vec<Frame> = {
            let mut state = self.lock();
            state.flushed = true;
            state.frames.drain(..).collect()
        };
        self.not_empty.notify_all();
        self.not_full.notify_all();

        debug!(discarded = discarded.len(), "Frame queue flushed");
        // Pending frames are released here, outside the lock
        discarded.len()
    }

    /// Stop accepting frames
    ///
    /// Pending frames can still be drained; after that the consumer gets the
    /// terminal result. Producers blocked on a full queue are released.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
        debug!("Frame queue closed");
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A panicking producer must not wedge the display loop
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle held by a producing stream
///
/// Dropping the last producer of a queue terminates waits on it once it
/// runs empty.
#[derive(Debug)]
pub struct Producer {
    queue: Arc<FrameQueue>,
}

impl Producer {
    pub fn push(&self, frame: Frame) -> PushOutcome {
        self.queue.push(frame)
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        let remaining = {
            let mut state = self.queue.lock();
            state.producers = state.producers.saturating_sub(1);
            state.producers
        };
        debug!(producers = remaining, "Producer released");
        if remaining == 0 {
            self.queue.not_empty.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{PixelFormat, StreamKind};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn frame(stream: StreamKind, sequence: u64) -> Frame {
        Frame::new(stream, 1, 1, PixelFormat::Y8, vec![sequence as u8])
            .with_sequence(sequence, Duration::ZERO)
    }

    fn drain(queue: &FrameQueue) -> Vec<(StreamKind, u64)> {
        let mut out = Vec::new();
        while let Some(f) = queue.poll_for_frame() {
            out.push((f.stream(), f.sequence()));
        }
        out
    }

    #[test]
    fn test_depth_then_color_order() {
        let queue = FrameQueue::new(10, OverflowPolicy::DropOldest);
        queue.push(frame(StreamKind::Depth, 1));
        queue.push(frame(StreamKind::Color, 2));

        let first = queue.wait_for_frame().expect("first frame");
        let second = queue.wait_for_frame().expect("second frame");
        assert_eq!(first.stream(), StreamKind::Depth);
        assert_eq!(second.stream(), StreamKind::Color);
    }

    #[test]
    fn test_fifo_across_interleaved_streams() {
        let queue = FrameQueue::new(16, OverflowPolicy::Block);
        let pushed: Vec<(StreamKind, u64)> = (0..12)
            .map(|i| (StreamKind::ALL[i as usize % StreamKind::COUNT], i))
            .collect();
        for &(stream, seq) in &pushed {
            assert_eq!(queue.push(frame(stream, seq)), PushOutcome::Enqueued);
        }
        assert_eq!(drain(&queue), pushed);
    }

    #[test]
    fn test_flush_then_wait_returns_terminal() {
        let queue = FrameQueue::new(4, OverflowPolicy::DropOldest);
        queue.push(frame(StreamKind::Depth, 0));
        queue.push(frame(StreamKind::Depth, 1));

        assert_eq!(queue.flush(), 2);
        assert!(queue.is_empty());
        assert!(queue.wait_for_frame().is_none());
        assert!(matches!(
            queue.wait_for_frame_timeout(Duration::from_secs(5)),
            WaitOutcome::Terminated
        ));
    }

    #[test]
    fn test_push_after_flush_revives_queue() {
        let queue = FrameQueue::new(4, OverflowPolicy::DropOldest);
        queue.flush();
        queue.push(frame(StreamKind::Infrared, 7));
        let f = queue.wait_for_frame().expect("frame after flush");
        assert_eq!(f.sequence(), 7);
    }

    #[test]
    fn test_flush_unblocks_waiter() {
        let queue = Arc::new(FrameQueue::new(4, OverflowPolicy::DropOldest));
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_for_frame().is_none())
        };

        thread::sleep(Duration::from_millis(50));
        queue.flush();
        assert!(waiter.join().expect("waiter thread"));
    }

    #[test]
    fn test_flush_releases_pending_frames() {
        let pixels: Arc<[u8]> = Arc::from(vec![1u8; 4]);
        let queue = FrameQueue::new(4, OverflowPolicy::DropOldest);
        queue.push(Frame::new(StreamKind::Depth, 2, 1, PixelFormat::Z16, pixels.clone()));
        assert_eq!(Arc::strong_count(&pixels), 2);
        queue.flush();
        assert_eq!(Arc::strong_count(&pixels), 1);
    }

    #[test]
    fn test_drop_oldest_overflow() {
        let queue = FrameQueue::new(3, OverflowPolicy::DropOldest);
        for seq in 0..3 {
            assert_eq!(queue.push(frame(StreamKind::Depth, seq)), PushOutcome::Enqueued);
        }
        assert_eq!(queue.push(frame(StreamKind::Color, 3)), PushOutcome::DroppedOldest);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 1);
        let sequences: Vec<u64> = drain(&queue).into_iter().map(|(_, s)| s).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_drop_newest_overflow() {
        let queue = FrameQueue::new(3, OverflowPolicy::DropNewest);
        for seq in 0..3 {
            queue.push(frame(StreamKind::Depth, seq));
        }
        assert_eq!(queue.push(frame(StreamKind::Color, 3)), PushOutcome::DroppedNewest);
        assert_eq!(queue.push(frame(StreamKind::Color, 4)), PushOutcome::DroppedNewest);
        assert_eq!(queue.dropped(), 2);
        let sequences: Vec<u64> = drain(&queue).into_iter().map(|(_, s)| s).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn test_block_policy_waits_for_consumer() {
        let queue = Arc::new(FrameQueue::new(2, OverflowPolicy::Block));
        queue.push(frame(StreamKind::Depth, 0));
        queue.push(frame(StreamKind::Depth, 1));

        let pushed = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = Arc::clone(&queue);
            let pushed = Arc::clone(&pushed);
            thread::spawn(move || {
                let outcome = queue.push(frame(StreamKind::Color, 2));
                pushed.store(true, Ordering::SeqCst);
                outcome
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!pushed.load(Ordering::SeqCst), "push should block while full");

        let first = queue.wait_for_frame().expect("frame");
        assert_eq!(first.sequence(), 0);
        assert_eq!(producer.join().expect("producer"), PushOutcome::Enqueued);
        assert!(pushed.load(Ordering::SeqCst));

        let sequences: Vec<u64> = drain(&queue).into_iter().map(|(_, s)| s).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn test_close_releases_blocked_producer() {
        let queue = Arc::new(FrameQueue::new(1, OverflowPolicy::Block));
        queue.push(frame(StreamKind::Depth, 0));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(frame(StreamKind::Depth, 1)))
        };
        thread::sleep(Duration::from_millis(50));
        queue.close();

        assert_eq!(producer.join().expect("producer"), PushOutcome::Closed);
        // Pending frame still drains, then terminal
        assert!(queue.wait_for_frame().is_some());
        assert!(queue.wait_for_frame().is_none());
    }

    #[test]
    fn test_all_producers_gone_terminates_wait() {
        let queue = Arc::new(FrameQueue::new(4, OverflowPolicy::DropOldest));
        let producer = queue.register_producer();
        producer.push(frame(StreamKind::Color, 0));
        assert_eq!(queue.producer_count(), 1);
        drop(producer);

        assert!(queue.wait_for_frame().is_some());
        assert!(queue.wait_for_frame().is_none());
    }

    #[test]
    fn test_last_producer_drop_wakes_waiter() {
        let queue = Arc::new(FrameQueue::new(4, OverflowPolicy::DropOldest));
        let producer = queue.register_producer();
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_for_frame().is_none())
        };
        thread::sleep(Duration::from_millis(50));
        drop(producer);
        assert!(waiter.join().expect("waiter"));
    }

    #[test]
    fn test_wait_timeout() {
        let queue = FrameQueue::new(4, OverflowPolicy::DropOldest);
        let started = Instant::now();
        assert!(matches!(
            queue.wait_for_frame_timeout(Duration::from_millis(30)),
            WaitOutcome::TimedOut
        ));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_concurrent_producers_keep_per_stream_order() {
        let queue = Arc::new(FrameQueue::new(8, OverflowPolicy::Block));
        let handles: Vec<_> = StreamKind::ALL
            .into_iter()
            .map(|stream| {
                let producer = queue.register_producer();
                thread::spawn(move || {
                    for seq in 0..50 {
                        producer.push(frame(stream, seq));
                    }
                })
            })
            .collect();

        let mut last = [None::<u64>; StreamKind::COUNT];
        let mut received = 0;
        while let Some(f) = queue.wait_for_frame() {
            let slot = &mut last[f.stream().index()];
            if let Some(prev) = *slot {
                assert!(f.sequence() > prev, "stream order violated");
            }
            *slot = Some(f.sequence());
            received += 1;
        }
        for handle in handles {
            handle.join().expect("producer thread");
        }
        assert_eq!(received, 150);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = FrameQueue::new(0, OverflowPolicy::DropNewest);
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.push(frame(StreamKind::Depth, 0)), PushOutcome::Enqueued);
        assert_eq!(queue.push(frame(StreamKind::Depth, 1)), PushOutcome::DroppedNewest);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("drop-newest".parse(), Ok(OverflowPolicy::DropNewest));
        assert_eq!("block".parse(), Ok(OverflowPolicy::Block));
        assert!("drop-random".parse::<OverflowPolicy>().is_err());
    }
}
