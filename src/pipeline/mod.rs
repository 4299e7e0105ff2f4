// SPDX-License-Identifier: GPL-3.0-only

//! Frame delivery between sources and the display loop
//!
//! ```text
//! stream threads ──push──▶ FrameQueue ──wait_for_frame──▶ display loop
//!                                                            │
//!                                                      FrontbufferTable
//! ```

pub mod frontbuffer;
pub mod queue;

pub use frontbuffer::FrontbufferTable;
pub use queue::{FrameQueue, OverflowPolicy, Producer, PushOutcome, WaitOutcome};
