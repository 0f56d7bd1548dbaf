//! Screen perception throttling.
//!
//! Each captured frame is reduced to a digest of its visible text. The
//! expensive vision model only runs when that digest changes (and enough
//! time has passed), or when a caller forces a refresh.

pub mod digest;
pub mod sampler;
pub mod throttle;

pub use digest::{DigestLimits, Frame, PerceptionDigest, compute_digest};
pub use sampler::{FrameSampler, FrameSource, SampleOutcome, VisionSummarizer};
pub use throttle::{PerceptionThrottle, VisionDecision};
