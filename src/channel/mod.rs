pub mod position;
pub mod simulated;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::ChannelError;
use crate::models::{FadeConfig, SongKey, StreamInfo};

pub use position::PositionTracker;
pub use simulated::{SimulatedChannel, SimulatedChannelFactory};

/// Identity of a channel for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle events a channel reports to its subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Audible playback actually started
    Played,
    /// The stream played through to its end
    Ended,
    Error(ChannelError),
    /// The configured fade-out offset before the end was reached
    FadeTrigger,
    /// A lay-out finished and the channel is silent
    FadeComplete,
    Released,
}

/// One platform audio-playback primitive.
///
/// Every operation returns immediately; anything that takes time (fades,
/// decoding, reaching the end) is reported through [`Channel::subscribe`].
pub trait Channel: Send + Sync + fmt::Debug {
    fn id(&self) -> ChannelId;

    /// Bind a resolved stream to this channel, applying `fade` for the binding.
    /// Playback stays paused until [`Channel::lay_in`].
    fn load(&self, key: &SongKey, stream: &StreamInfo, fade: FadeConfig) -> Result<(), ChannelError>;

    /// Start audible playback with a fade-in, from `from` or the current position
    fn lay_in(&self, from: Option<Duration>) -> Result<(), ChannelError>;

    /// Fade out; `FadeComplete` follows once the channel is silent
    fn lay_out(&self);

    fn pause(&self);

    fn seek(&self, position: Duration) -> Result<(), ChannelError>;

    /// Stop and unbind. The channel can be loaded again afterwards.
    fn release(&self);

    fn is_paused(&self) -> bool;

    fn bound_key(&self) -> Option<SongKey>;

    fn position(&self) -> Duration;

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;
}

/// Builds new channels when the pool's free list is empty
pub trait ChannelFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Channel>;
}
