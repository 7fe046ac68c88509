//! Hardware seams and stream handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use huddle_common::{MediaError, UserId};
use huddle_config::CaptureConfig;

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Processing requested from the capture hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub channel_count: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CaptureConstraints {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            echo_cancellation: config.echo_cancellation,
            noise_suppression: config.noise_suppression,
            auto_gain_control: config.auto_gain_control,
            channel_count: config.channel_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Hardware traits
// ---------------------------------------------------------------------------

/// One captured audio track.
pub trait AudioTrack: Send + Sync {
    fn id(&self) -> &str;
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// Release the underlying hardware. Idempotent.
    fn stop(&self);
}

/// Microphone access. Opening may wait on a permission prompt.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Vec<Arc<dyn AudioTrack>>, MediaError>;
}

/// Remote media as handed over by the peer connection layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
}

/// Playback of one remote peer.
pub trait AudioSink: Send {
    fn play(&mut self, stream: &RemoteStream);
    fn release(&mut self);
}

pub trait AudioOutput: Send + Sync {
    fn create_sink(&self, peer: &UserId) -> Box<dyn AudioSink>;
}

// ---------------------------------------------------------------------------
// LocalMediaStream
// ---------------------------------------------------------------------------

struct LocalStreamInner {
    id: String,
    tracks: Vec<Arc<dyn AudioTrack>>,
    active: AtomicBool,
}

/// Shared handle to the captured microphone stream.
///
/// Calls get clones for sending; only the media manager stops it.
#[derive(Clone)]
pub struct LocalMediaStream {
    inner: Arc<LocalStreamInner>,
}

impl LocalMediaStream {
    pub(crate) fn new(tracks: Vec<Arc<dyn AudioTrack>>) -> Self {
        Self {
            inner: Arc::new(LocalStreamInner {
                id: uuid::Uuid::new_v4().to_string(),
                tracks,
                active: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn tracks(&self) -> &[Arc<dyn AudioTrack>] {
        &self.inner.tracks
    }

    /// Whether outbound audio is flowing (not muted).
    pub fn is_enabled(&self) -> bool {
        self.inner.tracks.iter().any(|t| t.is_enabled())
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        for track in &self.inner.tracks {
            track.set_enabled(enabled);
        }
    }

    pub(crate) fn stop(&self) {
        if self.inner.active.swap(false, Ordering::AcqRel) {
            for track in &self.inner.tracks {
                track.stop();
            }
        }
    }
}

impl fmt::Debug for LocalMediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMediaStream")
            .field("id", &self.inner.id)
            .field("tracks", &self.inner.tracks.len())
            .field("active", &self.is_active())
            .finish()
    }
}
