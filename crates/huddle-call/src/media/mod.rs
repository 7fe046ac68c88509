//! Local capture and remote playback for calls.
//!
//! The hardware sits behind [`CaptureDevice`] and [`AudioOutput`]; the
//! [`MediaSessionManager`] owns whatever they hand out and is the only
//! place tracks are stopped or sinks released.

mod device;
mod manager;

pub use device::{
    AudioOutput, AudioSink, AudioTrack, CaptureConstraints, CaptureDevice, LocalMediaStream,
    RemoteStream,
};
pub use manager::MediaSessionManager;
