//! Audio environment shared by every peer transport
//!
//! Built once at startup. It holds the optional local microphone track that
//! outbound connections send, the sink receiving rendered inbound frames and
//! the current listener pose that spatial rendering is relative to.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use spatial::ChannelGains;
use tokio::sync::{mpsc, watch};
use voice_core::{Error, PlayerId, Transform};
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// One inbound audio frame with the gains it should be played at.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub player_id: PlayerId,
    /// Encoded audio, as received
    pub payload: Bytes,
    pub gains: ChannelGains,
}

pub type RenderedFrames = mpsc::UnboundedReceiver<RenderedFrame>;

pub struct AudioEnvironment {
    microphone: Option<Arc<TrackLocalStaticSample>>,
    output: mpsc::UnboundedSender<RenderedFrame>,
    listener: watch::Sender<Transform>,
}

impl AudioEnvironment {
    pub fn new(microphone: Option<Arc<TrackLocalStaticSample>>) -> (Self, RenderedFrames) {
        let (output, frames) = mpsc::unbounded_channel();
        let (listener, _) = watch::channel(Transform::default());
        (
            Self {
                microphone,
                output,
                listener,
            },
            frames,
        )
    }

    /// Environment without a local audio source; peers negotiate receive-only
    pub fn receive_only() -> (Self, RenderedFrames) {
        Self::new(None)
    }

    /// An Opus track suitable as the local microphone
    pub fn opus_track() -> Arc<TrackLocalStaticSample> {
        Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            "audio".to_owned(),
            "spatial-voice".to_owned(),
        ))
    }

    pub fn microphone(&self) -> Option<Arc<TrackLocalStaticSample>> {
        self.microphone.clone()
    }

    /// Write one encoded microphone frame to every connected peer
    pub async fn write_microphone_frame(&self, data: Bytes, duration: Duration) -> Result<(), Error> {
        let track = self
            .microphone
            .as_ref()
            .ok_or_else(|| Error::InvalidState("No local audio source".to_string()))?;

        track
            .write_sample(&Sample {
                data,
                duration,
                ..Default::default()
            })
            .await
            .map_err(|e| Error::Network(format!("Failed to write microphone sample: {}", e)))
    }

    pub fn output(&self) -> mpsc::UnboundedSender<RenderedFrame> {
        self.output.clone()
    }

    pub fn listener(&self) -> Transform {
        *self.listener.borrow()
    }

    /// Move the listener; every media pump picks the new pose up
    pub fn set_listener(&self, transform: Transform) {
        self.listener.send_replace(transform);
    }

    pub fn watch_listener(&self) -> watch::Receiver<Transform> {
        self.listener.subscribe()
    }
}
