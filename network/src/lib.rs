//! Network communication for the spatial voice client
//!
//! This crate handles the packet-framed websocket signaling connection and
//! the real-time audio transport to each remote participant.

pub mod dispatch;
pub mod environment;
pub mod packet;
pub mod peer;
pub mod protocol;
pub mod rtc;
#[cfg(any(test, feature = "test_utils"))]
pub mod testing;
pub mod transport;
pub mod webrtc_if;

pub use dispatch::PacketDispatcher;
pub use environment::{AudioEnvironment, RenderedFrame, RenderedFrames};
pub use packet::Payload;
pub use peer::{NegotiationState, PeerTransport};
pub use rtc::{
    ChannelMediaSource, IceCandidate, MediaSource, PeerConnectionState, PeerEvent, PeerEventKind,
    PeerEventSender, PeerEventSink, RtcBackend, RtcConnection, SdpType, SessionDescription,
};
pub use transport::{connect_url, Inbound, PacketTransport};
pub use webrtc_if::WebRtcBackend;

#[cfg(test)]
mod tests {
    mod peer_tests;
    mod transport_tests;
    mod webrtc_tests;
}
