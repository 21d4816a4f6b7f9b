//! Packets the server sends, and the dispatcher that decodes them

use network::protocol::{
    names, LocalPlayerInfo, PlayerEntries, PlayerIds, PlayerTarget, Relay, SetAudioModifier,
    SetAudioParams, UpdateTransform,
};
use network::{IceCandidate, PacketDispatcher, SessionDescription};
use serde::de::DeserializeOwned;
use voice_core::{Error, PannerOverride};

#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    LocalPlayerInfo(LocalPlayerInfo),
    UpdateTransform(UpdateTransform),
    /// Partial session-wide panner defaults
    SetPannerOptions(PannerOverride),
    SetAudioModifier(SetAudioModifier),
    SetAudioParams(SetAudioParams),
    RequestOffer(PlayerTarget),
    HandOffer(Relay<SessionDescription>),
    HandAnswer(Relay<SessionDescription>),
    HandIce(Relay<IceCandidate>),
    DisconnectRtc(PlayerTarget),
    SetPlayerEntries(PlayerEntries),
    RemovePlayerEntries(PlayerIds),
}

fn json<T: DeserializeOwned>(payload: &str) -> Result<T, Error> {
    Ok(serde_json::from_str(payload)?)
}

fn register<T, F>(dispatcher: &mut PacketDispatcher<ServerPacket>, name: &str, wrap: F)
where
    T: DeserializeOwned + 'static,
    F: Fn(T) -> ServerPacket + Send + Sync + 'static,
{
    dispatcher.register(name, move |payload| json::<T>(payload).map(&wrap));
}

/// A dispatcher with a handler for every server packet
pub fn dispatcher() -> PacketDispatcher<ServerPacket> {
    let mut dispatcher = PacketDispatcher::new();
    register(&mut dispatcher, names::LOCAL_PLAYER_INFO, ServerPacket::LocalPlayerInfo);
    register(&mut dispatcher, names::UPDATE_TRANSFORM, ServerPacket::UpdateTransform);
    register(&mut dispatcher, names::SET_PANNER_OPTIONS, ServerPacket::SetPannerOptions);
    register(&mut dispatcher, names::SET_AUDIO_MODIFIER, ServerPacket::SetAudioModifier);
    register(&mut dispatcher, names::SET_AUDIO_PARAMS, ServerPacket::SetAudioParams);
    register(&mut dispatcher, names::REQUEST_OFFER, ServerPacket::RequestOffer);
    register(&mut dispatcher, names::HAND_OFFER, ServerPacket::HandOffer);
    register(&mut dispatcher, names::HAND_ANSWER, ServerPacket::HandAnswer);
    register(&mut dispatcher, names::HAND_ICE, ServerPacket::HandIce);
    register(&mut dispatcher, names::DISCONNECT_RTC, ServerPacket::DisconnectRtc);
    register(&mut dispatcher, names::SET_PLAYER_ENTRIES, ServerPacket::SetPlayerEntries);
    register(
        &mut dispatcher,
        names::REMOVE_PLAYER_ENTRIES,
        ServerPacket::RemovePlayerEntries,
    );
    dispatcher
}
