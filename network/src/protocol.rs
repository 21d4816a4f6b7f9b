use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use voice_core::{AudioModifierUpdate, PannerOverride, PlayerId, TransformUpdate};

/// Packet names used on the signaling socket
pub mod names {
    pub const KEEP_ALIVE: &str = "keepAlive";
    pub const LOCAL_PLAYER_INFO: &str = "localPlayerInfo";
    pub const UPDATE_TRANSFORM: &str = "updateTransform";
    pub const SET_PANNER_OPTIONS: &str = "setPannerOptions";
    pub const SET_AUDIO_MODIFIER: &str = "setAudioModifier";
    pub const SET_AUDIO_PARAMS: &str = "setAudioParams";
    pub const REQUEST_OFFER: &str = "requestOffer";
    pub const HAND_OFFER: &str = "handOffer";
    pub const HAND_ANSWER: &str = "handAnswer";
    pub const HAND_ICE: &str = "handIce";
    pub const DISCONNECT_RTC: &str = "disconnectRTC";
    pub const RETURN_OFFER: &str = "returnOffer";
    pub const RETURN_ANSWER: &str = "returnAnswer";
    pub const RETURN_ICE: &str = "returnIce";
    pub const SET_PLAYER_ENTRIES: &str = "setPlayerEntries";
    pub const REMOVE_PLAYER_ENTRIES: &str = "removePlayerEntries";
}

/// Liveness ping sent by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepAlive {
    /// Unix time in milliseconds
    pub timestamp: u64,
}

/// Identifier the server assigned to this client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPlayerInfo {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
}

/// Packets that only name a player (`requestOffer`, `disconnectRTC`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTarget {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
}

/// Partial transform for one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTransform {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    /// Axes that changed; the rest stay as they are
    #[serde(flatten)]
    pub transform: TransformUpdate,
}

/// Partial audio modifier for one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAudioModifier {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    /// Older servers name this field `audioModifier`
    #[serde(alias = "audioModifier", default)]
    pub modifier: AudioModifierUpdate,
}

/// Combined audio parameters for one player. Every field is optional;
/// unset fields keep their previous value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAudioParams {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    /// Route through the panner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatialize: Option<bool>,
    /// Disable the player's inbound audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
    /// `true` applies `panner_options` as an override, `false` clears it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_panner: Option<bool>,
    /// Override values used when `override_panner` is `true`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panner_options: Option<PannerOverride>,
}

/// A negotiation payload relayed to or from another player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relay<T> {
    /// The remote end of the negotiation
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    /// Session description or ICE candidate
    pub payload: T,
}

impl<T> Relay<T> {
    pub fn new(player_id: PlayerId, payload: T) -> Self {
        Self { player_id, payload }
    }
}

/// Display metadata for a player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    /// The player's username
    #[serde(default)]
    pub name: String,
    /// URL of a small square avatar image
    #[serde(default)]
    pub avatar: String,
}

/// Payload of `setPlayerEntries`
pub type PlayerEntries = BTreeMap<PlayerId, PlayerEntry>;

/// Payload of `removePlayerEntries`
pub type PlayerIds = Vec<PlayerId>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtc::{IceCandidate, SessionDescription};
    use voice_core::Vec3;

    #[test]
    fn update_transform_accepts_both_vector_forms() {
        let packet: UpdateTransform = serde_json::from_str(
            r#"{"playerID": "p1", "pos": [1, 2, 3], "forward": {"x": 0, "y": 0, "z": 1}}"#,
        )
        .unwrap();
        assert_eq!(packet.player_id, PlayerId::from("p1"));
        assert_eq!(packet.transform.position, Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(packet.transform.forward, Some(Vec3::new(0.0, 0.0, 1.0)));
        assert_eq!(packet.transform.up, None);
    }

    #[test]
    fn audio_modifier_alias() {
        let a: SetAudioModifier =
            serde_json::from_str(r#"{"playerID": "p3", "modifier": {"muted": true}}"#).unwrap();
        let b: SetAudioModifier =
            serde_json::from_str(r#"{"playerID": "p3", "audioModifier": {"muted": true}}"#)
                .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.modifier.muted, Some(true));
        assert_eq!(a.modifier.spatialized, None);
    }

    #[test]
    fn audio_params_fields() {
        let params: SetAudioParams = serde_json::from_str(
            r#"{"playerID": "p1", "spatialize": false, "overridePanner": true,
                "pannerOptions": {"maxDistance": 5}}"#,
        )
        .unwrap();
        assert_eq!(params.spatialize, Some(false));
        assert_eq!(params.mute, None);
        assert_eq!(params.override_panner, Some(true));
        assert_eq!(params.panner_options.unwrap().max_distance, Some(5.0));
    }

    #[test]
    fn relay_wire_layout() {
        let offer = Relay::new(PlayerId::from("p2"), SessionDescription::offer("v=0"));
        let value = serde_json::to_value(&offer).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"playerID": "p2", "payload": {"type": "offer", "sdp": "v=0"}})
        );

        let ice: Relay<IceCandidate> = serde_json::from_str(
            r#"{"playerID": "p2", "payload": {"candidate": "candidate:1", "sdpMid": "0", "sdpMLineIndex": 0}}"#,
        )
        .unwrap();
        assert_eq!(ice.payload.sdp_mid.as_deref(), Some("0"));
        assert_eq!(ice.payload.sdp_mline_index, Some(0));
        assert_eq!(ice.payload.username_fragment, None);
    }

    #[test]
    fn player_entries_map() {
        let entries: PlayerEntries = serde_json::from_str(
            r#"{"p1": {"name": "Alice", "avatar": "https://a/1.png"}, "p2": {"name": "Bob"}}"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[&PlayerId::from("p2")].avatar, "");

        let removed: PlayerIds = serde_json::from_str(r#"["p1"]"#).unwrap();
        assert_eq!(removed, vec![PlayerId::from("p1")]);
    }
}
