//! spatial_voice: the engine behind a positional voice chat client
//!
//! The workspace crates, re-exported under one roof:
//!
//! - [`voice_core`]: identifiers, transforms, audio parameters and observables
//! - [`spatial`]: the per-participant audio graph and panning model
//! - [`network`]: signaling transport, wire protocol and RTC seam
//! - [`session`]: the participant registry and the [`Session`] facade
//! - [`settings`]: persisted client settings

pub use network;
pub use session;
pub use settings_manager as settings;
pub use spatial;
pub use voice_core;

pub use session::{Session, SessionOptions};
pub use voice_core::{ConnectionStatus, Error, PlayerId};
