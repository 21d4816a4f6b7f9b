//! Spatial rendering for the voice client
//!
//! Turns a listener pose, a source pose, panner options, an audio modifier
//! and a volume into per-channel gains. The graph is a pure value; the
//! network crate owns the tasks that apply it to media.

pub mod graph;
pub mod panner;

pub use graph::{AudioGraph, Branch};
pub use panner::{azimuth, cone_gain, distance_gain, equal_power_pan, spatial_gains, ChannelGains};
