//! Name-keyed packet dispatch
//!
//! Handlers decode a payload into a typed value; whatever acts on that value
//! runs elsewhere (the session handler loop), so dispatch itself is
//! synchronous and never blocks on I/O.

use std::collections::HashMap;

use log::{debug, warn};
use voice_core::{Error, ErrorKind, ErrorReport};

use crate::packet::split_frame;

/// Decodes one packet payload.
pub type PacketHandler<T> = Box<dyn Fn(&str) -> Result<T, Error> + Send + Sync>;

/// Pre-dispatch filter: returning `false` drops the frame silently.
pub type PacketFilter = Box<dyn Fn(&str, &str) -> bool + Send + Sync>;

pub struct PacketDispatcher<T> {
    handlers: HashMap<String, PacketHandler<T>>,
    filter: Option<PacketFilter>,
}

impl<T> Default for PacketDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PacketDispatcher<T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            filter: None,
        }
    }

    /// Register a handler for `name`, replacing any earlier one.
    /// Returns whether a handler was replaced.
    pub fn register<F>(&mut self, name: &str, handler: F) -> bool
    where
        F: Fn(&str) -> Result<T, Error> + Send + Sync + 'static,
    {
        let replaced = self
            .handlers
            .insert(name.to_string(), Box::new(handler))
            .is_some();
        if replaced {
            debug!("Replaced handler for packet '{}'", name);
        }
        replaced
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    pub fn handles(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Install the `on_packet` filter, called with `(name, payload)`
    pub fn set_filter<F>(&mut self, filter: F)
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    /// Decode one frame.
    ///
    /// `Ok(None)` means the filter vetoed the frame. Every failure carries
    /// the offending frame.
    pub fn dispatch(&self, frame: &str) -> Result<Option<T>, ErrorReport> {
        let (name, payload) = split_frame(frame).map_err(|e| {
            warn!("Dropping malformed frame: {}", e);
            ErrorReport::from_error(&e).with_frame(frame)
        })?;

        if let Some(filter) = &self.filter {
            if !filter(name, payload) {
                debug!("Packet '{}' dropped by filter", name);
                return Ok(None);
            }
        }

        let handler = self.handlers.get(name).ok_or_else(|| {
            warn!("No handler registered for packet '{}'", name);
            ErrorReport::new(ErrorKind::UnknownPacket, format!("unknown packet '{}'", name))
                .with_frame(frame)
        })?;

        handler(payload).map(Some).map_err(|e| {
            warn!("Error handling packet '{}': {}", name, e);
            ErrorReport::from_error(&e).with_frame(frame)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_dispatcher() -> (PacketDispatcher<String>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = PacketDispatcher::new();
        let counter = Arc::clone(&calls);
        dispatcher.register("echo", move |payload| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(payload.to_string())
        });
        (dispatcher, calls)
    }

    #[test]
    fn frame_without_separator_invokes_nothing() {
        let (dispatcher, calls) = counting_dispatcher();

        let report = dispatcher.dispatch("echo").unwrap_err();
        assert_eq!(report.kind, ErrorKind::Framing);
        assert_eq!(report.frame.as_deref(), Some("echo"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_packet_is_reported() {
        let (dispatcher, calls) = counting_dispatcher();

        let report = dispatcher.dispatch("nope;{}").unwrap_err();
        assert_eq!(report.kind, ErrorKind::UnknownPacket);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn payload_keeps_later_separators() {
        let (dispatcher, calls) = counting_dispatcher();

        let decoded = dispatcher.dispatch("echo;a;b").unwrap();
        assert_eq!(decoded.as_deref(), Some("a;b"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let (mut dispatcher, calls) = counting_dispatcher();
        assert!(dispatcher.register("echo", |_| Ok("second".to_string())));

        assert_eq!(dispatcher.dispatch("echo;x").unwrap().as_deref(), Some("second"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_error_carries_frame() {
        let mut dispatcher = PacketDispatcher::<()>::new();
        dispatcher.register("bad", |payload| {
            serde_json::from_str::<serde_json::Value>(payload)?;
            Ok(())
        });

        let report = dispatcher.dispatch("bad;{").unwrap_err();
        assert_eq!(report.kind, ErrorKind::Protocol);
        assert_eq!(report.frame.as_deref(), Some("bad;{"));
    }

    #[test]
    fn filter_can_veto() {
        let (mut dispatcher, calls) = counting_dispatcher();
        dispatcher.set_filter(|name, _| name != "echo");

        assert_eq!(dispatcher.dispatch("echo;x").unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        dispatcher.clear_filter();
        assert!(dispatcher.dispatch("echo;x").unwrap().is_some());
    }
}
