use crate::Error;
use log::debug;

/// Emitted once when the signaling connection goes away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectInfo {
    /// Human-readable reason (close reason or error description)
    pub message: String,
    /// Whether the connection terminated abnormally
    pub errored: bool,
}

impl DisconnectInfo {
    pub fn clean(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errored: false,
        }
    }

    pub fn errored(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errored: true,
        }
    }
}

/// Category of a locally recovered error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Frame without a `;` separator, or a non-text frame
    Framing,
    /// No handler registered for the packet name
    UnknownPacket,
    /// Packet referencing an unknown participant, or violating the protocol state
    Protocol,
    /// Failure while handling an offer, answer or candidate
    Negotiation,
    /// Abnormal signaling connection failure
    Transport,
}

/// A recovered error, as reported through the session's error callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    /// The frame that triggered the error, when there was one
    pub frame: Option<String>,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            frame: None,
        }
    }

    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self
    }

    /// Classify an error raised while handling a packet
    pub fn from_error(error: &Error) -> Self {
        let kind = match error {
            Error::Framing(_) => ErrorKind::Framing,
            Error::Protocol(_)
            | Error::NotFound(_)
            | Error::InvalidState(_)
            | Error::Serialization(_) => ErrorKind::Protocol,
            Error::Network(_) | Error::Io(_) => ErrorKind::Transport,
            _ => ErrorKind::Negotiation,
        };
        debug!("Classified '{}' as {:?}", error, kind);
        Self::new(kind, error.to_string())
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.frame {
            Some(frame) => write!(f, "{:?}: {} (frame: {})", self.kind, self.message, frame),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn classify_errors() {
        let report = ErrorReport::from_error(&Error::Protocol("unknown player".into()));
        assert_eq!(report.kind, ErrorKind::Protocol);

        let report = ErrorReport::from_error(&Error::Negotiation("bad sdp".into()));
        assert_eq!(report.kind, ErrorKind::Negotiation);

        let report = ErrorReport::from_error(&Error::Serialization("eof".into()))
            .with_frame("handOffer;{");
        assert_eq!(report.kind, ErrorKind::Protocol);
        assert!(report.to_string().contains("handOffer;{"));
    }
}
