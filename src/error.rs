use std::time::Duration;

use thiserror::Error;

/// Substring the broker puts in the reply when a request reaches a subject
/// nobody serves. JetStream API calls against a broker started without the
/// feature fail exactly this way ("no responders available for request"),
/// which makes the signature the one reliable cross-operation probe for a
/// missing persistence layer.
const NO_RESPONDERS_SIGNATURE: &str = "no responders";

/// Errors returned by [`BasicClient`](crate::BasicClient) and
/// [`StreamClient`](crate::StreamClient) operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying connection is closed. Checked before every operation;
    /// nothing is sent to the broker once this fires.
    #[error("connection error: client is not connected")]
    Connection,

    /// The broker answered with the no-responders signature on a JetStream
    /// call, meaning JetStream is not enabled server-side.
    #[error("{location}: jetstream not enabled on broker")]
    JetStreamUnavailable {
        /// Operation that hit the missing feature.
        location: &'static str,
    },

    /// Encoding an outbound payload failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// The codec failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Decoding an inbound reply failed.
    #[error("deserialization error: {source}")]
    Deserialization {
        /// The codec failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A request got no reply within the configured timeout.
    #[error("request to {subject:?} timed out after {timeout:?}")]
    RequestTimeout {
        /// Subject the request was sent to.
        subject: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// Any other failure surfaced by the broker client, tagged with the
    /// operation that produced it.
    #[error("{location}: {source}")]
    Broker {
        /// Operation that failed.
        location: &'static str,
        /// The underlying broker error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Logs a terminal error once at error severity and hands it back.
///
/// Every error a public operation returns passes through here exactly once,
/// whether it came from a precondition, the codec, or the broker.
pub(crate) fn report(location: &'static str, err: Error) -> Error {
    tracing::error!(error = %err, "{location} failed");
    err
}

/// Normalizes a broker error and logs it once at error severity.
///
/// Broker-call failures route through here, so a broker without JetStream
/// is reported as [`Error::JetStreamUnavailable`] no matter which call
/// tripped over it first.
pub(crate) fn classify<E>(location: &'static str, err: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let classified = if err.to_string().contains(NO_RESPONDERS_SIGNATURE) {
        Error::JetStreamUnavailable { location }
    } else {
        Error::Broker {
            location,
            source: Box::new(err),
        }
    };

    report(location, classified)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_error(text: &str) -> std::io::Error {
        std::io::Error::other(text.to_string())
    }

    #[test]
    fn no_responders_classifies_as_jetstream_unavailable() {
        let err = classify("publish", text_error("no responders available for request"));
        assert!(matches!(
            err,
            Error::JetStreamUnavailable {
                location: "publish"
            }
        ));
    }

    #[test]
    fn classification_is_independent_of_operation() {
        for location in ["publish", "stream create update", "consume"] {
            let err = classify(location, text_error("no responders available for request"));
            assert!(matches!(err, Error::JetStreamUnavailable { .. }));
        }
    }

    #[test]
    fn other_errors_keep_location_tag() {
        let err = classify("consume", text_error("stream not found"));
        match err {
            Error::Broker { location, .. } => assert_eq!(location, "consume"),
            other => panic!("expected Broker, got {other:?}"),
        }
        assert_eq!(
            classify("consume", text_error("stream not found")).to_string(),
            "consume: stream not found"
        );
    }
}
