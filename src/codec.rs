use serde::{de::DeserializeOwned, Serialize};

/// Encoding/decoding seam between typed payloads and the bytes that go over
/// the wire.
///
/// Both clients take the codec as a type parameter (defaulting to
/// [`JsonCodec`]), so the representation is fixed per client instance
/// rather than negotiated per call.
pub trait Codec {
    /// The neutral byte representation payloads are converted to and from.
    type Compact;
    /// Error returned by the underlying format.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Encodes a value into the compact representation.
    fn encode<T: Serialize>(input: &T) -> Result<Self::Compact, Self::Error>;

    /// Decodes a value out of the compact representation.
    fn decode<O: DeserializeOwned>(compact: Self::Compact) -> Result<O, Self::Error>;
}

/// JSON codec over `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Compact = Vec<u8>;
    type Error = serde_json::Error;

    fn encode<T: Serialize>(input: &T) -> Result<Self::Compact, Self::Error> {
        serde_json::to_vec(input)
    }

    fn decode<O: DeserializeOwned>(compact: Self::Compact) -> Result<O, Self::Error> {
        serde_json::from_slice(&compact)
    }
}
