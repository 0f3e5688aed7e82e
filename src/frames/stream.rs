use crate::errors::CodecError;
use crate::frames::headers::RntbdHeader;
use crate::frames::tokens::{RntbdToken, RntbdTokenType, TokenValue};
use bytes::{Buf, Bytes, BytesMut};
use log::trace;
use std::collections::HashMap;

/// The ordered collection of tokens for one message part, pre-populated
/// with an absent token for every header the catalog `H` knows.
#[derive(Debug, PartialEq)]
pub struct RntbdTokenStream<H: RntbdHeader> {
    tokens: HashMap<H, RntbdToken>,
    undefined: Vec<RntbdToken>,
}

impl<H: RntbdHeader> Default for RntbdTokenStream<H> {
    fn default() -> Self {
        let tokens = H::iter()
            .map(|header| {
                (
                    header,
                    RntbdToken::new(
                        header.id(),
                        header.name(),
                        header.token_type(),
                        header.is_required(),
                    ),
                )
            })
            .collect();
        RntbdTokenStream {
            tokens,
            undefined: Vec::new(),
        }
    }
}

impl<H: RntbdHeader> RntbdTokenStream<H> {
    pub fn get(&self, header: H) -> &RntbdToken {
        self.tokens.get(&header).expect("catalog pre-populates every header")
    }

    pub fn get_mut(&mut self, header: H) -> &mut RntbdToken {
        self.tokens.get_mut(&header).expect("catalog pre-populates every header")
    }

    pub fn set(&mut self, header: H, value: TokenValue) -> Result<(), CodecError> {
        self.get_mut(header).set(value)
    }

    pub fn is_present(&self, header: H) -> bool {
        self.get(header).is_present()
    }

    /// The header's value, lazily decoded; the type's default when the
    /// token is absent.
    pub fn value(&mut self, header: H) -> Result<TokenValue, CodecError> {
        self.get_mut(header).value()
    }

    /// Tokens decoded from wire ids outside the catalog. Readable but
    /// never re-encoded.
    pub fn undefined_tokens(&self) -> &[RntbdToken] {
        &self.undefined
    }

    pub fn count_present(&self) -> usize {
        H::iter().filter(|header| self.is_present(*header)).count() + self.undefined.len()
    }

    /// On-wire length of the encoded stream (undefined tokens excluded,
    /// since they are not re-emitted).
    pub fn compute_length(&mut self) -> u32 {
        H::iter().map(|header| self.get_mut(header).compute_length()).sum()
    }

    /// Decodes records until `src` is exhausted, then verifies that
    /// every required header is present.
    pub fn decode(src: &mut Bytes) -> Result<Self, CodecError> {
        let stream = Self::decode_tokens(src)?;
        stream.check_required()?;
        Ok(stream)
    }

    /// Decode without the required-header verification. Used for frames
    /// that reuse a catalog loosely, such as context exceptions.
    pub(crate) fn decode_tokens(src: &mut Bytes) -> Result<Self, CodecError> {
        let mut stream = Self::default();
        while src.has_remaining() {
            if src.remaining() < 3 {
                return Err(CodecError::Truncated {
                    needed: 3 - src.remaining(),
                });
            }
            let id = src.get_u16_le();
            let tag = src.get_u8();
            let token_type = RntbdTokenType::from_id(tag);
            if token_type == RntbdTokenType::Invalid {
                return Err(CodecError::UnknownTokenType(tag));
            }
            match H::from_id(id) {
                Some(header) => stream.get_mut(header).decode_slice(src)?,
                None => {
                    trace!("Retaining undefined header {:#06x} ({:?})", id, token_type);
                    let mut token = RntbdToken::undefined(id, token_type);
                    token.decode_slice(src)?;
                    stream.undefined.push(token);
                }
            }
        }
        Ok(stream)
    }

    pub(crate) fn check_required(&self) -> Result<(), CodecError> {
        for header in H::iter() {
            let token = self.get(header);
            if token.is_required() && !token.is_present() {
                return Err(CodecError::MissingRequiredToken {
                    id: token.id(),
                    token_type: token.token_type(),
                });
            }
        }
        Ok(())
    }

    /// Emits present tokens in catalog order. Required absent tokens are
    /// an encode error.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        for header in H::iter() {
            self.get(header).encode(dst)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::headers::{RntbdRequestHeader, RntbdResponseHeader};

    fn encode_stream<H: RntbdHeader>(stream: &RntbdTokenStream<H>) -> Bytes {
        let mut dst = BytesMut::new();
        stream.encode(&mut dst).unwrap();
        dst.freeze()
    }

    #[test]
    fn byte_token_wire_shape() {
        // Given
        let mut stream = RntbdTokenStream::<RntbdRequestHeader>::default();
        stream
            .set(RntbdRequestHeader::PageSize, TokenValue::ULong(10))
            .unwrap();
        stream.get_mut(RntbdRequestHeader::PageSize).clear();
        stream
            .set(RntbdRequestHeader::PayloadPresent, TokenValue::Byte(0x7F))
            .unwrap();
        stream
            .set(RntbdRequestHeader::ReplicaPath, TokenValue::String("r".into()))
            .unwrap();

        // When
        let wire = encode_stream(&stream);

        // Then: PayloadPresent (id 0x0002, type Byte) encodes as
        // `02 00 00 7F`, before ReplicaPath in catalog order, and the
        // cleared PageSize token is not emitted at all.
        assert_eq!(&[0x02, 0x00, 0x00, 0x7F][..], &wire[..4]);
        assert_eq!(4 + 3 + 2 + 1, wire.len());
    }

    #[test]
    fn round_trip_preserves_known_tokens() {
        // Given
        let mut stream = RntbdTokenStream::<RntbdRequestHeader>::default();
        stream
            .set(RntbdRequestHeader::PayloadPresent, TokenValue::Byte(1))
            .unwrap();
        stream
            .set(
                RntbdRequestHeader::ReplicaPath,
                TokenValue::String("apps/a/services/s/partitions/p/replicas/1/".into()),
            )
            .unwrap();
        stream
            .set(RntbdRequestHeader::PageSize, TokenValue::ULong(100))
            .unwrap();

        // When
        let wire = encode_stream(&stream);
        let mut src = wire.clone();
        let mut decoded = RntbdTokenStream::<RntbdRequestHeader>::decode(&mut src).unwrap();

        // Then
        assert_eq!(
            TokenValue::Byte(1),
            decoded.value(RntbdRequestHeader::PayloadPresent).unwrap()
        );
        assert_eq!(
            TokenValue::ULong(100),
            decoded.value(RntbdRequestHeader::PageSize).unwrap()
        );
        assert_eq!(wire, encode_stream(&decoded));
    }

    #[test]
    fn missing_required_header_is_fatal() {
        let mut stream = RntbdTokenStream::<RntbdRequestHeader>::default();
        stream
            .set(RntbdRequestHeader::PayloadPresent, TokenValue::Byte(0))
            .unwrap();
        let wire = {
            let mut dst = BytesMut::new();
            stream.get(RntbdRequestHeader::PayloadPresent).encode(&mut dst).unwrap();
            dst.freeze()
        };

        let mut src = wire;
        let result = RntbdTokenStream::<RntbdRequestHeader>::decode(&mut src);
        assert_eq!(
            Err(CodecError::MissingRequiredToken {
                id: 0x0014,
                token_type: RntbdTokenType::String
            }),
            result
        );
    }

    #[test]
    fn unknown_header_is_retained_and_required_check_passes() {
        // Given: an unknown id 0xFFFE carrying a Long (4 byte) body,
        // followed by the required response header.
        let mut wire = BytesMut::new();
        wire.extend_from_slice(&[0xFE, 0xFF, 0x03, 0x78, 0x56, 0x34, 0x12]);
        wire.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // PayloadPresent = 0

        // When
        let mut src = wire.freeze();
        let mut decoded = RntbdTokenStream::<RntbdResponseHeader>::decode(&mut src).unwrap();

        // Then
        assert_eq!(1, decoded.undefined_tokens().len());
        let undefined = &decoded.undefined_tokens()[0];
        assert_eq!(0xFFFE, undefined.id());
        assert_eq!("Undefined", undefined.name());
        assert_eq!(RntbdTokenType::Long, undefined.token_type());
        assert!(undefined.is_present());

        // Undefined tokens do not survive re-encoding.
        let re_encoded = encode_stream(&decoded);
        assert_eq!(&[0x00, 0x00, 0x00, 0x00][..], re_encoded.as_ref());
        assert_eq!(
            TokenValue::Byte(0),
            decoded.value(RntbdResponseHeader::PayloadPresent).unwrap()
        );
    }

    #[test]
    fn unknown_token_type_tag_is_fatal() {
        let mut src = Bytes::from_static(&[0x02, 0x00, 0x77, 0x01]);
        let result = RntbdTokenStream::<RntbdRequestHeader>::decode(&mut src);
        assert_eq!(Err(CodecError::UnknownTokenType(0x77)), result);
    }

    #[test]
    fn truncated_record_prefix_is_fatal() {
        let mut src = Bytes::from_static(&[0x02, 0x00]);
        let result = RntbdTokenStream::<RntbdRequestHeader>::decode(&mut src);
        assert_eq!(Err(CodecError::Truncated { needed: 1 }), result);
    }

    #[test]
    fn compute_length_matches_encoded_length() {
        let mut stream = RntbdTokenStream::<RntbdRequestHeader>::default();
        stream
            .set(RntbdRequestHeader::PayloadPresent, TokenValue::Byte(1))
            .unwrap();
        stream
            .set(RntbdRequestHeader::ReplicaPath, TokenValue::String("replica".into()))
            .unwrap();
        stream
            .set(
                RntbdRequestHeader::ResourceId,
                TokenValue::Bytes(Bytes::from_static(&[1, 2, 3, 4])),
            )
            .unwrap();

        let wire = encode_stream(&stream);
        assert_eq!(stream.compute_length() as usize, wire.len());
        assert_eq!(3, stream.count_present());
    }
}
