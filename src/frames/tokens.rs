use crate::errors::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_traits::FromPrimitive;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// On-wire length of the `{id:u16, type:u8}` prefix framing every token
/// record in a stream.
pub const TOKEN_PREFIX_LENGTH: u32 = 3;

/// The primitive wire types of the RNTBD token stream. Tag values are a
/// wire contract.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum RntbdTokenType {
    Byte = 0x00,
    UShort = 0x01,
    ULong = 0x02,
    Long = 0x03,
    ULongLong = 0x04,
    LongLong = 0x05,
    Guid = 0x06,
    SmallString = 0x07,
    String = 0x08,
    ULongString = 0x09,
    SmallBytes = 0x0A,
    Bytes = 0x0B,
    ULongBytes = 0x0C,
    Float = 0x0D,
    Double = 0x0E,
    Invalid = 0xFF,
}

/// A decoded token value. The owning token's [`RntbdTokenType`] decides
/// which variants are acceptable and how the value goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Byte(u8),
    UShort(u16),
    ULong(u32),
    Long(i32),
    ULongLong(u64),
    LongLong(i64),
    Guid(Uuid),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Bytes),
}

impl TokenValue {
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            TokenValue::Byte(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            TokenValue::ULong(v) => Some(*v),
            TokenValue::UShort(v) => Some(u32::from(*v)),
            TokenValue::Byte(v) => Some(u32::from(*v)),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TokenValue::ULongLong(v) => Some(*v),
            _ => self.as_u32().map(u64::from),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TokenValue::LongLong(v) => Some(*v),
            TokenValue::Long(v) => Some(i64::from(*v)),
            _ => self.as_u32().map(i64::from),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TokenValue::Double(v) => Some(*v),
            TokenValue::Float(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TokenValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            TokenValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            TokenValue::Byte(_) => "Byte",
            TokenValue::UShort(_) => "UShort",
            TokenValue::ULong(_) => "ULong",
            TokenValue::Long(_) => "Long",
            TokenValue::ULongLong(_) => "ULongLong",
            TokenValue::LongLong(_) => "LongLong",
            TokenValue::Guid(_) => "Guid",
            TokenValue::Float(_) => "Float",
            TokenValue::Double(_) => "Double",
            TokenValue::String(_) => "String",
            TokenValue::Bytes(_) => "Bytes",
        }
    }
}

impl Display for TokenValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenValue::Byte(v) => write!(f, "{}", v),
            TokenValue::UShort(v) => write!(f, "{}", v),
            TokenValue::ULong(v) => write!(f, "{}", v),
            TokenValue::Long(v) => write!(f, "{}", v),
            TokenValue::ULongLong(v) => write!(f, "{}", v),
            TokenValue::LongLong(v) => write!(f, "{}", v),
            TokenValue::Guid(v) => write!(f, "{}", v),
            TokenValue::Float(v) => write!(f, "{}", v),
            TokenValue::Double(v) => write!(f, "{}", v),
            TokenValue::String(v) => f.write_str(v),
            TokenValue::Bytes(v) => {
                for byte in v.iter() {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

fn need(src: &Bytes, needed: usize) -> Result<(), CodecError> {
    if src.remaining() < needed {
        return Err(CodecError::Truncated {
            needed: needed - src.remaining(),
        });
    }
    Ok(())
}

impl RntbdTokenType {
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Tag lookup; tags outside the registry map to `Invalid`.
    pub fn from_id(id: u8) -> RntbdTokenType {
        FromPrimitive::from_u8(id).unwrap_or(RntbdTokenType::Invalid)
    }

    /// Consumes this type's body from `src` and returns it as a slice
    /// sharing the source allocation. Variable-length bodies keep their
    /// own length prefix in the slice so re-encoding is a plain copy.
    pub fn read_slice(self, src: &mut Bytes) -> Result<Bytes, CodecError> {
        let length = match self {
            RntbdTokenType::Byte => 1,
            RntbdTokenType::UShort => 2,
            RntbdTokenType::ULong | RntbdTokenType::Long | RntbdTokenType::Float => 4,
            RntbdTokenType::ULongLong | RntbdTokenType::LongLong | RntbdTokenType::Double => 8,
            RntbdTokenType::Guid => 16,
            RntbdTokenType::SmallString | RntbdTokenType::SmallBytes => {
                need(src, 1)?;
                1 + src[0] as usize
            }
            RntbdTokenType::String | RntbdTokenType::Bytes => {
                need(src, 2)?;
                2 + u16::from_le_bytes([src[0], src[1]]) as usize
            }
            RntbdTokenType::ULongString | RntbdTokenType::ULongBytes => {
                need(src, 4)?;
                4 + u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize
            }
            RntbdTokenType::Invalid => return Err(CodecError::UnknownTokenType(self.id())),
        };
        need(src, length)?;
        Ok(src.split_to(length))
    }

    /// Deferred parse of a slice previously taken by [`read_slice`].
    ///
    /// [`read_slice`]: RntbdTokenType::read_slice
    pub fn decode(self, mut src: Bytes) -> Result<TokenValue, CodecError> {
        match self {
            RntbdTokenType::Byte => Ok(TokenValue::Byte(src.get_u8())),
            RntbdTokenType::UShort => Ok(TokenValue::UShort(src.get_u16_le())),
            RntbdTokenType::ULong => Ok(TokenValue::ULong(src.get_u32_le())),
            RntbdTokenType::Long => Ok(TokenValue::Long(src.get_i32_le())),
            RntbdTokenType::ULongLong => Ok(TokenValue::ULongLong(src.get_u64_le())),
            RntbdTokenType::LongLong => Ok(TokenValue::LongLong(src.get_i64_le())),
            RntbdTokenType::Float => Ok(TokenValue::Float(src.get_f32_le())),
            RntbdTokenType::Double => Ok(TokenValue::Double(src.get_f64_le())),
            RntbdTokenType::Guid => {
                let mut raw = [0u8; 16];
                src.copy_to_slice(&mut raw);
                Ok(TokenValue::Guid(Uuid::from_bytes_le(raw)))
            }
            RntbdTokenType::SmallString | RntbdTokenType::SmallBytes => {
                src.advance(1);
                self.decode_sequence(src)
            }
            RntbdTokenType::String | RntbdTokenType::Bytes => {
                src.advance(2);
                self.decode_sequence(src)
            }
            RntbdTokenType::ULongString | RntbdTokenType::ULongBytes => {
                src.advance(4);
                self.decode_sequence(src)
            }
            RntbdTokenType::Invalid => Err(CodecError::UnknownTokenType(self.id())),
        }
    }

    fn decode_sequence(self, src: Bytes) -> Result<TokenValue, CodecError> {
        match self {
            RntbdTokenType::SmallString | RntbdTokenType::String | RntbdTokenType::ULongString => {
                Ok(TokenValue::String(String::from_utf8(src.to_vec())?))
            }
            _ => Ok(TokenValue::Bytes(src)),
        }
    }

    /// Writes the body (length prefix included, where the type has one).
    pub fn encode(self, value: &TokenValue, dst: &mut BytesMut) -> Result<(), CodecError> {
        match (self, value) {
            (RntbdTokenType::Byte, TokenValue::Byte(v)) => dst.put_u8(*v),
            (RntbdTokenType::UShort, TokenValue::UShort(v)) => dst.put_u16_le(*v),
            (RntbdTokenType::ULong, TokenValue::ULong(v)) => dst.put_u32_le(*v),
            (RntbdTokenType::Long, TokenValue::Long(v)) => dst.put_i32_le(*v),
            (RntbdTokenType::ULongLong, TokenValue::ULongLong(v)) => dst.put_u64_le(*v),
            (RntbdTokenType::LongLong, TokenValue::LongLong(v)) => dst.put_i64_le(*v),
            (RntbdTokenType::Float, TokenValue::Float(v)) => dst.put_f32_le(*v),
            (RntbdTokenType::Double, TokenValue::Double(v)) => dst.put_f64_le(*v),
            (RntbdTokenType::Guid, TokenValue::Guid(v)) => dst.put_slice(&v.to_bytes_le()),
            (RntbdTokenType::SmallString, TokenValue::String(v)) => {
                dst.put_u8(v.len() as u8);
                dst.put_slice(v.as_bytes());
            }
            (RntbdTokenType::String, TokenValue::String(v)) => {
                dst.put_u16_le(v.len() as u16);
                dst.put_slice(v.as_bytes());
            }
            (RntbdTokenType::ULongString, TokenValue::String(v)) => {
                dst.put_u32_le(v.len() as u32);
                dst.put_slice(v.as_bytes());
            }
            (RntbdTokenType::SmallBytes, TokenValue::Bytes(v)) => {
                dst.put_u8(v.len() as u8);
                dst.put_slice(v);
            }
            (RntbdTokenType::Bytes, TokenValue::Bytes(v)) => {
                dst.put_u16_le(v.len() as u16);
                dst.put_slice(v);
            }
            (RntbdTokenType::ULongBytes, TokenValue::Bytes(v)) => {
                dst.put_u32_le(v.len() as u32);
                dst.put_slice(v);
            }
            (token_type, value) => {
                return Err(CodecError::Error(format!(
                    "{:?} token cannot encode a {} value",
                    token_type,
                    value.variant_name()
                )));
            }
        }
        Ok(())
    }

    /// Exact on-wire byte count of the body (its own length prefix
    /// included, the 3-byte record prefix excluded).
    pub fn compute_length(self, value: &TokenValue) -> u32 {
        match (self, value) {
            (RntbdTokenType::Byte, _) => 1,
            (RntbdTokenType::UShort, _) => 2,
            (RntbdTokenType::ULong | RntbdTokenType::Long | RntbdTokenType::Float, _) => 4,
            (RntbdTokenType::ULongLong | RntbdTokenType::LongLong | RntbdTokenType::Double, _) => 8,
            (RntbdTokenType::Guid, _) => 16,
            (RntbdTokenType::SmallString, TokenValue::String(v)) => 1 + v.len() as u32,
            (RntbdTokenType::String, TokenValue::String(v)) => 2 + v.len() as u32,
            (RntbdTokenType::ULongString, TokenValue::String(v)) => 4 + v.len() as u32,
            (RntbdTokenType::SmallBytes, TokenValue::Bytes(v)) => 1 + v.len() as u32,
            (RntbdTokenType::Bytes, TokenValue::Bytes(v)) => 2 + v.len() as u32,
            (RntbdTokenType::ULongBytes, TokenValue::Bytes(v)) => 4 + v.len() as u32,
            _ => 0,
        }
    }

    /// Whether this type accepts `value` as its canonical input.
    pub fn is_valid(self, value: &TokenValue) -> bool {
        match (self, value) {
            (RntbdTokenType::Byte, TokenValue::Byte(_)) => true,
            (RntbdTokenType::UShort, TokenValue::UShort(_)) => true,
            (RntbdTokenType::ULong, TokenValue::ULong(_)) => true,
            (RntbdTokenType::Long, TokenValue::Long(_)) => true,
            (RntbdTokenType::ULongLong, TokenValue::ULongLong(_)) => true,
            (RntbdTokenType::LongLong, TokenValue::LongLong(_)) => true,
            (RntbdTokenType::Guid, TokenValue::Guid(_)) => true,
            (RntbdTokenType::Float, TokenValue::Float(_)) => true,
            (RntbdTokenType::Double, TokenValue::Double(_)) => true,
            (RntbdTokenType::SmallString, TokenValue::String(v)) => v.len() <= u8::MAX as usize,
            (RntbdTokenType::String, TokenValue::String(v)) => v.len() <= u16::MAX as usize,
            (RntbdTokenType::ULongString, TokenValue::String(v)) => v.len() <= u32::MAX as usize,
            (RntbdTokenType::SmallBytes, TokenValue::Bytes(v)) => v.len() <= u8::MAX as usize,
            (RntbdTokenType::Bytes, TokenValue::Bytes(v)) => v.len() <= u16::MAX as usize,
            (RntbdTokenType::ULongBytes, TokenValue::Bytes(v)) => v.len() <= u32::MAX as usize,
            _ => false,
        }
    }

    /// Value reported by a token that is not present on the stream.
    pub fn default_value(self) -> TokenValue {
        match self {
            RntbdTokenType::Byte => TokenValue::Byte(0),
            RntbdTokenType::UShort => TokenValue::UShort(0),
            RntbdTokenType::ULong => TokenValue::ULong(0),
            RntbdTokenType::Long => TokenValue::Long(0),
            RntbdTokenType::ULongLong => TokenValue::ULongLong(0),
            RntbdTokenType::LongLong => TokenValue::LongLong(0),
            RntbdTokenType::Guid => TokenValue::Guid(Uuid::nil()),
            RntbdTokenType::Float => TokenValue::Float(0.0),
            RntbdTokenType::Double => TokenValue::Double(0.0),
            RntbdTokenType::SmallString | RntbdTokenType::String | RntbdTokenType::ULongString => {
                TokenValue::String(String::new())
            }
            RntbdTokenType::SmallBytes
            | RntbdTokenType::Bytes
            | RntbdTokenType::ULongBytes
            | RntbdTokenType::Invalid => TokenValue::Bytes(Bytes::new()),
        }
    }
}

/// The value slot of a token: absent, an unparsed wire slice, or a
/// decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenSlot {
    Absent,
    Raw(Bytes),
    Value(TokenValue),
}

/// A mutable cell bound to one header of a token stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RntbdToken {
    id: u16,
    name: &'static str,
    token_type: RntbdTokenType,
    required: bool,
    value: TokenSlot,
    cached_length: Option<u32>,
}

impl RntbdToken {
    pub(crate) fn new(
        id: u16,
        name: &'static str,
        token_type: RntbdTokenType,
        required: bool,
    ) -> RntbdToken {
        RntbdToken {
            id,
            name,
            token_type,
            required,
            value: TokenSlot::Absent,
            cached_length: None,
        }
    }

    /// Placeholder for wire ids outside the catalog; never required, so
    /// decoding stays forward compatible.
    pub(crate) fn undefined(id: u16, token_type: RntbdTokenType) -> RntbdToken {
        RntbdToken::new(id, "Undefined", token_type, false)
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn token_type(&self) -> RntbdTokenType {
        self.token_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_present(&self) -> bool {
        !matches!(self.value, TokenSlot::Absent)
    }

    pub fn slot(&self) -> &TokenSlot {
        &self.value
    }

    pub fn set(&mut self, value: TokenValue) -> Result<(), CodecError> {
        if !self.token_type.is_valid(&value) {
            return Err(CodecError::InvalidTokenValue {
                id: self.id,
                name: self.name,
                token_type: self.token_type,
                value: value.variant_name(),
            });
        }
        self.value = TokenSlot::Value(value);
        self.cached_length = None;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.value = TokenSlot::Absent;
        self.cached_length = None;
    }

    /// The token's value, decoding a raw wire slice on first access.
    /// Absent tokens report the type's default value.
    pub fn value(&mut self) -> Result<TokenValue, CodecError> {
        match &self.value {
            TokenSlot::Absent => Ok(self.token_type.default_value()),
            TokenSlot::Value(value) => Ok(value.clone()),
            TokenSlot::Raw(raw) => {
                let value = self.token_type.decode(raw.clone())?;
                self.value = TokenSlot::Value(value.clone());
                Ok(value)
            }
        }
    }

    /// Takes this token's body off the wire without parsing it. The raw
    /// slice shares the frame's allocation.
    pub(crate) fn decode_slice(&mut self, src: &mut Bytes) -> Result<(), CodecError> {
        let raw = self.token_type.read_slice(src)?;
        self.value = TokenSlot::Raw(raw);
        self.cached_length = None;
        Ok(())
    }

    /// Full on-wire record length: 0 when absent, otherwise the 3-byte
    /// record prefix plus the body.
    pub fn compute_length(&mut self) -> u32 {
        match &self.value {
            TokenSlot::Absent => 0,
            TokenSlot::Raw(raw) => TOKEN_PREFIX_LENGTH + raw.len() as u32,
            TokenSlot::Value(value) => {
                if self.cached_length.is_none() {
                    self.cached_length =
                        Some(TOKEN_PREFIX_LENGTH + self.token_type.compute_length(value));
                }
                self.cached_length.unwrap_or(0)
            }
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        match &self.value {
            TokenSlot::Absent => {
                if self.required {
                    return Err(CodecError::MissingRequiredToken {
                        id: self.id,
                        token_type: self.token_type,
                    });
                }
                Ok(())
            }
            TokenSlot::Raw(raw) => {
                dst.put_u16_le(self.id);
                dst.put_u8(self.token_type.id());
                dst.put_slice(raw);
                Ok(())
            }
            TokenSlot::Value(value) => {
                dst.put_u16_le(self.id);
                dst.put_u8(self.token_type.id());
                self.token_type.encode(value, dst)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(RntbdTokenType::Byte, TokenValue::Byte(0x7F); "byte")]
    #[test_case(RntbdTokenType::UShort, TokenValue::UShort(0xBEEF); "ushort")]
    #[test_case(RntbdTokenType::ULong, TokenValue::ULong(0x1234_5678); "ulong")]
    #[test_case(RntbdTokenType::Long, TokenValue::Long(-42); "long")]
    #[test_case(RntbdTokenType::ULongLong, TokenValue::ULongLong(u64::MAX); "ulonglong")]
    #[test_case(RntbdTokenType::LongLong, TokenValue::LongLong(i64::MIN); "longlong")]
    #[test_case(RntbdTokenType::Float, TokenValue::Float(1.5); "float")]
    #[test_case(RntbdTokenType::Double, TokenValue::Double(-2.25); "double")]
    #[test_case(RntbdTokenType::SmallString, TokenValue::String("dbs/d/colls/c".into()); "small string")]
    #[test_case(RntbdTokenType::String, TokenValue::String("session:token".into()); "string")]
    #[test_case(RntbdTokenType::ULongString, TokenValue::String("q".into()); "ulong string")]
    #[test_case(RntbdTokenType::SmallBytes, TokenValue::Bytes(Bytes::from_static(&[1, 2, 3])); "small bytes")]
    #[test_case(RntbdTokenType::Bytes, TokenValue::Bytes(Bytes::from_static(&[0xAB; 300])); "bytes")]
    #[test_case(RntbdTokenType::ULongBytes, TokenValue::Bytes(Bytes::from_static(&[9])); "ulong bytes")]
    fn body_round_trip(token_type: RntbdTokenType, value: TokenValue) {
        let mut dst = BytesMut::new();
        token_type.encode(&value, &mut dst).unwrap();
        assert_eq!(token_type.compute_length(&value), dst.len() as u32);

        let mut wire = dst.freeze();
        let slice = token_type.read_slice(&mut wire).unwrap();
        assert!(wire.is_empty());
        assert_eq!(value, token_type.decode(slice).unwrap());
    }

    #[test]
    fn guid_body_uses_mixed_endian_layout() {
        let guid = Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let mut dst = BytesMut::new();
        RntbdTokenType::Guid
            .encode(&TokenValue::Guid(guid), &mut dst)
            .unwrap();
        assert_eq!(
            &[
                0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xAA, 0xBB, 0xCC,
                0xDD, 0xEE, 0xFF
            ][..],
            dst.as_ref()
        );
        let decoded = RntbdTokenType::Guid.decode(dst.freeze()).unwrap();
        assert_eq!(TokenValue::Guid(guid), decoded);
    }

    #[test]
    fn set_then_get_is_idempotent() {
        let mut token = RntbdToken::new(0x0005, "PageSize", RntbdTokenType::ULong, false);
        token.set(TokenValue::ULong(100)).unwrap();
        assert_eq!(TokenValue::ULong(100), token.value().unwrap());
        assert_eq!(TokenValue::ULong(100), token.value().unwrap());
    }

    #[test]
    fn set_rejects_wrong_variant() {
        let mut token = RntbdToken::new(0x0005, "PageSize", RntbdTokenType::ULong, false);
        let result = token.set(TokenValue::String("100".into()));
        assert!(matches!(
            result,
            Err(CodecError::InvalidTokenValue { id: 0x0005, .. })
        ));
        assert!(!token.is_present());
    }

    #[test]
    fn set_rejects_oversized_small_string() {
        let mut token = RntbdToken::new(0x0004, "Date", RntbdTokenType::SmallString, false);
        let result = token.set(TokenValue::String("x".repeat(256)));
        assert!(result.is_err());
    }

    #[test]
    fn absent_token_reports_default_value() {
        let mut token = RntbdToken::new(0x0006, "SessionToken", RntbdTokenType::String, false);
        assert!(!token.is_present());
        assert_eq!(TokenValue::String(String::new()), token.value().unwrap());
        assert_eq!(0, token.compute_length());
    }

    #[test]
    fn lazy_decode_parses_on_first_value_access() {
        let mut token = RntbdToken::new(0x0014, "LSN", RntbdTokenType::LongLong, false);
        let mut wire = Bytes::from_static(&[0x2A, 0, 0, 0, 0, 0, 0, 0]);
        token.decode_slice(&mut wire).unwrap();
        assert!(token.is_present());
        assert!(matches!(token.slot(), TokenSlot::Raw(_)));
        assert_eq!(TokenValue::LongLong(42), token.value().unwrap());
        assert!(matches!(token.slot(), TokenSlot::Value(_)));
    }

    #[test]
    fn set_invalidates_cached_length() {
        let mut token = RntbdToken::new(0x0009, "Match", RntbdTokenType::String, false);
        token.set(TokenValue::String("abc".into())).unwrap();
        assert_eq!(TOKEN_PREFIX_LENGTH + 2 + 3, token.compute_length());
        token.set(TokenValue::String("abcdef".into())).unwrap();
        assert_eq!(TOKEN_PREFIX_LENGTH + 2 + 6, token.compute_length());
    }

    #[test]
    fn encode_of_required_absent_token_fails() {
        let token = RntbdToken::new(0x0014, "ReplicaPath", RntbdTokenType::String, true);
        let mut dst = BytesMut::new();
        assert_eq!(
            Err(CodecError::MissingRequiredToken {
                id: 0x0014,
                token_type: RntbdTokenType::String
            }),
            token.encode(&mut dst)
        );
    }

    #[test]
    fn read_slice_on_truncated_body_fails() {
        let mut wire = Bytes::from_static(&[0x05, b'a', b'b']);
        let result = RntbdTokenType::SmallString.read_slice(&mut wire);
        assert!(matches!(result, Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn unknown_tag_maps_to_invalid() {
        assert_eq!(RntbdTokenType::Invalid, RntbdTokenType::from_id(0x77));
        assert_eq!(RntbdTokenType::Double, RntbdTokenType::from_id(0x0E));
    }
}
