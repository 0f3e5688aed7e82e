use crate::errors::{CodecError, ErrorBody};
use crate::frames::headers::{RntbdContextHeader, RntbdContextRequestHeader, RntbdResponseHeader};
use crate::frames::stream::RntbdTokenStream;
use crate::frames::tokens::TokenValue;
use crate::frames::{encode_request_frame, RntbdOperationType, RntbdResourceType};
use bytes::{Bytes, BytesMut};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Protocol version this client negotiates.
pub const PROTOCOL_VERSION: u32 = 0x0000_0001;

/// The one-shot handshake frame written before any other traffic on a
/// fresh connection. Carries transport request id 0.
#[derive(Debug, Getters, new)]
pub struct RntbdContextRequest {
    #[get = "pub"]
    activity_id: Uuid,
    #[get = "pub"]
    client_version: String,
    #[get = "pub"]
    user_agent: String,
}

impl RntbdContextRequest {
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        let mut headers = RntbdTokenStream::<RntbdContextRequestHeader>::default();
        headers.set(
            RntbdContextRequestHeader::ProtocolVersion,
            TokenValue::ULong(PROTOCOL_VERSION),
        )?;
        headers.set(
            RntbdContextRequestHeader::ClientVersion,
            TokenValue::String(self.client_version.clone()),
        )?;
        headers.set(
            RntbdContextRequestHeader::UserAgent,
            TokenValue::String(self.user_agent.clone()),
        )?;
        encode_request_frame(
            dst,
            self.activity_id,
            RntbdResourceType::Connection,
            RntbdOperationType::Connect,
            0,
            &mut headers,
            None,
        )
    }

    pub fn encode_bytes(&self) -> Result<Bytes, CodecError> {
        let mut bytes = BytesMut::new();
        self.encode(&mut bytes)?;
        Ok(bytes.freeze())
    }
}

/// The per-connection protocol context the server grants in answer to a
/// [`RntbdContextRequest`]. Latched once; gates all other writes.
#[derive(Debug, Clone, Getters)]
pub struct RntbdContext {
    #[get = "pub"]
    activity_id: Uuid,
    #[get = "pub"]
    protocol_version: u32,
    #[get = "pub"]
    client_version: String,
    #[get = "pub"]
    server_agent: String,
    #[get = "pub"]
    server_version: String,
    #[get = "pub"]
    idle_timeout_in_seconds: u32,
    #[get = "pub"]
    unauthenticated_timeout_in_seconds: u32,
}

impl RntbdContext {
    pub(crate) fn from_frame(
        activity_id: Uuid,
        headers: &mut RntbdTokenStream<RntbdContextHeader>,
    ) -> Result<RntbdContext, CodecError> {
        let protocol_version = headers
            .value(RntbdContextHeader::ProtocolVersion)?
            .as_u32()
            .unwrap_or(0);
        let client_version = headers
            .value(RntbdContextHeader::ClientVersion)?
            .into_string()
            .unwrap_or_default();
        let server_agent = headers
            .value(RntbdContextHeader::ServerAgent)?
            .into_string()
            .unwrap_or_default();
        let server_version = headers
            .value(RntbdContextHeader::ServerVersion)?
            .into_string()
            .unwrap_or_default();
        let idle_timeout_in_seconds = headers
            .value(RntbdContextHeader::IdleTimeoutInSeconds)?
            .as_u32()
            .unwrap_or(0);
        let unauthenticated_timeout_in_seconds = headers
            .value(RntbdContextHeader::UnauthenticatedTimeoutInSeconds)?
            .as_u32()
            .unwrap_or(0);
        Ok(RntbdContext {
            activity_id,
            protocol_version,
            client_version,
            server_agent,
            server_version,
            idle_timeout_in_seconds,
            unauthenticated_timeout_in_seconds,
        })
    }
}

/// The server refused the context handshake. Fatal to the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct RntbdContextException {
    pub status: u32,
    pub sub_status: u32,
    pub activity_id: Uuid,
    pub error_body: ErrorBody,
}

impl Display for RntbdContextException {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RNTBD context exception (status {}): {}",
            self.status, self.error_body.message
        )
    }
}

impl std::error::Error for RntbdContextException {}

impl RntbdContextException {
    pub(crate) fn from_frame(
        status: u32,
        activity_id: Uuid,
        headers: &mut RntbdTokenStream<RntbdResponseHeader>,
        payload: Option<&Bytes>,
    ) -> RntbdContextException {
        let sub_status = headers
            .value(RntbdResponseHeader::SubStatus)
            .ok()
            .and_then(|value| value.as_u32())
            .unwrap_or(0);
        let error_body = match payload {
            Some(payload) => ErrorBody::from_payload(status, payload),
            None => ErrorBody::from_status(status),
        };
        RntbdContextException {
            status,
            sub_status,
            activity_id,
            error_body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Buf;

    #[test]
    fn context_request_frame_shape() {
        // Given
        let activity_id = Uuid::new_v4();
        let request = RntbdContextRequest::new(
            activity_id,
            "2.0.0".to_owned(),
            "rntbd-protocol/0.1.0".to_owned(),
        );

        // When
        let mut wire = request.encode_bytes().unwrap();

        // Then: total length excludes itself, transport request id is 0,
        // resource/operation identify the connection handshake.
        let total_length = wire.get_u32_le();
        assert_eq!(total_length as usize, wire.remaining());
        let mut guid = [0u8; 16];
        wire.copy_to_slice(&mut guid);
        assert_eq!(activity_id, Uuid::from_bytes_le(guid));
        assert_eq!(RntbdResourceType::Connection as u16, wire.get_u16_le());
        assert_eq!(RntbdOperationType::Connect as u16, wire.get_u16_le());
        assert_eq!(0, wire.get_u64_le());

        let mut headers =
            RntbdTokenStream::<RntbdContextRequestHeader>::decode(&mut wire).unwrap();
        assert_eq!(
            TokenValue::ULong(PROTOCOL_VERSION),
            headers.value(RntbdContextRequestHeader::ProtocolVersion).unwrap()
        );
        assert_eq!(
            TokenValue::String("rntbd-protocol/0.1.0".into()),
            headers.value(RntbdContextRequestHeader::UserAgent).unwrap()
        );
    }

    #[test]
    fn context_from_frame_reads_negotiated_values() {
        let mut headers = RntbdTokenStream::<RntbdContextHeader>::default();
        headers
            .set(RntbdContextHeader::ProtocolVersion, TokenValue::ULong(PROTOCOL_VERSION))
            .unwrap();
        headers
            .set(RntbdContextHeader::ClientVersion, TokenValue::String("2.0.0".into()))
            .unwrap();
        headers
            .set(RntbdContextHeader::ServerAgent, TokenValue::String("RNTBD-Server".into()))
            .unwrap();
        headers
            .set(RntbdContextHeader::ServerVersion, TokenValue::String("1.12".into()))
            .unwrap();
        headers
            .set(RntbdContextHeader::IdleTimeoutInSeconds, TokenValue::ULong(1200))
            .unwrap();

        let context = RntbdContext::from_frame(Uuid::nil(), &mut headers).unwrap();
        assert_eq!(PROTOCOL_VERSION, *context.protocol_version());
        assert_eq!("RNTBD-Server", context.server_agent());
        assert_eq!(1200, *context.idle_timeout_in_seconds());
        assert_eq!(0, *context.unauthenticated_timeout_in_seconds());
    }

    #[test]
    fn context_exception_synthesizes_body_without_payload() {
        let mut headers = RntbdTokenStream::<RntbdResponseHeader>::default();
        let exception =
            RntbdContextException::from_frame(401, Uuid::nil(), &mut headers, None);
        assert_eq!(401, exception.status);
        assert_eq!("Unauthorized", exception.error_body.message);
    }
}
