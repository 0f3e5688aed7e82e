use crate::errors::CodecError;
use crate::frames::context::{RntbdContext, RntbdContextException};
use crate::frames::headers::{RntbdContextHeader, RntbdHeader, RntbdRequestHeader, RntbdResponseHeader};
use crate::frames::stream::RntbdTokenStream;
use crate::frames::tokens::TokenValue;
use crate::request::RntbdRequestArgs;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use strum::IntoEnumIterator;
use tokio_util::codec::Decoder;
use uuid::Uuid;

pub mod context;
pub mod headers;
pub mod stream;
pub mod tokens;

/// Prolog bytes after the length field: activity id, resource type,
/// operation type, transport request id.
pub const REQUEST_PROLOG_LENGTH: u32 = 28;
/// Prolog bytes after the length field: status, activity id, transport
/// request id.
pub const RESPONSE_PROLOG_LENGTH: u32 = 28;
/// Upper bound accepted for a frame or payload blob; anything larger is
/// treated as a malformed stream.
pub const FRAME_MAX_LENGTH: u32 = 0x0400_0000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum RntbdResourceType {
    Connection = 0x0000,
    Database = 0x0001,
    Collection = 0x0002,
    Document = 0x0003,
    Attachment = 0x0004,
    User = 0x0005,
    Permission = 0x0006,
    StoredProcedure = 0x0007,
    Trigger = 0x0008,
    UserDefinedFunction = 0x0009,
    Conflict = 0x000A,
    PartitionKeyRange = 0x000B,
    Schema = 0x000C,
    Offer = 0x000D,
    Record = 0x000E,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum RntbdOperationType {
    Connect = 0x0000,
    Create = 0x0001,
    Update = 0x0002,
    Read = 0x0003,
    ReadFeed = 0x0004,
    Delete = 0x0005,
    Replace = 0x0006,
    ExecuteJavaScript = 0x0008,
    SqlQuery = 0x0009,
    Query = 0x000E,
    Head = 0x0012,
    HeadFeed = 0x0013,
    Upsert = 0x0014,
}

/// Writes one request frame: length-prefixed prolog plus header stream,
/// then the optional payload as a length-prefixed blob after the frame.
pub(crate) fn encode_request_frame<H: RntbdHeader>(
    dst: &mut BytesMut,
    activity_id: Uuid,
    resource_type: RntbdResourceType,
    operation_type: RntbdOperationType,
    transport_request_id: u64,
    headers: &mut RntbdTokenStream<H>,
    payload: Option<&Bytes>,
) -> Result<(), CodecError> {
    let total_length = REQUEST_PROLOG_LENGTH + headers.compute_length();
    dst.reserve(4 + total_length as usize);
    dst.put_u32_le(total_length);
    dst.put_slice(&activity_id.to_bytes_le());
    dst.put_u16_le(resource_type as u16);
    dst.put_u16_le(operation_type as u16);
    dst.put_u64_le(transport_request_id);
    headers.encode(dst)?;
    if let Some(payload) = payload {
        dst.put_u32_le(payload.len() as u32);
        dst.put_slice(payload);
    }
    Ok(())
}

/// An outbound request frame bound to a transport request id.
#[derive(Debug)]
pub struct RntbdRequest {
    activity_id: Uuid,
    resource_type: RntbdResourceType,
    operation_type: RntbdOperationType,
    transport_request_id: u64,
    headers: RntbdTokenStream<RntbdRequestHeader>,
    payload: Option<Bytes>,
}

impl RntbdRequest {
    pub fn from_args(
        args: &RntbdRequestArgs,
        transport_request_id: u64,
    ) -> Result<RntbdRequest, CodecError> {
        let mut headers = RntbdTokenStream::<RntbdRequestHeader>::default();
        headers.set(
            RntbdRequestHeader::ReplicaPath,
            TokenValue::String(args.replica_path().clone()),
        )?;
        headers.set(
            RntbdRequestHeader::PayloadPresent,
            TokenValue::Byte(u8::from(args.payload().is_some())),
        )?;
        for (header, value) in args.transport_headers() {
            headers.set(*header, value.clone())?;
        }
        Ok(RntbdRequest {
            activity_id: *args.activity_id(),
            resource_type: *args.resource_type(),
            operation_type: *args.operation_type(),
            transport_request_id,
            headers,
            payload: args.payload().clone(),
        })
    }

    pub fn transport_request_id(&self) -> u64 {
        self.transport_request_id
    }

    pub fn encode(&mut self, dst: &mut BytesMut) -> Result<(), CodecError> {
        encode_request_frame(
            dst,
            self.activity_id,
            self.resource_type,
            self.operation_type,
            self.transport_request_id,
            &mut self.headers,
            self.payload.as_ref(),
        )
    }

    pub fn encode_bytes(mut self) -> Result<Bytes, CodecError> {
        let mut bytes = BytesMut::new();
        self.encode(&mut bytes)?;
        Ok(bytes.freeze())
    }
}

/// A fully decoded response frame.
#[derive(Debug)]
pub struct RntbdResponse {
    status: u32,
    activity_id: Uuid,
    transport_request_id: u64,
    headers: RntbdTokenStream<RntbdResponseHeader>,
    payload: Option<Bytes>,
}

impl RntbdResponse {
    pub fn status(&self) -> u32 {
        self.status
    }

    pub fn activity_id(&self) -> Uuid {
        self.activity_id
    }

    pub fn transport_request_id(&self) -> u64 {
        self.transport_request_id
    }

    pub fn headers(&mut self) -> &mut RntbdTokenStream<RntbdResponseHeader> {
        &mut self.headers
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn lsn(&mut self) -> i64 {
        self.headers
            .value(RntbdResponseHeader::Lsn)
            .ok()
            .and_then(|value| value.as_i64())
            .unwrap_or(-1)
    }

    pub fn sub_status(&mut self) -> u32 {
        self.headers
            .value(RntbdResponseHeader::SubStatus)
            .ok()
            .and_then(|value| value.as_u32())
            .unwrap_or(0)
    }

    pub fn partition_key_range_id(&mut self) -> Option<String> {
        if !self.headers.is_present(RntbdResponseHeader::PartitionKeyRangeId) {
            return None;
        }
        self.headers
            .value(RntbdResponseHeader::PartitionKeyRangeId)
            .ok()
            .and_then(TokenValue::into_string)
    }

    pub fn session_token(&mut self) -> Option<String> {
        if !self.headers.is_present(RntbdResponseHeader::SessionToken) {
            return None;
        }
        self.headers
            .value(RntbdResponseHeader::SessionToken)
            .ok()
            .and_then(TokenValue::into_string)
    }

    pub fn request_charge(&mut self) -> f64 {
        self.headers
            .value(RntbdResponseHeader::RequestCharge)
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0)
    }

    /// Present headers rendered to text, keyed by header name; the
    /// activity id rides along for diagnostics.
    pub fn headers_map(&mut self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("ActivityId".to_owned(), self.activity_id.to_string());
        for header in RntbdResponseHeader::iter() {
            if !self.headers.is_present(header) {
                continue;
            }
            if let Ok(value) = self.headers.value(header) {
                map.insert(header.name().to_owned(), value.to_string());
            }
        }
        map
    }
}

/// Everything the inbound half of a connection can produce.
#[derive(Debug)]
pub enum RntbdMessage {
    Context(RntbdContext),
    ContextError(RntbdContextException),
    Response(RntbdResponse),
}

#[derive(Debug)]
enum PendingMessage {
    Response(RntbdResponse),
    ContextException {
        status: u32,
        activity_id: Uuid,
        headers: RntbdTokenStream<RntbdResponseHeader>,
    },
}

impl PendingMessage {
    fn attach(self, payload: Bytes) -> RntbdMessage {
        match self {
            PendingMessage::Response(mut response) => {
                response.payload = Some(payload);
                RntbdMessage::Response(response)
            }
            PendingMessage::ContextException {
                status,
                activity_id,
                mut headers,
            } => RntbdMessage::ContextError(RntbdContextException::from_frame(
                status,
                activity_id,
                &mut headers,
                Some(&payload),
            )),
        }
    }
}

/// Back-pressure-safe decoder for the inbound half of a connection.
///
/// The first complete frame is the answer to the context request and is
/// decoded with the context header catalog; every later frame is a
/// response. Partial frames and partial payload blobs stay buffered.
#[derive(Debug)]
pub struct RntbdMessageDecoder {
    negotiating: bool,
    pending: Option<PendingMessage>,
}

impl Default for RntbdMessageDecoder {
    fn default() -> Self {
        RntbdMessageDecoder {
            negotiating: true,
            pending: None,
        }
    }
}

fn peek_u32_le(src: &BytesMut) -> u32 {
    u32::from_le_bytes([src[0], src[1], src[2], src[3]])
}

impl Decoder for RntbdMessageDecoder {
    type Item = RntbdMessage;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RntbdMessage>, CodecError> {
        loop {
            if let Some(pending) = self.pending.take() {
                if src.len() < 4 {
                    self.pending = Some(pending);
                    return Ok(None);
                }
                let length = peek_u32_le(src);
                if length > FRAME_MAX_LENGTH {
                    return Err(CodecError::FrameTooLong {
                        length,
                        limit: FRAME_MAX_LENGTH,
                    });
                }
                if src.len() < 4 + length as usize {
                    src.reserve(4 + length as usize - src.len());
                    self.pending = Some(pending);
                    return Ok(None);
                }
                src.advance(4);
                let payload = src.split_to(length as usize).freeze();
                return Ok(Some(pending.attach(payload)));
            }

            if src.len() < 4 {
                return Ok(None);
            }
            let total_length = peek_u32_le(src);
            if total_length > FRAME_MAX_LENGTH {
                return Err(CodecError::FrameTooLong {
                    length: total_length,
                    limit: FRAME_MAX_LENGTH,
                });
            }
            if total_length < RESPONSE_PROLOG_LENGTH {
                return Err(CodecError::FrameTooShort {
                    length: total_length,
                    minimum: RESPONSE_PROLOG_LENGTH,
                });
            }
            if src.len() < 4 + total_length as usize {
                src.reserve(4 + total_length as usize - src.len());
                return Ok(None);
            }
            src.advance(4);
            let mut frame = src.split_to(total_length as usize).freeze();
            let status = frame.get_u32_le();
            let mut guid = [0u8; 16];
            frame.copy_to_slice(&mut guid);
            let activity_id = Uuid::from_bytes_le(guid);
            let transport_request_id = frame.get_u64_le();

            if self.negotiating {
                if (200..300).contains(&status) {
                    let mut headers = RntbdTokenStream::<RntbdContextHeader>::decode(&mut frame)?;
                    let rntbd_context = RntbdContext::from_frame(activity_id, &mut headers)?;
                    self.negotiating = false;
                    return Ok(Some(RntbdMessage::Context(rntbd_context)));
                }
                let mut headers =
                    RntbdTokenStream::<RntbdResponseHeader>::decode_tokens(&mut frame)?;
                let payload_present = headers
                    .value(RntbdResponseHeader::PayloadPresent)?
                    .as_u8()
                    .unwrap_or(0)
                    == 1;
                self.negotiating = false;
                if payload_present {
                    self.pending = Some(PendingMessage::ContextException {
                        status,
                        activity_id,
                        headers,
                    });
                    continue;
                }
                let exception =
                    RntbdContextException::from_frame(status, activity_id, &mut headers, None);
                return Ok(Some(RntbdMessage::ContextError(exception)));
            }

            let mut headers = RntbdTokenStream::<RntbdResponseHeader>::decode(&mut frame)?;
            let payload_present = headers
                .value(RntbdResponseHeader::PayloadPresent)?
                .as_u8()
                .unwrap_or(0)
                == 1;
            let response = RntbdResponse {
                status,
                activity_id,
                transport_request_id,
                headers,
                payload: None,
            };
            if payload_present {
                self.pending = Some(PendingMessage::Response(response));
                continue;
            }
            return Ok(Some(RntbdMessage::Response(response)));
        }
    }
}
