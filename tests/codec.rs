use bytes::{Buf, BufMut, Bytes, BytesMut};
use rntbd_protocol::frames::context::PROTOCOL_VERSION;
use rntbd_protocol::frames::headers::{
    RntbdContextHeader, RntbdRequestHeader, RntbdResponseHeader,
};
use rntbd_protocol::frames::stream::RntbdTokenStream;
use rntbd_protocol::frames::tokens::{RntbdTokenType, TokenValue};
use rntbd_protocol::frames::{
    RntbdMessage, RntbdMessageDecoder, RntbdOperationType, RntbdRequest, RntbdResourceType,
    RESPONSE_PROLOG_LENGTH,
};
use rntbd_protocol::request::RntbdRequestArgs;
use test_case::test_case;
use tokio_util::codec::Decoder;
use uuid::Uuid;

fn args(
    resource_type: RntbdResourceType,
    operation_type: RntbdOperationType,
    payload: Option<&'static [u8]>,
) -> RntbdRequestArgs {
    let args = RntbdRequestArgs::new(
        Uuid::new_v4(),
        "rntbd://localhost:8009/apps/a/services/s/partitions/p/replicas/1/".to_owned(),
        "apps/a/services/s/partitions/p/replicas/1/".to_owned(),
        resource_type,
        operation_type,
    );
    match payload {
        Some(payload) => args.with_payload(Bytes::from_static(payload)),
        None => args,
    }
}

#[test_case(RntbdResourceType::Document, RntbdOperationType::Read, None; "document read")]
#[test_case(RntbdResourceType::Document, RntbdOperationType::Create, Some(b"{\"id\":\"1\"}".as_slice()); "document create")]
#[test_case(RntbdResourceType::Collection, RntbdOperationType::ReadFeed, None; "collection read feed")]
#[test_case(RntbdResourceType::StoredProcedure, RntbdOperationType::ExecuteJavaScript, Some(b"[]".as_slice()); "sproc execute")]
#[test_case(RntbdResourceType::Document, RntbdOperationType::SqlQuery, Some(b"SELECT 1".as_slice()); "query")]
fn request_frame_survives_a_server_side_parse(
    resource_type: RntbdResourceType,
    operation_type: RntbdOperationType,
    payload: Option<&'static [u8]>,
) {
    // GIVEN
    let args = args(resource_type, operation_type, payload);
    let request = RntbdRequest::from_args(&args, 17).unwrap();

    // WHEN
    let mut wire = request.encode_bytes().unwrap();

    // THEN
    let total_length = wire.get_u32_le();
    let mut frame = wire.split_to(total_length as usize);
    let mut guid = [0u8; 16];
    frame.copy_to_slice(&mut guid);
    assert_eq!(*args.activity_id(), Uuid::from_bytes_le(guid));
    assert_eq!(resource_type as u16, frame.get_u16_le());
    assert_eq!(operation_type as u16, frame.get_u16_le());
    assert_eq!(17, frame.get_u64_le());

    let mut headers = RntbdTokenStream::<RntbdRequestHeader>::decode(&mut frame).unwrap();
    assert!(frame.is_empty());
    assert_eq!(
        TokenValue::Byte(u8::from(payload.is_some())),
        headers.value(RntbdRequestHeader::PayloadPresent).unwrap()
    );
    assert_eq!(
        TokenValue::String("apps/a/services/s/partitions/p/replicas/1/".into()),
        headers.value(RntbdRequestHeader::ReplicaPath).unwrap()
    );

    match payload {
        Some(payload) => {
            let payload_length = wire.get_u32_le();
            assert_eq!(payload.len(), payload_length as usize);
            assert_eq!(payload, &wire[..]);
        }
        None => assert!(wire.is_empty()),
    }
}

fn context_frame() -> BytesMut {
    let mut headers = RntbdTokenStream::<RntbdContextHeader>::default();
    headers
        .set(RntbdContextHeader::ProtocolVersion, TokenValue::ULong(PROTOCOL_VERSION))
        .unwrap();
    headers
        .set(RntbdContextHeader::ClientVersion, TokenValue::String("0.1.0".into()))
        .unwrap();
    headers
        .set(RntbdContextHeader::ServerAgent, TokenValue::String("RNTBD".into()))
        .unwrap();
    headers
        .set(RntbdContextHeader::ServerVersion, TokenValue::String("1.0".into()))
        .unwrap();
    let mut body = BytesMut::new();
    headers.encode(&mut body).unwrap();
    let mut frame = BytesMut::new();
    frame.put_u32_le(RESPONSE_PROLOG_LENGTH + body.len() as u32);
    frame.put_u32_le(200);
    frame.put_slice(&Uuid::nil().to_bytes_le());
    frame.put_u64_le(0);
    frame.put_slice(&body);
    frame
}

fn response_frame_with_unknown_header() -> BytesMut {
    let mut body = BytesMut::new();
    let mut headers = RntbdTokenStream::<RntbdResponseHeader>::default();
    headers
        .set(RntbdResponseHeader::PayloadPresent, TokenValue::Byte(0))
        .unwrap();
    headers
        .set(RntbdResponseHeader::Lsn, TokenValue::LongLong(99))
        .unwrap();
    headers.encode(&mut body).unwrap();
    // An id outside the catalog carrying a Guid body.
    body.put_u16_le(0xFFFE);
    body.put_u8(RntbdTokenType::Guid.id());
    body.put_slice(&Uuid::nil().to_bytes_le());

    let mut frame = BytesMut::new();
    frame.put_u32_le(RESPONSE_PROLOG_LENGTH + body.len() as u32);
    frame.put_u32_le(200);
    frame.put_slice(&Uuid::nil().to_bytes_le());
    frame.put_u64_le(3);
    frame.put_slice(&body);
    frame
}

#[test]
fn decoder_survives_byte_at_a_time_delivery() {
    // GIVEN: a context frame followed by a response frame, delivered one
    // byte at a time.
    let mut wire = context_frame();
    wire.extend_from_slice(&response_frame_with_unknown_header());

    let mut decoder = RntbdMessageDecoder::default();
    let mut buffer = BytesMut::new();
    let mut messages = Vec::new();

    // WHEN
    for byte in wire.iter() {
        buffer.put_u8(*byte);
        while let Some(message) = decoder.decode(&mut buffer).unwrap() {
            messages.push(message);
        }
    }

    // THEN
    assert_eq!(2, messages.len());
    match &messages[0] {
        RntbdMessage::Context(context) => assert_eq!("RNTBD", context.server_agent()),
        other => panic!("expected context, got {:?}", other),
    }
    match &mut messages[1] {
        RntbdMessage::Response(response) => {
            assert_eq!(200, response.status());
            assert_eq!(3, response.transport_request_id());
            assert_eq!(99, response.lsn());
            let undefined = response.headers().undefined_tokens();
            assert_eq!(1, undefined.len());
            assert_eq!(0xFFFE, undefined[0].id());
        }
        other => panic!("expected response, got {:?}", other),
    }
}

#[test]
fn transport_headers_ride_the_request_frame() {
    // GIVEN
    let args = args(RntbdResourceType::Document, RntbdOperationType::Query, None)
        .with_header(RntbdRequestHeader::PageSize, TokenValue::ULong(1000))
        .with_header(
            RntbdRequestHeader::SessionToken,
            TokenValue::String("0:123".into()),
        )
        .with_header(RntbdRequestHeader::EnableScanInQuery, TokenValue::Byte(1));

    // WHEN
    let mut wire = RntbdRequest::from_args(&args, 1).unwrap().encode_bytes().unwrap();

    // THEN
    let total_length = wire.get_u32_le();
    let mut frame = wire.split_to(total_length as usize);
    frame.advance(28);
    let mut headers = RntbdTokenStream::<RntbdRequestHeader>::decode(&mut frame).unwrap();
    assert_eq!(
        TokenValue::ULong(1000),
        headers.value(RntbdRequestHeader::PageSize).unwrap()
    );
    assert_eq!(
        TokenValue::String("0:123".into()),
        headers.value(RntbdRequestHeader::SessionToken).unwrap()
    );
    assert_eq!(
        TokenValue::Byte(1),
        headers.value(RntbdRequestHeader::EnableScanInQuery).unwrap()
    );
}
