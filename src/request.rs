use crate::errors::{RntbdError, ServiceError};
use crate::frames::headers::{RntbdHeader, RntbdRequestHeader, RntbdResponseHeader};
use crate::frames::stream::RntbdTokenStream;
use crate::frames::tokens::TokenValue;
use crate::frames::{RntbdOperationType, RntbdResourceType, RntbdResponse};
use bytes::Bytes;
use log::debug;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// What a caller submits: everything needed to address one replica and
/// shape one request frame. Routing, retry and signing happen above
/// this layer.
#[derive(Debug, Clone, Getters, new)]
pub struct RntbdRequestArgs {
    #[get = "pub"]
    activity_id: Uuid,
    /// Physical endpoint URI, carried for diagnostics.
    #[get = "pub"]
    physical_address: String,
    #[get = "pub"]
    replica_path: String,
    #[get = "pub"]
    resource_type: RntbdResourceType,
    #[get = "pub"]
    operation_type: RntbdOperationType,
    #[new(default)]
    #[get = "pub"]
    transport_headers: Vec<(RntbdRequestHeader, TokenValue)>,
    #[new(default)]
    #[get = "pub"]
    payload: Option<Bytes>,
    /// Per-request override of the configured request timeout.
    #[new(default)]
    #[get = "pub"]
    timeout: Option<Duration>,
}

impl RntbdRequestArgs {
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, header: RntbdRequestHeader, value: TokenValue) -> Self {
        self.transport_headers.push((header, value));
        self
    }

    /// The request's transport headers rendered to text, the form the
    /// synthetic `Gone` error reports them in.
    pub(crate) fn headers_map(&self) -> HashMap<String, String> {
        self.transport_headers
            .iter()
            .map(|(header, value)| (header.name().to_owned(), value.to_string()))
            .collect()
    }
}

/// A successful response, as handed to the caller.
#[derive(Debug)]
pub struct StoreResponse {
    status: u32,
    activity_id: Uuid,
    headers: RntbdTokenStream<RntbdResponseHeader>,
    payload: Option<Bytes>,
}

impl StoreResponse {
    pub fn status(&self) -> u32 {
        self.status
    }

    pub fn activity_id(&self) -> Uuid {
        self.activity_id
    }

    pub fn headers(&mut self) -> &mut RntbdTokenStream<RntbdResponseHeader> {
        &mut self.headers
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
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

    pub fn lsn(&mut self) -> i64 {
        self.headers
            .value(RntbdResponseHeader::Lsn)
            .ok()
            .and_then(|value| value.as_i64())
            .unwrap_or(-1)
    }

    pub fn request_charge(&mut self) -> f64 {
        self.headers
            .value(RntbdResponseHeader::RequestCharge)
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0)
    }

    pub fn item_count(&mut self) -> u64 {
        self.headers
            .value(RntbdResponseHeader::ItemCount)
            .ok()
            .and_then(|value| value.as_u64())
            .unwrap_or(0)
    }

    pub fn retry_after(&mut self) -> Option<Duration> {
        if !self.headers.is_present(RntbdResponseHeader::RetryAfterMilliseconds) {
            return None;
        }
        self.headers
            .value(RntbdResponseHeader::RetryAfterMilliseconds)
            .ok()
            .and_then(|value| value.as_u64())
            .map(Duration::from_millis)
    }

    pub fn continuation_token(&mut self) -> Option<String> {
        if !self.headers.is_present(RntbdResponseHeader::ContinuationToken) {
            return None;
        }
        self.headers
            .value(RntbdResponseHeader::ContinuationToken)
            .ok()
            .and_then(TokenValue::into_string)
    }
}

impl From<RntbdResponse> for StoreResponse {
    fn from(mut response: RntbdResponse) -> Self {
        let status = response.status();
        let activity_id = response.activity_id();
        let payload = response.payload().cloned();
        let headers = std::mem::take(response.headers());
        StoreResponse {
            status,
            activity_id,
            headers,
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// One in-flight request: the submitted args, the completion the caller
/// awaits, and the deadline timer. Transitions out of `Pending` are
/// one-way; the loser of any race observes `false`.
#[derive(Debug)]
pub struct RntbdRequestRecord {
    args: RntbdRequestArgs,
    transport_request_id: u64,
    timeout: Duration,
    deadline: Instant,
    state: RecordState,
    completion: Option<oneshot::Sender<Result<StoreResponse, RntbdError>>>,
    timer: Option<JoinHandle<()>>,
}

impl RntbdRequestRecord {
    pub(crate) fn new(
        args: RntbdRequestArgs,
        transport_request_id: u64,
        timeout: Duration,
        completion: oneshot::Sender<Result<StoreResponse, RntbdError>>,
    ) -> RntbdRequestRecord {
        RntbdRequestRecord {
            args,
            transport_request_id,
            timeout,
            deadline: Instant::now() + timeout,
            state: RecordState::Pending,
            completion: Some(completion),
            timer: None,
        }
    }

    pub fn args(&self) -> &RntbdRequestArgs {
        &self.args
    }

    pub fn transport_request_id(&self) -> u64 {
        self.transport_request_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Hands the deadline timer to the record so a terminal transition
    /// disarms it.
    pub fn arm(&mut self, timer: JoinHandle<()>) {
        self.timer = Some(timer);
    }

    pub fn complete(&mut self, response: StoreResponse) -> bool {
        self.transition(RecordState::Completed, Ok(response))
    }

    pub fn complete_exceptionally(&mut self, error: RntbdError) -> bool {
        self.transition(RecordState::Failed, Err(error))
    }

    pub fn expire(&mut self) -> bool {
        let error = ServiceError::request_timeout(self.transport_request_id, self.timeout);
        self.transition(RecordState::Failed, Err(error.into()))
    }

    pub fn cancel(&mut self) -> bool {
        let id = self.transport_request_id;
        if !matches!(self.state, RecordState::Pending) {
            return false;
        }
        self.state = RecordState::Cancelled;
        self.disarm();
        self.completion.take();
        debug!("request {} cancelled", id);
        true
    }

    fn transition(
        &mut self,
        state: RecordState,
        outcome: Result<StoreResponse, RntbdError>,
    ) -> bool {
        if !matches!(self.state, RecordState::Pending) {
            return false;
        }
        self.state = state;
        self.disarm();
        if let Some(completion) = self.completion.take() {
            if completion.send(outcome).is_err() {
                debug!(
                    "request {} completion dropped by caller",
                    self.transport_request_id
                );
            }
        }
        true
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ConnectionError, RntbdError, ServiceErrorKind};
    use tokio_test::block_on;

    fn record() -> (
        RntbdRequestRecord,
        oneshot::Receiver<Result<StoreResponse, RntbdError>>,
    ) {
        let args = RntbdRequestArgs::new(
            Uuid::new_v4(),
            "rntbd://localhost:8009/r/1".to_owned(),
            "r/1".to_owned(),
            RntbdResourceType::Document,
            RntbdOperationType::Read,
        );
        let (sender, receiver) = oneshot::channel();
        let record = RntbdRequestRecord::new(args, 1, Duration::from_millis(250), sender);
        (record, receiver)
    }

    fn store_response(status: u32) -> StoreResponse {
        StoreResponse {
            status,
            activity_id: Uuid::nil(),
            headers: RntbdTokenStream::default(),
            payload: None,
        }
    }

    #[test]
    fn complete_is_terminal() {
        let (mut record, receiver) = record();
        assert!(record.complete(store_response(200)));
        assert_eq!(RecordState::Completed, record.state());

        // Every later transition is an observable no-op.
        assert!(!record.complete(store_response(201)));
        assert!(!record.complete_exceptionally(RntbdError::Error("late".into())));
        assert!(!record.expire());
        assert!(!record.cancel());

        let outcome = block_on(receiver).unwrap().unwrap();
        assert_eq!(200, outcome.status());
    }

    #[test]
    fn expire_fails_the_record_with_a_timeout() {
        let (mut record, receiver) = record();
        assert!(record.expire());
        assert_eq!(RecordState::Failed, record.state());

        let error = block_on(receiver).unwrap().unwrap_err();
        let service_error = error.service_error().expect("service error");
        assert_eq!(ServiceErrorKind::RequestTimeout, service_error.kind);
        assert_eq!(408, service_error.status);
    }

    #[test]
    fn cancel_drops_the_completion() {
        let (mut record, receiver) = record();
        assert!(record.cancel());
        assert_eq!(RecordState::Cancelled, record.state());
        assert!(!record.complete_exceptionally(ConnectionError::Unhealthy.into()));
        assert!(block_on(receiver).is_err());
    }

    #[test]
    fn headers_map_renders_transport_headers() {
        let args = RntbdRequestArgs::new(
            Uuid::nil(),
            "rntbd://localhost:8009/r/1".to_owned(),
            "r/1".to_owned(),
            RntbdResourceType::Document,
            RntbdOperationType::Read,
        )
        .with_header(RntbdRequestHeader::PageSize, TokenValue::ULong(100))
        .with_header(
            RntbdRequestHeader::SessionToken,
            TokenValue::String("0:42".into()),
        );
        let map = args.headers_map();
        assert_eq!(Some("100"), map.get("PageSize").map(String::as_str));
        assert_eq!(Some("0:42"), map.get("SessionToken").map(String::as_str));
    }
}
