use crate::config::Config;
use crate::connection::health::{ChannelHealthChecker, Timestamps};
use crate::errors::{ClosedEvent, CodecError, ConnectionError, RntbdError, ServiceError};
use crate::frames::context::RntbdContextRequest;
use crate::frames::{RntbdMessage, RntbdMessageDecoder, RntbdRequest, RntbdResponse};
use crate::request::{RntbdRequestArgs, RntbdRequestRecord, StoreResponse};
use bytes::Bytes;
use futures::StreamExt;
use log::{debug, error, trace, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::FramedRead;
use uuid::Uuid;

pub mod health;
pub mod pool;

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// What a [`Connection`] handle may ask of its manager task.
#[derive(Debug)]
enum Command {
    Submit {
        args: RntbdRequestArgs,
        completion: oneshot::Sender<Result<StoreResponse, RntbdError>>,
    },
    Close,
}

/// What the I/O tasks and timers report to the manager task.
#[derive(Debug)]
enum Event {
    Inbound(Result<RntbdMessage, CodecError>),
    InboundClosed,
    WriteFailed(ConnectionError),
    Expire(u64),
    HealthResult(bool),
}

/// Per-connection lifecycle. Linear, except that
/// `ClosingExceptionally` may be entered from any live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Fresh,
    Registered,
    ContextRequested,
    ContextEstablished,
    ClosingExceptionally,
    Closed,
}

#[derive(Debug)]
struct SharedState {
    pending_count: AtomicUsize,
    context_established: AtomicBool,
    closed: AtomicBool,
    pending_request_limit: usize,
    timestamps: Arc<Timestamps>,
    health_checker: Arc<dyn ChannelHealthChecker>,
}

/// Handle to one multiplexed RNTBD connection. Cloneable; all clones
/// talk to the same manager task.
#[derive(Debug, Clone)]
pub struct Connection {
    commands: Sender<Command>,
    shared: Arc<SharedState>,
}

impl Connection {
    /// Dials `addr` and spawns the connection tasks. The RNTBD context
    /// is negotiated lazily, on the first submitted request.
    pub async fn connect(
        addr: SocketAddr,
        config: Arc<Config>,
        health_checker: Arc<dyn ChannelHealthChecker>,
    ) -> ConnectionResult<Connection> {
        debug!("Connecting to {}", addr);
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ConnectionError::Error(format!("connect to {} timed out", addr)))??;
        stream.set_nodelay(true)?;
        Ok(Connection::spawn(
            stream,
            format!("rntbd://{}", addr),
            config,
            health_checker,
        ))
    }

    /// Spawns the reader, writer and manager tasks over any duplex
    /// stream. A TLS stream slots in here unchanged.
    pub fn spawn<S>(
        stream: S,
        endpoint: String,
        config: Arc<Config>,
        health_checker: Arc<dyn ChannelHealthChecker>,
    ) -> Connection
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        let (commands_sender, commands) = mpsc::channel(config.frame_buffer_size);
        let (events_sender, events) = mpsc::channel(config.frame_buffer_size);
        let (writer_sender, writer_receiver) = mpsc::channel(config.frame_buffer_size);
        let timestamps = Arc::new(Timestamps::new());
        let shared = Arc::new(SharedState {
            pending_count: AtomicUsize::new(0),
            context_established: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            pending_request_limit: config.pending_request_limit,
            timestamps: timestamps.clone(),
            health_checker: health_checker.clone(),
        });

        let framed_read = FramedRead::new(read, RntbdMessageDecoder::default());
        FrameReceiver::spawn(framed_read, events_sender.clone(), timestamps.clone());
        FrameSender::spawn(
            write,
            writer_receiver,
            events_sender.clone(),
            timestamps.clone(),
            config.frame_buffer_size,
        );

        let manager = RntbdRequestManager::new(
            config,
            endpoint,
            writer_sender,
            events_sender,
            shared.clone(),
        );
        tokio::spawn(manager.run(commands, events));

        Connection {
            commands: commands_sender,
            shared,
        }
    }

    /// Submits one request and awaits its response. Not blocking other
    /// submissions; responses complete out of order.
    pub async fn submit(&self, args: RntbdRequestArgs) -> Result<StoreResponse, RntbdError> {
        let (completion, response) = oneshot::channel();
        self.commands
            .send(Command::Submit { args, completion })
            .await
            .map_err(|_| ConnectionError::ChannelClosed(ClosedEvent::OnDeregister))?;
        response
            .await
            .map_err(|_| ConnectionError::ChannelClosed(ClosedEvent::OnDeregister))?
    }

    /// Asks the manager to close. Pending requests fail with a `Gone`
    /// error whose cause is the `OnClose` sentinel.
    pub async fn close(&self) {
        let _ = self.commands.send(Command::Close).await;
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending_count.load(Ordering::Relaxed)
    }

    pub fn context_established(&self) -> bool {
        self.shared.context_established.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Relaxed)
    }

    /// Admission control. Before the context is established the cap is
    /// `min(limit, demand)`, which keeps a flood of writes from piling
    /// up behind the handshake.
    pub fn is_serviceable(&self, demand: usize) -> bool {
        if self.is_closed() {
            return false;
        }
        let limit = if self.context_established() {
            self.shared.pending_request_limit
        } else {
            self.shared.pending_request_limit.min(demand)
        };
        self.pending_count() < limit
    }

    pub async fn is_healthy(&self) -> bool {
        !self.is_closed()
            && self
                .shared
                .health_checker
                .is_healthy(&self.shared.timestamps)
                .await
    }
}

/// An encoded request held back until the context response arrives.
#[derive(Debug)]
struct PendingWrite {
    transport_request_id: u64,
    bytes: Bytes,
}

/// The per-connection state machine. Owned by one spawned task; every
/// mutation of the pending table, the coalescing queue and the
/// connection state happens there.
struct RntbdRequestManager {
    config: Arc<Config>,
    endpoint: String,
    state: ConnectionState,
    next_transport_request_id: u64,
    pending_requests: HashMap<u64, RntbdRequestRecord>,
    pending_writes: Vec<PendingWrite>,
    writer: Option<Sender<Bytes>>,
    events: Sender<Event>,
    shared: Arc<SharedState>,
    close_event: Option<ClosedEvent>,
    health_check_inflight: bool,
    last_idle_check: Instant,
}

impl RntbdRequestManager {
    fn new(
        config: Arc<Config>,
        endpoint: String,
        writer: Sender<Bytes>,
        events: Sender<Event>,
        shared: Arc<SharedState>,
    ) -> RntbdRequestManager {
        RntbdRequestManager {
            config,
            endpoint,
            state: ConnectionState::Fresh,
            next_transport_request_id: 1,
            pending_requests: HashMap::new(),
            pending_writes: Vec::new(),
            writer: Some(writer),
            events,
            shared,
            close_event: None,
            health_check_inflight: false,
            last_idle_check: Instant::now(),
        }
    }

    async fn run(mut self, mut commands: Receiver<Command>, mut events: Receiver<Event>) {
        debug!("Starting RntbdRequestManager for {}", self.endpoint);
        self.state = ConnectionState::Registered;
        loop {
            let idle_deadline = self.idle_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.on_inactive(ClosedEvent::OnDeregister).await;
                        break;
                    }
                },
                event = events.recv() => {
                    if let Some(event) = event {
                        self.handle_event(event).await;
                    }
                },
                _ = idle_sleep(idle_deadline) => self.on_idle_timeout(),
            }
        }
        debug!("RntbdRequestManager for {} stopped", self.endpoint);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit { args, completion } => self.submit(args, completion).await,
            Command::Close => self.on_inactive(ClosedEvent::OnClose).await,
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Inbound(Ok(message)) => self.on_message(message).await,
            Event::Inbound(Err(error)) => self.close_exceptionally(error.into()).await,
            Event::InboundClosed => self.on_inactive(ClosedEvent::OnUnregister).await,
            Event::WriteFailed(error) => self.close_exceptionally(error).await,
            Event::Expire(transport_request_id) => self.expire(transport_request_id),
            Event::HealthResult(healthy) => {
                self.health_check_inflight = false;
                if !healthy {
                    self.close_exceptionally(ConnectionError::Unhealthy).await;
                }
            }
        }
    }

    async fn submit(
        &mut self,
        args: RntbdRequestArgs,
        completion: oneshot::Sender<Result<StoreResponse, RntbdError>>,
    ) {
        if matches!(
            self.state,
            ConnectionState::ClosingExceptionally | ConnectionState::Closed
        ) {
            let event = self.close_event.unwrap_or(ClosedEvent::OnClose);
            let _ = completion.send(Err(ConnectionError::ChannelClosed(event).into()));
            return;
        }
        if self.pending_requests.len() >= self.config.pending_request_limit {
            let _ = completion.send(Err(ConnectionError::PendingLimitExceeded(
                self.config.pending_request_limit,
            )
            .into()));
            return;
        }

        let transport_request_id = self.next_transport_request_id;
        self.next_transport_request_id += 1;

        let bytes = match RntbdRequest::from_args(&args, transport_request_id)
            .and_then(RntbdRequest::encode_bytes)
        {
            Ok(bytes) => bytes,
            Err(error) => {
                let _ = completion.send(Err(error.into()));
                return;
            }
        };

        let timeout = args.timeout().unwrap_or(self.config.request_timeout);
        let mut record =
            RntbdRequestRecord::new(args, transport_request_id, timeout, completion);
        let deadline = record.deadline();
        let events = self.events.clone();
        record.arm(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = events.send(Event::Expire(transport_request_id)).await;
        }));

        // Ids are assigned from a connection-local monotonic counter, so
        // a collision here is a programming error.
        let collision = self
            .pending_requests
            .insert(transport_request_id, record)
            .is_some();
        debug_assert!(!collision, "transport request id collision");
        if collision {
            error!(
                "{} transport request id collision: {}",
                self.endpoint, transport_request_id
            );
        }
        self.sync_pending_count();

        match self.state {
            ConnectionState::Registered => {
                // The first user write triggers the context handshake;
                // the write itself pends behind it.
                self.request_context().await;
                if self.state == ConnectionState::ContextRequested {
                    self.pend_write(transport_request_id, bytes);
                }
            }
            ConnectionState::ContextRequested => self.pend_write(transport_request_id, bytes),
            ConnectionState::ContextEstablished => {
                if let Err(error) = self.write(bytes).await {
                    self.close_exceptionally(error).await;
                }
            }
            state => {
                warn!("{} submit in unexpected state {:?}", self.endpoint, state);
            }
        }
    }

    async fn request_context(&mut self) {
        let request = RntbdContextRequest::new(
            Uuid::new_v4(),
            self.config.client_version.clone(),
            self.config.user_agent.clone(),
        );
        debug!("{} requesting RNTBD context", self.endpoint);
        match request.encode_bytes() {
            Ok(bytes) => match self.write(bytes).await {
                Ok(()) => self.state = ConnectionState::ContextRequested,
                Err(error) => self.close_exceptionally(error).await,
            },
            Err(error) => self.close_exceptionally(error.into()).await,
        }
    }

    fn pend_write(&mut self, transport_request_id: u64, bytes: Bytes) {
        trace!(
            "{} pending write for request {} behind context negotiation",
            self.endpoint,
            transport_request_id
        );
        self.pending_writes.push(PendingWrite {
            transport_request_id,
            bytes,
        });
    }

    async fn write(&mut self, bytes: Bytes) -> ConnectionResult<()> {
        match &self.writer {
            Some(writer) => Ok(writer.send(bytes).await?),
            None => Err(ConnectionError::Error(
                "connection writer is closed".to_owned(),
            )),
        }
    }

    async fn on_message(&mut self, message: RntbdMessage) {
        match message {
            RntbdMessage::Context(context) => {
                if self.state != ConnectionState::ContextRequested {
                    if matches!(
                        self.state,
                        ConnectionState::ClosingExceptionally | ConnectionState::Closed
                    ) {
                        debug!("{} context frame after close; discarding", self.endpoint);
                        return;
                    }
                    self.close_exceptionally(ConnectionError::UnexpectedFrame("context"))
                        .await;
                    return;
                }
                debug!(
                    "{} RNTBD context established: agent={} version={}",
                    self.endpoint,
                    context.server_agent(),
                    context.server_version()
                );
                self.state = ConnectionState::ContextEstablished;
                self.shared.context_established.store(true, Ordering::Relaxed);
                let writes: Vec<PendingWrite> = self.pending_writes.drain(..).collect();
                for write in writes {
                    trace!(
                        "{} flushing pended request {}",
                        self.endpoint,
                        write.transport_request_id
                    );
                    if let Err(error) = self.write(write.bytes).await {
                        self.close_exceptionally(error).await;
                        return;
                    }
                }
            }
            RntbdMessage::ContextError(exception) => {
                warn!("{} RNTBD context refused: {}", self.endpoint, exception);
                self.close_exceptionally(ConnectionError::ContextFailed(exception))
                    .await;
            }
            RntbdMessage::Response(response) => self.message_received(response),
        }
    }

    /// Completes the pending record addressed by the response's
    /// transport request id.
    fn message_received(&mut self, mut response: RntbdResponse) {
        let transport_request_id = response.transport_request_id();
        let Some(mut record) = self.pending_requests.remove(&transport_request_id) else {
            warn!(
                "{} response ignored because there is no matching pending request: {}",
                self.endpoint, transport_request_id
            );
            return;
        };
        self.sync_pending_count();

        let status = response.status();
        if (200..300).contains(&status) {
            record.complete(StoreResponse::from(response));
        } else {
            let error = map_to_service_error(&mut response);
            record.complete_exceptionally(error.into());
        }
    }

    fn expire(&mut self, transport_request_id: u64) {
        // The timer raced a completion and lost; dropped ids no-op.
        let Some(mut record) = self.pending_requests.remove(&transport_request_id) else {
            return;
        };
        self.sync_pending_count();
        warn!(
            "{} request {} expired before a response arrived",
            self.endpoint, transport_request_id
        );
        record.expire();
    }

    fn on_idle_timeout(&mut self) {
        self.last_idle_check = Instant::now();
        if self.health_check_inflight
            || matches!(
                self.state,
                ConnectionState::ClosingExceptionally | ConnectionState::Closed
            )
        {
            return;
        }
        trace!("{} idle; probing channel health", self.endpoint);
        self.health_check_inflight = true;
        let checker = self.shared.health_checker.clone();
        let timestamps = self.shared.timestamps.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let healthy = checker.is_healthy(&timestamps).await;
            let _ = events.send(Event::HealthResult(healthy)).await;
        });
    }

    async fn on_inactive(&mut self, event: ClosedEvent) {
        if matches!(
            self.state,
            ConnectionState::ClosingExceptionally | ConnectionState::Closed
        ) {
            debug!("{} {} after exceptional close", self.endpoint, event);
            self.state = ConnectionState::Closed;
            return;
        }
        self.close_event = Some(event);
        self.close_exceptionally(ConnectionError::ChannelClosed(event)).await;
        self.state = ConnectionState::Closed;
    }

    /// The one-way fatal transition: fail the coalesced writes, fail
    /// every pending record with a synthetic `Gone` carrying the cause,
    /// and close the transport (graceful outbound shutdown first).
    async fn close_exceptionally(&mut self, cause: ConnectionError) {
        if matches!(
            self.state,
            ConnectionState::ClosingExceptionally | ConnectionState::Closed
        ) {
            warn!("{} already closing: {}", self.endpoint, cause);
            return;
        }

        let phrase = match (&cause, self.state) {
            (ConnectionError::ContextFailed(_), _) => "context request read failed",
            (
                ConnectionError::IoError(_) | ConnectionError::SendError(_),
                ConnectionState::ContextRequested,
            ) => "context request write failed",
            _ => "closed exceptionally",
        };

        self.state = ConnectionState::ClosingExceptionally;
        self.shared.closed.store(true, Ordering::Relaxed);

        let abandoned = self.pending_writes.drain(..).count();
        if abandoned > 0 {
            debug!("{} released {} coalesced writes", self.endpoint, abandoned);
        }

        let count = self.pending_requests.len();
        if count > 0 {
            let message = format!("{} {} with {} pending requests", self.endpoint, phrase, count);
            warn!("{}: {}", message, cause);
            let cause = Arc::new(cause);
            for (_, mut record) in self.pending_requests.drain() {
                let error = ServiceError::gone(
                    message.clone(),
                    cause.clone(),
                    record.args().physical_address(),
                    record.args().headers_map(),
                );
                record.complete_exceptionally(error.into());
            }
        } else {
            warn!("{} {}: {}", self.endpoint, phrase, cause);
        }
        self.sync_pending_count();

        // Dropping the writer lets the sender task drain, then shut the
        // outbound half down gracefully before the transport closes.
        self.writer.take();
    }

    fn idle_deadline(&self) -> Option<Instant> {
        let idle = self.config.idle_timeout?;
        let last_read = self.shared.timestamps.last_read_completed();
        Some(last_read.max(self.last_idle_check) + idle)
    }

    fn sync_pending_count(&self) {
        self.shared
            .pending_count
            .store(self.pending_requests.len(), Ordering::Relaxed);
    }
}

async fn idle_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Maps a non-success response to its typed error, pulling the LSN,
/// sub-status and partition key range id headers along.
fn map_to_service_error(response: &mut RntbdResponse) -> ServiceError {
    use crate::errors::ServiceErrorKind;

    let status = response.status();
    let sub_status = response.sub_status();
    let error_body = match response.payload() {
        Some(payload) => crate::errors::ErrorBody::from_payload(status, payload),
        None => crate::errors::ErrorBody::from_status(status),
    };
    ServiceError {
        kind: ServiceErrorKind::from_status(status, sub_status),
        status,
        sub_status,
        lsn: response.lsn(),
        partition_key_range_id: response.partition_key_range_id(),
        headers: response.headers_map(),
        error_body,
        cause: None,
    }
}

/// Writes outbound frames in submission order, batching flushes the way
/// frames arrive.
struct FrameSender;

impl FrameSender {
    fn spawn<W>(
        write: WriteHalf<W>,
        receiver: Receiver<Bytes>,
        events: Sender<Event>,
        timestamps: Arc<Timestamps>,
        buffer_size: usize,
    ) -> JoinHandle<()>
    where
        W: AsyncWrite + Send + 'static,
    {
        tokio::spawn(async move {
            Self::run(write, receiver, events, timestamps, buffer_size).await;
            debug!("FrameSender stopped");
        })
    }

    async fn run<W>(
        mut write: WriteHalf<W>,
        receiver: Receiver<Bytes>,
        events: Sender<Event>,
        timestamps: Arc<Timestamps>,
        buffer_size: usize,
    ) where
        W: AsyncWrite + Send + 'static,
    {
        debug!("Starting FrameSender");
        let mut batches = ReceiverStream::new(receiver).ready_chunks(buffer_size);
        while let Some(batch) = batches.next().await {
            for bytes in batch {
                timestamps.channel_write_attempted();
                if let Err(err) = write.write_all(&bytes).await {
                    error!("Failed to write frame: {}", err);
                    let _ = events.send(Event::WriteFailed(err.into())).await;
                    return;
                }
                timestamps.channel_write_completed();
            }
            if let Err(err) = write.flush().await {
                error!("Failed to flush frames: {}", err);
                let _ = events.send(Event::WriteFailed(err.into())).await;
                return;
            }
        }
        // Queue closed: graceful outbound close precedes transport
        // close, which covers the TLS close_notify requirement.
        if let Err(err) = write.shutdown().await {
            debug!("Outbound shutdown failed: {}", err);
        }
    }
}

/// Reads inbound bytes through the message decoder and forwards every
/// decoded message to the manager task.
struct FrameReceiver;

impl FrameReceiver {
    fn spawn<R>(
        framed_read: FramedRead<ReadHalf<R>, RntbdMessageDecoder>,
        events: Sender<Event>,
        timestamps: Arc<Timestamps>,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Send + 'static,
    {
        tokio::spawn(async move {
            Self::run(framed_read, events, timestamps).await;
            debug!("FrameReceiver stopped");
        })
    }

    async fn run<R>(
        mut framed_read: FramedRead<ReadHalf<R>, RntbdMessageDecoder>,
        events: Sender<Event>,
        timestamps: Arc<Timestamps>,
    ) where
        R: AsyncRead + Send + 'static,
    {
        debug!("Starting FrameReceiver");
        while let Some(message) = framed_read.next().await {
            timestamps.channel_read_completed();
            let fatal = message.is_err();
            if events.send(Event::Inbound(message)).await.is_err() {
                return;
            }
            if fatal {
                return;
            }
        }
        let _ = events.send(Event::InboundClosed).await;
    }
}
