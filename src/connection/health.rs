use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Millisecond offsets (from the connection's start) of the channel's
/// most recent I/O milestones, maintained by the I/O tasks and read by
/// health checks.
#[derive(Debug)]
pub struct Timestamps {
    base: Instant,
    write_attempted: AtomicU64,
    write_completed: AtomicU64,
    read_completed: AtomicU64,
}

impl Timestamps {
    pub fn new() -> Timestamps {
        Timestamps {
            base: Instant::now(),
            write_attempted: AtomicU64::new(0),
            write_completed: AtomicU64::new(0),
            read_completed: AtomicU64::new(0),
        }
    }

    fn offset(&self) -> u64 {
        self.base.elapsed().as_millis() as u64
    }

    pub fn channel_write_attempted(&self) {
        self.write_attempted.store(self.offset(), Ordering::Relaxed);
    }

    pub fn channel_write_completed(&self) {
        self.write_completed.store(self.offset(), Ordering::Relaxed);
    }

    pub fn channel_read_completed(&self) {
        self.read_completed.store(self.offset(), Ordering::Relaxed);
    }

    pub fn last_write_attempted(&self) -> Instant {
        self.base + Duration::from_millis(self.write_attempted.load(Ordering::Relaxed))
    }

    pub fn last_write_completed(&self) -> Instant {
        self.base + Duration::from_millis(self.write_completed.load(Ordering::Relaxed))
    }

    pub fn last_read_completed(&self) -> Instant {
        self.base + Duration::from_millis(self.read_completed.load(Ordering::Relaxed))
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Timestamps::new()
    }
}

/// Liveness probe run when a connection has been idle too long. An
/// unhealthy verdict is fatal to the connection.
#[async_trait]
pub trait ChannelHealthChecker: Debug + Send + Sync {
    async fn is_healthy(&self, timestamps: &Timestamps) -> bool;
}

/// Flags a channel whose writes stall or whose reads lag far behind its
/// completed writes.
#[derive(Debug, Clone)]
pub struct DelayHealthChecker {
    write_delay_limit: Duration,
    read_delay_limit: Duration,
}

impl DelayHealthChecker {
    pub fn new(write_delay_limit: Duration, read_delay_limit: Duration) -> DelayHealthChecker {
        DelayHealthChecker {
            write_delay_limit,
            read_delay_limit,
        }
    }
}

impl Default for DelayHealthChecker {
    fn default() -> Self {
        DelayHealthChecker::new(Duration::from_secs(1), Duration::from_secs(10))
    }
}

#[async_trait]
impl ChannelHealthChecker for DelayHealthChecker {
    async fn is_healthy(&self, timestamps: &Timestamps) -> bool {
        let now = Instant::now();
        let write_attempted = timestamps.last_write_attempted();
        let write_completed = timestamps.last_write_completed();
        let read_completed = timestamps.last_read_completed();

        // A write was attempted, did not complete, and has been hanging
        // past the limit.
        if write_attempted > write_completed
            && now.saturating_duration_since(write_attempted) > self.write_delay_limit
        {
            return false;
        }

        // Writes complete but responses stopped arriving.
        if write_completed > read_completed
            && now.saturating_duration_since(read_completed) > self.read_delay_limit
        {
            return false;
        }

        true
    }
}
