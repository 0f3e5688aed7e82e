use core::time::Duration;

/// RNTBD client config.
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Cap on concurrently pending requests per connection.
    #[builder(default = "30")]
    pub(crate) pending_request_limit: usize,
    /// Default per-request deadline; overridable per request.
    #[builder(default = "Duration::from_secs(5)")]
    pub(crate) request_timeout: Duration,
    #[builder(default = "Duration::from_secs(5)")]
    pub(crate) connect_timeout: Duration,
    /// Idle period after which the channel health probe runs. `None`
    /// disables idle probing.
    #[builder(default = "None")]
    pub(crate) idle_timeout: Option<Duration>,
    #[builder(default = "10")]
    pub(crate) max_connections: u32,
    #[builder(default = "Some(Duration::from_secs(60))")]
    pub(crate) lifetime: Option<Duration>,
    #[builder(default = "false")]
    pub(crate) test_connection: bool,
    #[builder(default = "100")]
    pub(crate) frame_buffer_size: usize,
    #[builder(default = "env!(\"CARGO_PKG_VERSION\").to_owned()")]
    pub(crate) client_version: String,
    #[builder(default = "concat!(\"rntbd-protocol/\", env!(\"CARGO_PKG_VERSION\")).to_owned()")]
    pub(crate) user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pending_request_limit: 30,
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            max_connections: 10,
            lifetime: Some(Duration::from_secs(60)),
            test_connection: false,
            frame_buffer_size: 100,
            client_version: env!("CARGO_PKG_VERSION").to_owned(),
            user_agent: concat!("rntbd-protocol/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}
