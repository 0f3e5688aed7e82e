//! Client core for RNTBD, the proprietary binary request/response protocol spoken by a distributed document database.
//!
//! ## Overview
//!
//! Parts of the protocol core implemented so far:
//!
//!  * [x] A request/response model,
//!  * [x] Multiplexing multiple requests across the same TCP socket,
//!  * [x] Out-of-order responses correlated by transport request id,
//!  * [x] Typed, tagged key/value header token streams,
//!  * [x] One-shot context negotiation gating all other writes,
//!  * [x] Pre-context write coalescing,
//!  * [x] Per-request deadlines,
//!  * [x] Typed status/sub-status error taxonomy,
//!  * [x] Idle channel health probing,
//!  * [ ] Server-side protocol handling,
//!  * [ ] Retry, routing and session consistency (callers' concern).
//!
//! The goal of the crate is the transport core only: callers submit
//! [`RntbdRequestArgs`](crate::request::RntbdRequestArgs) and await a
//! [`StoreResponse`](crate::request::StoreResponse). Everything above that
//! (query pagination, resource management, signing, partition routing,
//! retry policies) belongs to a higher layer.
//!
//! ## Examples
//! ```no_run
//! use rntbd_protocol::request::RntbdRequestArgs;
//! use rntbd_protocol::frames::{RntbdOperationType, RntbdResourceType};
//! use rntbd_protocol::{Config, RntbdClient, RntbdResult};
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> RntbdResult<()> {
//!     let client = RntbdClient::new(Config::default())?;
//!     let args = RntbdRequestArgs::new(
//!         Uuid::new_v4(),
//!         "rntbd://10.0.0.1:14331/apps/a/services/s/partitions/p/replicas/1/".to_owned(),
//!         "apps/a/services/s/partitions/p/replicas/1/".to_owned(),
//!         RntbdResourceType::Document,
//!         RntbdOperationType::Read,
//!     );
//!     let mut response = client.request("10.0.0.1:14331".parse().unwrap(), args).await?;
//!     println!("status {} lsn {}", response.status(), response.lsn());
//!     Ok(())
//! }
//! ```

#[macro_use]
extern crate derive_builder;

#[macro_use]
extern crate derive_new;

#[macro_use]
extern crate getset;

#[macro_use]
extern crate log;

#[macro_use]
extern crate num_derive;

pub(crate) mod client;
pub(crate) mod config;

/// Connection handle, per-connection request manager and endpoint pools.
pub mod connection;
/// RNTBD errors and the service error taxonomy.
pub mod errors;
/// Wire codec: token types, header catalogs, token streams and frames.
pub mod frames;
/// Request args, the in-flight request record and the store response.
pub mod request;

pub use self::client::RntbdClient;
pub use self::client::RntbdResult;
pub use config::Config;
pub use config::ConfigBuilder;
