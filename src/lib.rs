#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub
)]
//! A convenience layer over NATS with two tiers.
//!
//! - [`BasicClient`]: core NATS. Fire-and-forget publish, timed
//!   request/reply, plain subscriptions. At-most-once, no broker-side state.
//! - [`StreamClient`]: JetStream. Durable streams and acknowledging pull
//!   consumers with redelivery backoff, delivery caps and durable naming.
//!
//! Payloads are JSON by default; both clients are generic over a [`Codec`]
//! so the wire representation can be swapped without touching call sites.
//!
//! Durable publish/consume
//! ```rust,no_run
//! use courier_nats::{connect, StreamClient, with_durable_name};
//! use async_nats::jetstream::stream;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Deserialize, Serialize)]
//! struct Signup { user: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = connect("nats://localhost:4222", "signup-service").await?;
//!     let js = StreamClient::new(client).await?;
//!
//!     js.stream_create_or_update(stream::Config {
//!         name: "AUTH".to_string(),
//!         subjects: vec!["auth.>".to_string()],
//!         ..Default::default()
//!     })
//!     .await?;
//!
//!     js.publish("auth.user.signup", &Signup { user: "masko".into() }).await?;
//!
//!     let consumer = js
//!         .consume(
//!             "AUTH",
//!             "auth.user.signup",
//!             |msg| async move {
//!                 println!("delivered: {:?}", msg.payload);
//!                 msg.ack().await.ok();
//!             },
//!             [with_durable_name("notifier")],
//!         )
//!         .await?;
//!
//!     // ... later: stop the delivery loop (the durable consumer survives).
//!     consumer.stop();
//!     Ok(())
//! }
//! ```
//!
//! Request/reply over core NATS
//! ```rust,no_run
//! use courier_nats::{connect, BasicClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = connect("nats://localhost:4222", "gateway").await?;
//!     let basic = BasicClient::new(client).with_request_timeout(Duration::from_millis(250));
//!
//!     let reply: String = basic.request("time.now", &()).await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

mod basic;
mod codec;
mod connect;
mod error;
mod stream;

pub use async_nats::{Client, ConnectError, ConnectOptions};

pub use basic::{BasicClient, SubscriptionHandle, DEFAULT_REQUEST_TIMEOUT};
pub use codec::{Codec, JsonCodec};
pub use connect::{
    connect, connect_with_credentials, connect_with_options, connect_with_user_pass,
};
pub use error::Error;
pub use stream::{
    with_ack_wait, with_backoff, with_durable_name, with_max_deliver, ConsumerHandle,
    ConsumerOption, StreamClient, DEFAULT_ACK_WAIT, DEFAULT_BACKOFF, DEFAULT_MAX_DELIVER,
};
