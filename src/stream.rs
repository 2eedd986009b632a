use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use async_nats::connection::State;
use async_nats::jetstream::consumer::pull;
use async_nats::jetstream::{self, stream};
use async_nats::Client;
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::codec::{Codec, JsonCodec};
use crate::error::{classify, report, Error};

/// Redelivery delays applied to consumers unless overridden with
/// [`with_backoff`]: the first redelivery happens 5s after a missed
/// acknowledgement, the second 10s after that.
pub const DEFAULT_BACKOFF: [Duration; 2] = [Duration::from_secs(5), Duration::from_secs(10)];

/// Delivery attempts per message (first delivery included) before the
/// broker stops redelivering.
pub const DEFAULT_MAX_DELIVER: i64 = 4;

/// How long the broker waits for an acknowledgement before a message
/// becomes eligible for redelivery.
pub const DEFAULT_ACK_WAIT: Duration = Duration::from_secs(30);

/// JetStream messaging: durable streams, ack-awaited publish and
/// acknowledging pull consumers with bounded, backed-off redelivery.
///
/// The JetStream context is derived once at construction and reused for
/// every operation; the client is cheap to clone and safe to share.
pub struct StreamClient<C = JsonCodec> {
    client: Client,
    context: jetstream::Context,
    _codec: PhantomData<C>,
}

impl<C> fmt::Debug for StreamClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient").finish()
    }
}

impl<C> Clone for StreamClient<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            context: self.context.clone(),
            _codec: PhantomData,
        }
    }
}

impl StreamClient {
    /// Derives a JetStream context from an established connection, using
    /// the default JSON codec.
    ///
    /// Probes the JetStream account so a broker running without the
    /// feature is caught here, as [`Error::JetStreamUnavailable`], rather
    /// than on the first publish.
    pub async fn new(client: Client) -> Result<Self, Error> {
        Self::with_codec(client).await
    }
}

impl<C> StreamClient<C>
where
    C: Codec<Compact = Vec<u8>>,
{
    /// Like [`new`](StreamClient::new), with an explicit codec:
    /// `StreamClient::<MyCodec>::with_codec(client)`.
    pub async fn with_codec(client: Client) -> Result<Self, Error> {
        if client.connection_state() == State::Disconnected {
            return Err(report("context create", Error::Connection));
        }

        let context = jetstream::new(client.clone());
        context
            .query_account()
            .await
            .map_err(|e| classify("context create", e))?;

        Ok(Self {
            client,
            context,
            _codec: PhantomData,
        })
    }

    /// The underlying JetStream context, for direct access to APIs this
    /// client does not wrap.
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.context
    }

    /// The underlying connection.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn check_connection(&self, location: &'static str) -> Result<(), Error> {
        if self.client.connection_state() == State::Disconnected {
            return Err(report(location, Error::Connection));
        }
        Ok(())
    }

    /// Declares a stream idempotently: creates it if the name is new,
    /// otherwise updates the existing stream's mutable fields (subjects
    /// included) to match `config`.
    ///
    /// The resulting broker-side state is visible to every client
    /// immediately after this returns.
    pub async fn stream_create_or_update(&self, config: stream::Config) -> Result<(), Error> {
        self.check_connection("stream create update")?;

        let exists = self.context.get_stream(&config.name).await.is_ok();
        if exists {
            self.context
                .update_stream(&config)
                .await
                .map_err(|e| classify("stream create update", e))?;
        } else {
            self.context
                .create_stream(config.clone())
                .await
                .map_err(|e| classify("stream create update", e))?;
        }

        tracing::info!(stream = %config.name, "stream ready");
        Ok(())
    }

    /// Deletes a stream and all messages it holds.
    pub async fn delete_stream(&self, name: &str) -> Result<(), Error> {
        self.check_connection("stream delete")?;

        self.context
            .delete_stream(name)
            .await
            .map_err(|e| classify("stream delete", e))?;
        Ok(())
    }

    /// Looks up a stream handle by name.
    pub async fn get_stream(&self, name: &str) -> Result<stream::Stream, Error> {
        self.check_connection("stream get")?;

        self.context
            .get_stream(name)
            .await
            .map_err(|e| classify("stream get", e))
    }

    /// Publishes `data` into the stream covering `subject` and waits for
    /// the broker's acknowledgement.
    ///
    /// Unlike [`BasicClient::publish`](crate::BasicClient::publish), a
    /// subject no stream accepts is an error here, not a silent drop.
    pub async fn publish<T: Serialize>(&self, subject: &str, data: &T) -> Result<(), Error> {
        self.check_connection("publish")?;

        let payload = C::encode(data).map_err(|e| {
            report(
                "publish",
                Error::Serialization {
                    source: Box::new(e),
                },
            )
        })?;

        self.context
            .publish(subject.to_string(), Bytes::from(payload))
            .await
            .map_err(|e| classify("publish", e))?
            .await
            .map_err(|e| classify("publish", e))?;
        Ok(())
    }

    /// Creates or resumes a consumer on `stream_name` and starts its
    /// delivery loop.
    ///
    /// The consumer starts from the baseline configuration (explicit
    /// acknowledgement, `filter_subject` set to `subject`, redelivery per
    /// [`DEFAULT_BACKOFF`] capped at [`DEFAULT_MAX_DELIVER`] attempts),
    /// with `options` applied on top in call order. Later options win per
    /// field.
    ///
    /// `handler` is invoked once per delivered message on a detached task
    /// and owns acknowledgement: a message that is not acked within the
    /// ack-wait window is redelivered per the backoff schedule until the
    /// delivery cap is reached. Handler outcomes are not reported back to
    /// this call; the returned [`ConsumerHandle`] only controls the loop.
    pub async fn consume<F, Fut>(
        &self,
        stream_name: &str,
        subject: &str,
        mut handler: F,
        options: impl IntoIterator<Item = ConsumerOption>,
    ) -> Result<ConsumerHandle, Error>
    where
        F: FnMut(jetstream::Message) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.check_connection("consume")?;

        let mut config = baseline_consumer_config(subject);
        for option in options {
            option.apply(&mut config);
        }

        let stream = self
            .context
            .get_stream(stream_name)
            .await
            .map_err(|e| classify("consume", e))?;
        let consumer = stream
            .create_consumer(config)
            .await
            .map_err(|e| classify("consume", e))?;
        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| classify("consume", e))?;

        let task = tokio::spawn(async move {
            while let Some(delivery) = messages.next().await {
                match delivery {
                    Ok(message) => handler(message).await,
                    Err(err) => tracing::error!(error = %err, "consume: delivery loop error"),
                }
            }
        });

        Ok(ConsumerHandle { task })
    }
}

/// The configuration every consumer starts from. `options` passed to
/// [`StreamClient::consume`] mutate a copy of this.
fn baseline_consumer_config(subject: &str) -> pull::Config {
    pull::Config {
        ack_policy: jetstream::consumer::AckPolicy::Explicit,
        filter_subject: subject.to_string(),
        ack_wait: DEFAULT_ACK_WAIT,
        backoff: DEFAULT_BACKOFF.to_vec(),
        max_deliver: DEFAULT_MAX_DELIVER,
        ..Default::default()
    }
}

/// A named mutation of the consumer configuration.
///
/// Options are applied strictly in the order supplied, with no reordering
/// or deduplication. Conflicting options are allowed and the last one
/// touching a field wins.
pub struct ConsumerOption(Box<dyn FnOnce(&mut pull::Config) + Send + 'static>);

impl fmt::Debug for ConsumerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConsumerOption")
    }
}

impl ConsumerOption {
    /// Wraps an arbitrary configuration mutation. The provided options
    /// below cover the common fields; this is the escape hatch for the
    /// rest.
    pub fn new(apply: impl FnOnce(&mut pull::Config) + Send + 'static) -> Self {
        Self(Box::new(apply))
    }

    fn apply(self, config: &mut pull::Config) {
        (self.0)(config)
    }
}

/// Names the consumer durably so its position survives client disconnects
/// and can be resumed under the same name. Without it the consumer is
/// ephemeral to the session.
pub fn with_durable_name(name: impl Into<String>) -> ConsumerOption {
    let name = name.into();
    ConsumerOption::new(move |config| {
        config.durable_name = Some(name);
    })
}

/// Replaces the redelivery backoff schedule: entry `i` is the delay before
/// the `(i + 1)`-th redelivery.
pub fn with_backoff(delays: impl Into<Vec<Duration>>) -> ConsumerOption {
    let delays = delays.into();
    ConsumerOption::new(move |config| {
        config.backoff = delays;
    })
}

/// Caps total delivery attempts per message, first delivery included.
pub fn with_max_deliver(limit: i64) -> ConsumerOption {
    ConsumerOption::new(move |config| {
        config.max_deliver = limit;
    })
}

/// Sets how long the broker waits for an acknowledgement before scheduling
/// a redelivery.
pub fn with_ack_wait(wait: Duration) -> ConsumerOption {
    ConsumerOption::new(move |config| {
        config.ack_wait = wait;
    })
}

/// Handle over a consumer's delivery loop.
///
/// Dropping the handle leaves the loop running. [`stop`](Self::stop) ends
/// the loop only; broker-side consumer state (a durable name, pending
/// messages) is untouched, so a durable consumer resumes where it left off.
#[derive(Debug)]
pub struct ConsumerHandle {
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Aborts the delivery loop.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Whether the delivery loop is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_nats::jetstream::consumer::AckPolicy;

    #[test]
    fn baseline_is_explicit_ack_with_bounded_redelivery() {
        let config = baseline_consumer_config("orders.>");

        assert!(matches!(config.ack_policy, AckPolicy::Explicit));
        assert_eq!(config.filter_subject, "orders.>");
        assert_eq!(config.backoff, DEFAULT_BACKOFF.to_vec());
        assert_eq!(config.max_deliver, DEFAULT_MAX_DELIVER);
        assert_eq!(config.ack_wait, DEFAULT_ACK_WAIT);
        assert!(config.durable_name.is_none());
    }

    #[test]
    fn durable_name_leaves_other_fields_at_baseline() {
        let mut config = baseline_consumer_config("orders.created");
        with_durable_name("billing").apply(&mut config);

        assert_eq!(config.durable_name.as_deref(), Some("billing"));
        assert_eq!(config.max_deliver, DEFAULT_MAX_DELIVER);
        assert_eq!(config.backoff, DEFAULT_BACKOFF.to_vec());
        assert_eq!(config.filter_subject, "orders.created");
    }

    #[test]
    fn later_options_win_per_field() {
        let mut config = baseline_consumer_config("orders.created");
        for option in [with_durable_name("a"), with_durable_name("b")] {
            option.apply(&mut config);
        }

        assert_eq!(config.durable_name.as_deref(), Some("b"));
    }

    #[test]
    fn options_override_baseline_fields_independently() {
        let mut config = baseline_consumer_config("orders.created");
        let schedule = vec![Duration::from_secs(1), Duration::from_secs(2)];
        for option in [
            with_backoff(schedule.clone()),
            with_max_deliver(7),
            with_ack_wait(Duration::from_secs(5)),
        ] {
            option.apply(&mut config);
        }

        assert_eq!(config.backoff, schedule);
        assert_eq!(config.max_deliver, 7);
        assert_eq!(config.ack_wait, Duration::from_secs(5));
        // the advertised filter is fixed before options run
        assert_eq!(config.filter_subject, "orders.created");
    }

    #[test]
    fn escape_hatch_can_still_change_the_filter() {
        let mut config = baseline_consumer_config("orders.created");
        ConsumerOption::new(|c| c.filter_subject = "orders.updated".to_string())
            .apply(&mut config);

        assert_eq!(config.filter_subject, "orders.updated");
    }
}
