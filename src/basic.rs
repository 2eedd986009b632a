use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use async_nats::connection::State;
use async_nats::{Client, Message};
use bytes::Bytes;
use futures::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;

use crate::codec::{Codec, JsonCodec};
use crate::error::{classify, report, Error};

/// How long [`BasicClient::request`] waits for a reply unless overridden
/// with [`BasicClient::with_request_timeout`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10);

/// Core NATS messaging: fire-and-forget publish, timed request/reply and
/// plain subscriptions.
///
/// Delivery is at-most-once with no acknowledgement or redelivery; for
/// durable semantics use [`StreamClient`](crate::StreamClient).
pub struct BasicClient<C = JsonCodec> {
    client: Client,
    request_timeout: Duration,
    _codec: PhantomData<C>,
}

impl<C> fmt::Debug for BasicClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicClient")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl<C> Clone for BasicClient<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            request_timeout: self.request_timeout,
            _codec: PhantomData,
        }
    }
}

impl BasicClient {
    /// Wraps an established connection, using the default JSON codec.
    pub fn new(client: Client) -> Self {
        Self::with_codec(client)
    }
}

impl<C> BasicClient<C>
where
    C: Codec<Compact = Vec<u8>>,
{
    /// Like [`new`](BasicClient::new), with an explicit codec:
    /// `BasicClient::<MyCodec>::with_codec(client)`.
    pub fn with_codec(client: Client) -> Self {
        Self {
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            _codec: PhantomData,
        }
    }

    /// Overrides the reply timeout used by [`request`](Self::request).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The underlying connection, for direct access when needed.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn check_connection(&self, location: &'static str) -> Result<(), Error> {
        if self.client.connection_state() == State::Disconnected {
            return Err(report(location, Error::Connection));
        }
        Ok(())
    }

    /// Publishes `data` to `subject` with no delivery guarantee beyond the
    /// transport's own.
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

        self.client
            .publish(subject.to_string(), Bytes::from(payload))
            .await
            .map_err(|e| classify("publish", e))
    }

    /// Sends a request to `subject` and waits for a single reply.
    ///
    /// Suspends the caller until the reply arrives or the configured timeout
    /// elapses, whichever comes first. Concurrent operations on the same
    /// client are unaffected.
    pub async fn request<T, R>(&self, subject: &str, data: &T) -> Result<R, Error>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        self.check_connection("request")?;

        let payload = C::encode(data).map_err(|e| {
            report(
                "request",
                Error::Serialization {
                    source: Box::new(e),
                },
            )
        })?;

        let request = self
            .client
            .request(subject.to_string(), Bytes::from(payload));
        let reply = match tokio::time::timeout(self.request_timeout, request).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => return Err(classify("request", err)),
            Err(_) => {
                return Err(report(
                    "request",
                    Error::RequestTimeout {
                        subject: subject.to_string(),
                        timeout: self.request_timeout,
                    },
                ))
            }
        };

        C::decode(reply.payload.to_vec()).map_err(|e| {
            report(
                "request",
                Error::Deserialization {
                    source: Box::new(e),
                },
            )
        })
    }

    /// Registers `handler` for every message matching `subject`.
    ///
    /// The handler runs on a detached task, concurrently with the caller and
    /// with any other registered handlers. Messages are delivered at most
    /// once; there is no acknowledgement and no redelivery.
    pub async fn subscribe<F, Fut>(
        &self,
        subject: &str,
        mut handler: F,
    ) -> Result<SubscriptionHandle, Error>
    where
        F: FnMut(Message) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.check_connection("subscribe")?;

        let mut subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| classify("subscribe", e))?;

        let task = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                handler(message).await;
            }
        });

        Ok(SubscriptionHandle { task })
    }
}

/// Handle over a subscription's delivery loop.
///
/// Dropping the handle leaves the loop running; call
/// [`stop`](SubscriptionHandle::stop) to end it, which also unsubscribes
/// from the broker.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// Aborts the delivery loop and drops the broker subscription.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Whether the delivery loop is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}
