use async_nats::{Client, ConnectError, ConnectOptions, Event};

/// Connect to NATS with the given connection name.
///
/// The name shows up in broker monitoring and logs, so every variant of
/// this family requires one.
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = courier_nats::connect("nats://localhost:4222", "billing").await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect(
    url: impl async_nats::ToServerAddrs,
    name: &str,
) -> Result<Client, ConnectError> {
    connect_with_options(url, name, ConnectOptions::new()).await
}

/// Connect to NATS with custom options.
///
/// Provides full control over connection configuration including
/// authentication and reconnect behavior. The connection name and the
/// lifecycle logging callback are applied on top of the supplied options.
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = courier_nats::connect_with_options(
///     "nats://localhost:4222",
///     "billing",
///     async_nats::ConnectOptions::new().require_tls(true),
/// ).await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect_with_options(
    url: impl async_nats::ToServerAddrs,
    name: &str,
    options: ConnectOptions,
) -> Result<Client, ConnectError> {
    options
        .name(name)
        .event_callback(|event| async move {
            match event {
                Event::Connected => tracing::info!("nats client connected"),
                Event::Disconnected => tracing::warn!("nats client disconnected"),
                other => tracing::info!("nats client event: {other}"),
            }
        })
        .connect(url)
        .await
}

/// Connect to NATS with username and password.
pub async fn connect_with_user_pass(
    url: impl async_nats::ToServerAddrs,
    name: &str,
    user: impl Into<String>,
    password: impl Into<String>,
) -> Result<Client, ConnectError> {
    connect_with_options(
        url,
        name,
        ConnectOptions::with_user_and_password(user.into(), password.into()),
    )
    .await
}

/// Connect to NATS with a credentials file.
///
/// Authenticates using a `.creds` file containing JWT and NKey seed.
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = courier_nats::connect_with_credentials(
///     "nats://connect.ngs.global",
///     "billing",
///     "path/to/my.creds",
/// ).await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect_with_credentials(
    url: impl async_nats::ToServerAddrs,
    name: &str,
    creds_path: impl AsRef<std::path::Path>,
) -> Result<Client, ConnectError> {
    let options = ConnectOptions::with_credentials_file(creds_path.as_ref()).await?;
    connect_with_options(url, name, options).await
}
