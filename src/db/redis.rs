/*!
 * Redis Connection
 *
 * Provides the shared Redis connection manager used by the structured-input
 * cache, the AI job queue, and the job event bus. TLS is selected by the URL
 * scheme (`rediss://` connects over TLS).
 */

use crate::config::RedisConfig;
use redis::aio::ConnectionManager;
use redis::Client;

/// Create a Redis client and a managed multiplexed connection
///
/// The ConnectionManager reconnects on failure, so cache and queue callers
/// can clone it freely. Pub/sub subscribers need their own dedicated
/// connection and use the returned client instead.
pub async fn create_redis(config: &RedisConfig) -> anyhow::Result<(Client, ConnectionManager)> {
    if config.url.starts_with("rediss://") {
        tracing::info!("Connecting to Redis over TLS");
    }

    let client = Client::open(config.url.as_str())?;
    let manager = ConnectionManager::new(client.clone()).await?;

    // Probe the connection so a bad URL fails the boot
    let mut conn = manager.clone();
    redis::cmd("PING").query_async::<String>(&mut conn).await?;
    tracing::info!("Redis connection test successful");

    Ok((client, manager))
}
