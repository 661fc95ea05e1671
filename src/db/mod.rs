/*!
 * Database Module
 *
 * Postgres pool management, tenant binding for row-level security, and the
 * Redis connection used by the cache, queue, and event bus.
 */

pub mod pool;
pub mod redis;

pub use pool::{bind_auth_flow, bind_clinic, create_pool};
pub use redis::create_redis;
