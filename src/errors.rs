//! Error taxonomy shared by the engine, admin jobs and scheduler.
//!
//! This mirrors the exception hierarchy of the original Python provider
//! (`ProviderException` / `UsageLimitException`), but expressed as a closed
//! set of result variants so callers can decide cache TTLs and retry policy
//! without catching exceptions.

use thiserror::Error;

/// Every error the core can produce, tagged by how a caller should react.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An adapter supplied bad data: a missing mandatory field, an
    /// out-of-range coordinate, a malformed `url` map, and so on.
    ///
    /// Surfaced to the adapter; the adapter logs at `WARN` and continues
    /// with the next station.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A network deadline (connect or read) was hit talking to an upstream
    /// service. Never cached; the scheduler's next interval acts as the
    /// retry.
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// An external API (Google geocoding/elevation) signalled quota
    /// exhaustion. Cached with a short TTL so repeated calls fail fast
    /// until the TTL expires.
    #[error("usage limit exceeded: {0}")]
    UsageLimit(String),

    /// Any other upstream failure. Cached with a long TTL to avoid
    /// hammering a broken endpoint.
    #[error("upstream error: {0}")]
    UpstreamError(String),

    /// A station store or cache backend call failed (MongoDB, Redis, or the
    /// connection pool in front of either). Not caught here; the scheduler
    /// records a misfire and retries at the next cadence.
    #[error("storage error: {0}")]
    TransientStorage(String),

    /// Configuration errors at startup. Terminate the process with a
    /// non-zero exit.
    #[error("fatal configuration error: {0}")]
    Fatal(String),
}

impl From<mongodb::error::Error> for EngineError {
    fn from(err: mongodb::error::Error) -> Self {
        EngineError::TransientStorage(err.to_string())
    }
}

impl From<redis::RedisError> for EngineError {
    fn from(err: redis::RedisError) -> Self {
        EngineError::TransientStorage(err.to_string())
    }
}

impl From<bb8::RunError<redis::RedisError>> for EngineError {
    fn from(err: bb8::RunError<redis::RedisError>) -> Self {
        EngineError::TransientStorage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// True for errors that should never be retried within the same
    /// adapter invocation (configuration problems, not transient hiccups).
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Fatal(_))
    }
}

/// Log-and-swallow an `EngineError` at station granularity, per §5/§7: one
/// bad station must never abort the rest of an adapter's run.
///
/// Returns `Ok(())` for everything except `Fatal`, which is re-raised so the
/// scheduler can shut the process down instead of silently limping along
/// with broken configuration.
pub fn swallow_station_error(
    provider_code: &str,
    station_ref: &str,
    err: EngineError,
) -> Result<()> {
    if err.is_fatal() {
        return Err(err);
    }
    tracing::warn!(provider = provider_code, station = station_ref, error = %err, "station failed, continuing");
    Ok(())
}

/// Display an anyhow error plus its chain of causes and a backtrace, for use
/// at the top of `main`.
pub fn display_causes_and_backtrace(err: &anyhow::Error) {
    eprintln!("Error: {}", err);
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {}", cause);
    }
    eprintln!("{}", err.backtrace());
}
