//! Adapters: the per-source harvest logic each provider plugs into the
//! engine with (§4.2, §6).
//!
//! Grounded on `winds_mobi_provider`'s provider modules, which all share the
//! same shape: fetch one or more upstream endpoints, turn each row into a
//! `save_station` + `create_measure` + `insert_measures` call, and log past
//! any single bad station rather than aborting the whole run. Two adapters
//! are implemented here as representative samples of the two naming
//! patterns the source shows: [`pioupiou::PioupiouAdapter`] derives its
//! names from reverse geocoding, [`holfuy::HolfuyAdapter`] carries its own
//! fixed names and a multi-language URL map.

pub mod holfuy;
pub mod pioupiou;

use async_trait::async_trait;

use crate::errors::Result;

/// One upstream source, registered with the scheduler under its own
/// provider code (§5: one adapter owns each provider code).
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable short code, used as the first half of every station id and to
    /// key `DISABLE_PROVIDER_<CODE>`.
    fn provider_code(&self) -> &str;

    /// Human-readable name, stored on the provider record.
    fn provider_name(&self) -> &str;

    /// Default polling interval, used when the scheduler registers this
    /// adapter's fixed-interval trigger.
    fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(5 * 60)
    }

    /// Fetch, normalise and submit every station this source currently
    /// reports. Implementations must not let one bad station abort the
    /// rest of the run (`swallow_station_error` is the standard tool).
    async fn run(&self) -> Result<()>;
}

/// All adapters the process knows how to run, gated by
/// [`crate::config::Config::provider_enabled`] at registration time.
pub fn all(engine: &std::sync::Arc<crate::engine::Engine>, http: reqwest::Client) -> Vec<Box<dyn Adapter>> {
    vec![
        Box::new(pioupiou::PioupiouAdapter::new(engine, http.clone())),
        Box::new(holfuy::HolfuyAdapter::new(engine, http)),
    ]
}
