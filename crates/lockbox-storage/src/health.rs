//! Object store reachability check

use lockbox_core::{VaultError, VaultResult};
use opendal::Operator;
use std::time::{Duration, Instant};
use tracing::debug;

/// List the store root once and report the round-trip time.
pub async fn ping(op: &Operator) -> VaultResult<Duration> {
    let started = Instant::now();
    op.list("/")
        .await
        .map_err(|e| VaultError::Storage(format!("object store unreachable: {e}")))?;
    let elapsed = started.elapsed();
    debug!(?elapsed, "object store ping");
    Ok(elapsed)
}
