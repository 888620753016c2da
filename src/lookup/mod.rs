// PCAP Funnel - External Lookups
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Best-effort IP enrichment from external services.
//!
//! Lookups never fail from the caller's point of view: any transport or parse
//! problem yields an empty map. Every lookup is tied to a
//! [`CancellationToken`] so a view that goes away can drop results that
//! arrive late.

mod country_codes;
mod geo;
mod hostname;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

pub use country_codes::iso2_to_iso3;
pub use geo::{parse_locations, GeoClient, IpLocation, LocationRecord};
pub use hostname::{parse_hostnames, HostnameClient, DEFAULT_HOSTNAME_URL};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation flag shared between a view and its lookups.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<CancelState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every clone of this token. Idempotent.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Run `future` unless `token` is cancelled first.
///
/// Returns `None` if the token was cancelled before the future started, while
/// it ran, or by the time it completed.
pub async fn run_cancellable<F>(token: &CancellationToken, future: F) -> Option<F::Output>
where
    F: Future,
{
    if token.is_cancelled() {
        return None;
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = future => {
            if token.is_cancelled() {
                None
            } else {
                Some(output)
            }
        }
    }
}
