//! The process-wide `Date` header value.
//!
//! Formatting a date per response is comparatively expensive, so a background thread renders it
//! once per second and publishes it through an [`ArcSwap`]. Readers load the latest snapshot
//! without locking.

use arc_swap::ArcSwap;
use bytes::Bytes;
use once_cell::sync::Lazy;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::warn;

/// Holds the current HTTP date, refreshed in the background.
#[derive(Debug)]
pub struct DateService {
    current: Arc<ArcSwap<Bytes>>,
    refreshing: bool,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(|| DateService::with_refresh_interval(Duration::from_secs(1)));

impl DateService {
    /// The shared instance. The refresh thread starts on first use and lives until process exit.
    pub fn global() -> &'static DateService {
        &DATE_SERVICE
    }

    /// Creates a service refreshing its date every `interval`.
    ///
    /// The refresh thread stops once the service is dropped.
    pub fn with_refresh_interval(interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(render_now()));
        let weak = Arc::downgrade(&current);

        let spawned = thread::Builder::new().name("http-date".into()).spawn(move || refresh_loop(&weak, interval));
        let refreshing = match spawned {
            Ok(_) => true,
            Err(e) => {
                warn!(cause = %e, "failed to spawn the date refresher, dates are rendered per call");
                false
            }
        };

        Self { current, refreshing }
    }

    /// The current date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
    pub fn current(&self) -> Bytes {
        if self.refreshing { Bytes::clone(&self.current.load()) } else { render_now() }
    }

    /// Runs `f` with the current date.
    pub fn with_http_date<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        if self.refreshing {
            let date = self.current.load();
            f(&date)
        } else {
            f(&render_now())
        }
    }
}

fn refresh_loop(current: &Weak<ArcSwap<Bytes>>, interval: Duration) {
    loop {
        thread::sleep(interval);
        let Some(current) = current.upgrade() else {
            return;
        };
        current.store(Arc::new(render_now()));
    }
}

fn render_now() -> Bytes {
    Bytes::from(httpdate::fmt_http_date(SystemTime::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytesconv::parse_http_date;

    #[test]
    fn test_global_date_is_fresh() {
        let date = DateService::global().current();
        assert_eq!(date.len(), 29);
        assert!(date.ends_with(b" GMT"));

        let parsed = parse_http_date(&date).unwrap();
        let age = SystemTime::now().duration_since(parsed).unwrap_or_default();
        assert!(age <= Duration::from_secs(2));
    }

    #[test]
    fn test_refresh() {
        let service = DateService::with_refresh_interval(Duration::from_millis(10));
        let first = service.current();
        thread::sleep(Duration::from_millis(1100));
        let second = service.with_http_date(Bytes::copy_from_slice);
        assert_ne!(first, second);
    }
}
