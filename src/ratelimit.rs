//! Fixed-window rate limiting for the anonymous trial
//!
//! Counts are kept in process memory keyed by client IP. A window starts at
//! the first request and resets lazily once it has expired.

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::LimitsConfig;

/// Prune expired entries once the table grows past this
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// Per-IP request counter
#[derive(Debug)]
pub struct GuestLimiter {
    limit: u32,
    window: Duration,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl GuestLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self::new(
            limits.trial_requests_per_window,
            Duration::from_secs(limits.trial_window_secs),
        )
    }

    /// Record a request from `ip` and report whether it is allowed
    pub fn check(&self, ip: &str) -> bool {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: &str, now: Instant) -> bool {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if entries.len() > PRUNE_THRESHOLD {
            entries.retain(|_, e| now <= e.reset_at);
        }

        match entries.get_mut(ip) {
            Some(entry) if now <= entry.reset_at => {
                if entry.count >= self.limit {
                    return false;
                }
                entry.count += 1;
                true
            }
            _ => {
                // First request, or the previous window expired
                entries.insert(
                    ip.to_string(),
                    WindowEntry {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                self.limit > 0
            }
        }
    }

    /// Number of tracked clients
    pub fn tracked(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Client IP: first `x-forwarded-for` entry, then `x-real-ip`, else "unknown"
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real = real.trim();
        if !real.is_empty() {
            return real.to_string();
        }
    }

    "unknown".to_string()
}
