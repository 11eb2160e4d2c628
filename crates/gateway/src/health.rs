use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

/// Process readiness, shared between the supervisor and the HTTP server.
///
/// Healthy means the registry finished its initial load AND the platform
/// connection is up. Both flags flip independently of dispatcher load.
pub struct HealthState {
    registry_loaded: AtomicBool,
    platform_connected: AtomicBool,
    started_at: Instant,
    pub version: String,
    pub hostname: String,
}

impl HealthState {
    pub fn new() -> Arc<Self> {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".into());

        Arc::new(Self {
            registry_loaded: AtomicBool::new(false),
            platform_connected: AtomicBool::new(false),
            started_at: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname,
        })
    }

    pub fn set_registry_loaded(&self) {
        self.registry_loaded.store(true, Ordering::SeqCst);
    }

    pub fn set_platform_connected(&self, connected: bool) {
        self.platform_connected.store(connected, Ordering::SeqCst);
    }

    pub fn registry_loaded(&self) -> bool {
        self.registry_loaded.load(Ordering::SeqCst)
    }

    pub fn platform_connected(&self) -> bool {
        self.platform_connected.load(Ordering::SeqCst)
    }

    pub fn healthy(&self) -> bool {
        self.registry_loaded() && self.platform_connected()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_requires_both_flags() {
        let state = HealthState::new();
        assert!(!state.healthy());

        state.set_registry_loaded();
        assert!(!state.healthy());

        state.set_platform_connected(true);
        assert!(state.healthy());

        state.set_platform_connected(false);
        assert!(!state.healthy());
    }
}
