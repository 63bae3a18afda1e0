//! Engine configuration.

use vouch_core::ValidationLimits;

/// Configuration for a [`crate::TestimonialEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Structural limits enforced at envelope admission.
    pub limits: ValidationLimits,
    /// Capacity of the ordered ingestion channel from the transport.
    pub ingest_capacity: usize,
    /// Capacity of the broadcast channel carrying engine events. Slow
    /// consumers lag and lose old events; the engine never blocks on them.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: ValidationLimits::default(),
            ingest_capacity: 256,
            event_capacity: 64,
        }
    }
}
