//! Process supervisor: owns startup order and graceful shutdown.
//!
//! Lifecycle:
//! 1. Build storage and the command registry
//! 2. Load extensions (registry ready)
//! 3. Connect the platform (events flowing)
//! 4. Start the health gateway
//! 5. Run the dispatcher until a termination signal or connection loss
//! 6. Drain in-flight handlers (bounded), flush outbound, disconnect

pub mod run;

pub use run::Supervisor;
