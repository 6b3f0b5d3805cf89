//! End-to-end test infrastructure for the `drover` supervisor.
//!
//! The crate ships `drover-stub-worker`, a minimal worker honouring the
//! launch, pidfile, health, stop endpoint and SIGTERM contracts, together with
//! [`pool::PoolHarness`], which runs the supervisor in-process against a pool
//! of stub workers on free loopback ports.
//!
//! - [`stub`]: worker behaviour shared by the binary and the harness
//! - [`pool`]: temporary pool directories, port selection and cleanup

pub mod pool;
pub mod stub;
