//! Low-level primitives shared by the statistics and cache layers.

/// Inter-process file locking.
///
/// Cooperative advisory locks guarding read-modify-write cycles on shared files.
pub mod concurrency;
