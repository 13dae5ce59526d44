/// Re-export `Config` from `briklyst-core` for use within this crate.
///
/// All environment-variable parsing lives in `briklyst-core` so integration
/// tests can build a `Config` without going through the environment.
pub use briklyst_core::config::Config;
