//! Workspace tooling package.
//!
//! Exists so `rusty-hook` can install the pre-commit hooks configured in the
//! root `Cargo.toml`. The code lives in `crates/localgw-lib` and
//! `crates/localgw-cli`.
