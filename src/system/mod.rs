//! # System Interaction Layer
//!
//! The boundary between site resolution and the processes that do the work.
//!
//! ## Modules
//!
//! - **`executor`**: Spawns external programs (`ssh`, `rsync`, browsers). Captures output
//!   under a time limit, runs interactive children on the user's terminal, and honours the
//!   cancellation token.
//! - **`backend`**: The result protocol. Runs a site command in-process or over ssh and
//!   turns either into a `DispatchResult`, parsing the trailing JSON line a remote
//!   `--backend` run prints.

pub mod backend;
pub mod executor;
