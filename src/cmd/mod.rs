//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `run`    | `Run`, `Retry`   |
//! | `status` | `Status`, `Reset`|
//! | `serve`  | `Serve`          |
//! | `config` | `Config`         |

pub mod config;
pub mod run;
pub mod serve;
pub mod status;

pub use config::cmd_config;
pub use run::{cmd_retry, cmd_run};
pub use serve::cmd_serve;
pub use status::{cmd_reset, cmd_status};
