//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `run`     | `Run`            |
//! | `analyze` | `Analyze`        |
//! | `config`  | `Config`         |

pub mod analyze;
pub mod config;
pub mod run;

pub use analyze::cmd_analyze;
pub use config::cmd_config;
pub use run::cmd_run;
