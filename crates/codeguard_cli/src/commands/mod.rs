//! Command implementations

mod audit;
mod count;
mod gate;
mod hook;
mod init;

pub use audit::run_audit;
pub use count::run_count;
pub use gate::run_gate;
pub use hook::{run_hook_install, run_hook_print, run_hook_uninstall};
pub use init::run_init;
