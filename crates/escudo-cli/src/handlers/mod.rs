//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains:
//! - The execution logic for a CLI command
//! - Pure helper functions
//! - Comprehensive tests

pub mod attack;
pub mod demo;
pub mod detect;
pub mod logs;
pub mod protect;
pub mod scan;
pub mod session;

// Re-export handlers for convenient access
pub use attack::execute_attack;
pub use demo::execute_demo;
pub use detect::execute_detect;
pub use logs::execute_logs;
pub use protect::execute_protect;
pub use scan::execute_scan;
pub use session::execute_session;
