//! Application module
//!
//! Wiring of the controllers, the capability coordinator and the process
//! lifecycle.

pub mod builder;
pub mod core;
pub mod services;
pub mod tasks;

pub use builder::ApplicationBuilder;
pub use self::core::Application;
pub use services::ApplicationServices;
