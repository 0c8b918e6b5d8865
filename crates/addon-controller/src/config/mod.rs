pub mod capability;
pub mod cli;
pub mod logging;
pub mod manager;

pub use capability::*;
pub use cli::*;
pub use logging::*;
pub use manager::*;
