//! Bootstrap of the addon controller: controllers plus the optional
//! capabilities whose event sources are attached when they are installed.

pub mod app;
pub mod capability;
pub mod config;
pub mod controller;
pub mod infrastructure;
