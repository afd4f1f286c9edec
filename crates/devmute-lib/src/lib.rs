//! devmute — disable webcams and microphones on demand, re-enable them later.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod control;
pub mod error;
pub mod manager;
pub mod policy;
pub mod resolver;
pub mod selection;
pub mod tracker;

pub use error::DevmuteError;
pub use manager::DeviceManager;
