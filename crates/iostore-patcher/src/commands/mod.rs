mod config;
mod inspect;
mod patch;

pub use config::*;
pub use inspect::*;
pub use patch::*;
