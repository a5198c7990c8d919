mod config;
mod credentials;
mod util;

pub use config::*;
pub use credentials::*;
pub use util::*;
