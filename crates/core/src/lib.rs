pub mod cache;
pub mod config;
pub mod session;
pub mod types;


pub use cache::*;
pub use config::*;
pub use session::*;
pub use types::*;
