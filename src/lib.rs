pub mod core;
pub mod layout;
pub mod services;
pub mod utils;
