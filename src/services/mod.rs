pub mod analyzer;
pub mod cookies;
pub mod error;
pub mod password;
pub mod session;
pub mod tokens;
pub mod transcript;
pub mod youtube;
