pub mod children;
pub mod parents;
pub mod preferences;
pub mod videos;
