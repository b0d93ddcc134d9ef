pub mod fallback;
pub mod health;
pub mod intake;
pub mod stream;
pub mod tasks;
