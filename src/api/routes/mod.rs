pub mod health;
pub mod program;
