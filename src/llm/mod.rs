pub mod backend;
pub mod budget;
pub mod client;
pub mod prompt;
