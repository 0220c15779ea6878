pub mod hello;
pub mod ping;
