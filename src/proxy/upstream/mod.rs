// Upstream module

pub mod client;
