pub mod server;

pub use server::GateServer;
