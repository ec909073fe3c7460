// HTTP surface hosting the authorizers
pub mod server;

pub use server::{router, AuthorizerServer, AuthorizerState};
