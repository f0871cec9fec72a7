//! Wire shapes spoken on every walletcast transport.
//!
//! * [`frames`]: wallet client WebSocket (inbound requests, outbound pushes)
//! * [`node`]: upstream node confirmation feed

pub mod frames;
pub mod node;
