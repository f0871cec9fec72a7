pub mod broadcast;
pub mod connection;
pub mod donations;
pub mod message;
pub mod send;
