//! The D-Bus [`Connection`]: authentication, serial allocation, and the
//! call/match/export tables that demultiplex inbound traffic.

pub use self::connection::{ConnectOptions, Connection};
mod connection;

mod actor;

#[cfg(test)]
mod tests;
