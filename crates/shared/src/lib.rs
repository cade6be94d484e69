//! Wire contract shared by the relay server and its clients.

pub mod domain;
pub mod error;
pub mod protocol;
