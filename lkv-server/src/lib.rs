// lkv-server - TCP front end for the LineKV engine
//
// Accepts line-protocol connections and routes each parsed request through
// a handler table; the binary in main.rs wires the table to the cache.

pub mod server;

pub use server::{handle_connection, Handler, LineServer};
