//! Line-oriented chat relay.
//!
//! Clients connect over TCP, answer a name prompt, then exchange broadcast
//! and private messages through the relay. Each module covers one concern:
//!
//! - [`server`] owns the listening socket and spawns a task per connection.
//! - [`session`] drives one connection from handshake to teardown.
//! - [`registry`] is the shared set of live sessions.
//! - [`router`] decides who receives each command.
//! - [`command`] parses decoded lines (`/pm`, `/quit`, plain text).
//! - [`codec`] is the per-line obfuscation transform. It is not encryption.
//! - [`message`] frames lines on the wire.
//! - [`cli`], [`config`] and [`client`] make up the binary's surface.
//!
//! Integration tests drive a real [`server::Server`] over loopback TCP.

pub mod cli;
pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
