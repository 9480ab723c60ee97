use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_KEY: &str = "secret123";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay server, accepting TCP connections.
    Serve(ServeArgs),
    /// Connect to a relay and chat from the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Interface the relay binds to.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on. Use 0 for an ephemeral port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Shared key mixed into every obfuscated line.
    #[arg(long, default_value = DEFAULT_KEY)]
    pub key: String,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Display name sent in reply to the server's prompt.
    #[arg(long)]
    pub nickname: String,

    /// Address of the relay to connect to.
    #[arg(long, default_value = "127.0.0.1:5000")]
    pub server: SocketAddr,

    /// Shared key; must match the relay's.
    #[arg(long, default_value = DEFAULT_KEY)]
    pub key: String,
}
