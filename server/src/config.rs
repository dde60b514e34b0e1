use clap::Parser;
use skyjo_protocol::{MAX_PLAYERS, MIN_PLAYERS};

/// Skyjo room server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct ServerConfig {
    /// Address to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "9001")]
    pub port: u16,
    /// Table size used when a host does not pick one
    #[arg(long, env = "DEFAULT_MAX_PLAYERS", default_value = "4")]
    pub default_max_players: usize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn default_max_players(&self) -> usize {
        self.default_max_players.clamp(MIN_PLAYERS, MAX_PLAYERS)
    }
}
