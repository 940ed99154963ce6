//! Command line for the watcher binary. Values given here override the environment.

use clap::Parser;

use crate::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(name = "xmpp-watcher")]
#[command(
    about = "Watch XMPP rooms for bot messages and relay them to the desktop",
    long_about = None
)]
pub struct Cli {
    /// Debug logging.
    #[arg(short = 'f', long)]
    pub debug: bool,

    /// Trace logging (wins over --debug).
    #[arg(short, long)]
    pub verbose: bool,

    /// Write notifications to the log instead of D-Bus.
    #[arg(long)]
    pub log_only: bool,

    /// Account as local@domain; overrides XMPP_USER.
    #[arg(long)]
    pub user: Option<String>,

    /// Server host; overrides XMPP_HOST.
    #[arg(long)]
    pub host: Option<String>,

    /// Server port; overrides XMPP_PORT.
    #[arg(long)]
    pub port: Option<u16>,
}

impl Cli {
    pub fn log_level(&self) -> Option<String> {
        if self.verbose {
            Some("trace".to_string())
        } else if self.debug {
            Some("debug".to_string())
        } else {
            None
        }
    }

    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            user: self.user.clone(),
            host: self.host.clone(),
            port: self.port,
        }
    }
}
