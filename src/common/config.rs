use std::time::Duration;

use clap::Parser;

use crate::broadcast::{FanoutPolicy, RetryPolicy};

#[derive(Parser, Debug, Clone)]
#[command(name = "simple-gossip", version, about = "Best-effort gossip broadcast node")]
pub struct Config {
    /// Base unit of the linear retry backoff, in milliseconds (at least 1)
    #[arg(long, default_value_t = 100)]
    pub base_delay_ms: u64,

    /// Send attempts per (neighbor, value) before giving up
    #[arg(long, default_value_t = 100)]
    pub max_attempts: u32,

    /// Also gossip a value back to the peer it was received from
    #[arg(long)]
    pub include_origin: bool,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.base_delay_ms), self.max_attempts)
    }

    pub fn fanout_policy(&self) -> FanoutPolicy {
        FanoutPolicy {
            exclude_origin: !self.include_origin,
        }
    }
}
