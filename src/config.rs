use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;


// What to do when the socket closes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ReconnectPolicy {
    // Wait, then connect again. The delay is multiplied after every failed attempt and reset once
    // a connection opens. `multiplier: 1.0` gives a fixed delay.
    Reconnect {
        #[serde(with = "humantime_serde")]
        initial_delay: Duration,
        #[serde(with = "humantime_serde")]
        max_delay: Duration,
        multiplier: f64,
    },
    // Stay disconnected until the page is reloaded.
    Terminate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub reconnect: ReconnectPolicy,
    #[serde(with = "humantime_serde")]
    pub lobby_countdown: Duration,
    #[serde(with = "humantime_serde")]
    pub game_over_return_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub quiz_return_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub default_quiz_timer: Duration,
    #[serde(with = "humantime_serde")]
    pub clock_drift_tolerance: Duration,
    #[serde(with = "humantime_serde")]
    pub clock_tick_interval: Duration,
    // Number of cells looked at when checking whether an incoming board changed.
    pub signature_samples: usize,
    pub max_console_lines: usize,
    // Defaults to `/state` on the socket's host.
    pub snapshot_url: Option<Url>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Reconnect {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            reconnect: ReconnectPolicy::default(),
            lobby_countdown: Duration::from_secs(10),
            game_over_return_delay: Duration::from_secs(5),
            quiz_return_delay: Duration::from_millis(2500),
            default_quiz_timer: Duration::from_secs(15),
            clock_drift_tolerance: Duration::from_millis(300),
            clock_tick_interval: Duration::from_millis(100),
            signature_samples: 16,
            max_console_lines: 200,
            snapshot_url: None,
        }
    }
}

impl ClientConfig {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> { serde_json::from_str(s) }
}
