/// JSON envelopes exchanged over the peer channel.
use coordination::Command;
use serde::{Deserialize, Serialize};
use timeline::StreamConfig;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "config")]
    Config { config: StreamConfig },

    #[serde(rename = "command")]
    Command { command: Command },
}

impl Envelope {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
