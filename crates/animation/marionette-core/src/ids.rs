//! Identifiers for addressable servo channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnimationError;

/// Hardware channel index on the servo controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u8);

impl ChannelId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ChannelId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// Channel keys arrive as JSON object keys ("0", "1", ...).
impl FromStr for ChannelId {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .map(ChannelId)
            .map_err(|_| AnimationError::InvalidChannelId { key: s.to_string() })
    }
}
