use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// The vendor platform tag of a device -- which CLI dialect to speak. The string forms follow
/// the netmiko-style naming the wider tooling ecosystem uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Classic IOS / IOS-XE.
    CiscoIos,
    /// NX-OS (Nexus).
    CiscoNxos,
    /// Not yet determined -- the worker autodetects before interrogation.
    #[default]
    Unknown,
}

impl Platform {
    /// The canonical string tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CiscoIos => "cisco_ios",
            Self::CiscoNxos => "cisco_nxos",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a platform tag. Anything unrecognized -- including the telnet-suffixed variants
    /// some tools emit (`cisco_ios_telnet`) -- maps to the base platform when the prefix is
    /// recognizable, otherwise `Unknown`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let lowered = s.trim().to_lowercase();

        if lowered.starts_with("cisco_nxos") {
            Self::CiscoNxos
        } else if lowered.starts_with("cisco_ios") {
            Self::CiscoIos
        } else {
            Self::Unknown
        }
    }

    /// True when the platform is concrete enough to pick a probe implementation.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Platform {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
