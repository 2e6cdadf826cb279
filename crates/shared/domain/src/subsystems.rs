use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const JAR: &str = "jar";
pub const WEB: &str = "web";
pub const EAR: &str = "ear";

bitflags! {
    /// Subsystems enabled at boot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SubsystemSet: u32 {
        const JAR = 1 << 0;
        const WEB = 1 << 1;
        const EAR = 1 << 2;

        const ALL = Self::JAR.bits() | Self::WEB.bits() | Self::EAR.bits();
    }
}

impl SubsystemSet {
    /// Names of the enabled subsystems in boot order.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        [(Self::JAR, JAR), (Self::WEB, WEB), (Self::EAR, EAR)]
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
            .collect()
    }
}

impl Default for SubsystemSet {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<&str> for SubsystemSet {
    fn from(s: &str) -> Self {
        s.split(',').map(str::trim).fold(Self::empty(), |set, name| {
            set | match name {
                JAR => Self::JAR,
                WEB => Self::WEB,
                EAR => Self::EAR,
                "all" | "*" => Self::ALL,
                _ => Self::empty(),
            }
        })
    }
}

impl From<u32> for SubsystemSet {
    fn from(bits: u32) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl Serialize for SubsystemSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

/// Accepts either the bit representation or a comma-separated name list.
impl<'de> Deserialize<'de> for SubsystemSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bits(u32),
            Names(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bits(bits) => Self::from_bits_truncate(bits),
            Raw::Names(names) => Self::from(names.as_str()),
        })
    }
}
