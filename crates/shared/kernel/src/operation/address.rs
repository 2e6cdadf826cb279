use super::error::OperationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const SUBSYSTEM: &str = "subsystem";

/// Address of a management resource, e.g. `/subsystem=web`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathAddress {
    elements: Vec<(String, String)>,
}

impl PathAddress {
    /// The model root, `/`.
    #[must_use]
    pub const fn root() -> Self {
        Self { elements: Vec::new() }
    }

    #[must_use]
    pub fn subsystem(name: &str) -> Self {
        Self::root().append(SUBSYSTEM, name)
    }

    #[must_use]
    pub fn append(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.elements.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn elements(&self) -> &[(String, String)] {
        &self.elements
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// Value of the first element, when its key is `key`.
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.elements.first().filter(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return f.write_str("/");
        }
        for (key, value) in &self.elements {
            write!(f, "/{key}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for PathAddress {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(Self::root(), |address, segment| match segment.split_once('=') {
                Some((key, value)) if !key.is_empty() && !value.is_empty() => Ok(address.append(key, value)),
                _ => Err(OperationError::Invalid {
                    message: format!("malformed address element '{segment}'").into(),
                    context: Some(s.to_owned().into()),
                }),
            })
    }
}

impl Serialize for PathAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PathAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let address = PathAddress::subsystem("web").append("host", "default-host");
        assert_eq!(address.to_string(), "/subsystem=web/host=default-host");
        assert_eq!("/subsystem=web/host=default-host".parse::<PathAddress>().unwrap(), address);
        assert_eq!(PathAddress::root().to_string(), "/");
        assert!("/".parse::<PathAddress>().unwrap().is_root());
        assert!("/subsystem".parse::<PathAddress>().is_err());
        assert_eq!(address.first(SUBSYSTEM), Some("web"));
    }
}
