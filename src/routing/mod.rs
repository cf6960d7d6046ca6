//! Routing protocol selection and installation.
//!
//! Protocols are selected by numeric id (1=OLSR, 2=AODV, 3=DSDV, 4=DSR) or
//! by case-insensitive name. OLSR, AODV and DSDV share the list-routing
//! installation path; DSR installs the base stack plus a separate agent.

pub mod selector;
pub mod stack;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

pub use selector::{RoutingSelector, SelectorState};
pub use stack::{NetworkStack, NodeStack, StackRegistry, LIST_ROUTING_PRIORITY};

/// Supported routing protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoutingProtocol {
    Olsr,
    Aodv,
    Dsdv,
    Dsr,
}

impl RoutingProtocol {
    pub const ALL: [RoutingProtocol; 4] = [
        RoutingProtocol::Olsr,
        RoutingProtocol::Aodv,
        RoutingProtocol::Dsdv,
        RoutingProtocol::Dsr,
    ];

    pub fn from_id(id: u32) -> Result<Self, ConfigError> {
        match id {
            1 => Ok(RoutingProtocol::Olsr),
            2 => Ok(RoutingProtocol::Aodv),
            3 => Ok(RoutingProtocol::Dsdv),
            4 => Ok(RoutingProtocol::Dsr),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        let trimmed = name.trim();
        if let Ok(id) = trimmed.parse::<u32>() {
            return Self::from_id(id);
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "OLSR" => Ok(RoutingProtocol::Olsr),
            "AODV" => Ok(RoutingProtocol::Aodv),
            "DSDV" => Ok(RoutingProtocol::Dsdv),
            "DSR" => Ok(RoutingProtocol::Dsr),
            _ => Err(ConfigError::UnknownProtocol(name.to_string())),
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            RoutingProtocol::Olsr => 1,
            RoutingProtocol::Aodv => 2,
            RoutingProtocol::Dsdv => 3,
            RoutingProtocol::Dsr => 4,
        }
    }

    /// Name written to the CSV log
    pub fn name(&self) -> &'static str {
        match self {
            RoutingProtocol::Olsr => "OLSR",
            RoutingProtocol::Aodv => "AODV",
            RoutingProtocol::Dsdv => "DSDV",
            RoutingProtocol::Dsr => "DSR",
        }
    }

    /// Whether the protocol is installed as a list-routing agent
    pub fn uses_list_routing(&self) -> bool {
        !matches!(self, RoutingProtocol::Dsr)
    }
}

impl fmt::Display for RoutingProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Protocol as written in configuration: a numeric id or a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProtocolSpec {
    Id(u32),
    Name(String),
}

impl ProtocolSpec {
    pub fn resolve(&self) -> Result<RoutingProtocol, ConfigError> {
        match self {
            ProtocolSpec::Id(id) => RoutingProtocol::from_id(*id),
            ProtocolSpec::Name(name) => RoutingProtocol::from_name(name),
        }
    }
}

impl From<RoutingProtocol> for ProtocolSpec {
    fn from(protocol: RoutingProtocol) -> Self {
        ProtocolSpec::Id(protocol.id())
    }
}

impl std::str::FromStr for ProtocolSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("protocol must not be empty".to_string());
        }
        Ok(match s.parse::<u32>() {
            Ok(id) => ProtocolSpec::Id(id),
            Err(_) => ProtocolSpec::Name(s.to_string()),
        })
    }
}

impl fmt::Display for ProtocolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolSpec::Id(id) => write!(f, "{}", id),
            ProtocolSpec::Name(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ids() {
        assert_eq!(RoutingProtocol::from_id(1).unwrap(), RoutingProtocol::Olsr);
        assert_eq!(RoutingProtocol::from_id(4).unwrap(), RoutingProtocol::Dsr);
        assert_eq!(
            RoutingProtocol::from_id(5),
            Err(ConfigError::UnknownProtocol("5".to_string()))
        );
        assert!(RoutingProtocol::from_id(0).is_err());
    }

    #[test]
    fn test_names_are_case_insensitive() {
        assert_eq!(RoutingProtocol::from_name("aodv").unwrap(), RoutingProtocol::Aodv);
        assert_eq!(RoutingProtocol::from_name("DsDv").unwrap(), RoutingProtocol::Dsdv);
        assert_eq!(RoutingProtocol::from_name("3").unwrap(), RoutingProtocol::Dsdv);
        assert!(RoutingProtocol::from_name("batman").is_err());
    }

    #[test]
    fn test_spec_parsing() {
        assert_eq!("2".parse::<ProtocolSpec>().unwrap(), ProtocolSpec::Id(2));
        assert_eq!("olsr".parse::<ProtocolSpec>().unwrap(), ProtocolSpec::Name("olsr".to_string()));
        assert!("".parse::<ProtocolSpec>().is_err());
        assert_eq!(ProtocolSpec::Name("dsr".to_string()).resolve().unwrap(), RoutingProtocol::Dsr);
    }

    #[test]
    fn test_ids_round_trip_through_names() {
        for protocol in RoutingProtocol::ALL {
            assert_eq!(RoutingProtocol::from_id(protocol.id()).unwrap(), protocol);
            assert_eq!(RoutingProtocol::from_name(protocol.name()).unwrap(), protocol);
        }
        assert!(!RoutingProtocol::Dsr.uses_list_routing());
        assert!(RoutingProtocol::Olsr.uses_list_routing());
    }
}
