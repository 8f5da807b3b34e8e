//! Reference entities owned outside the settlement engine
//!
//! Buyers, unions, locations, suppliers, products and ports are referenced
//! by id from the calculation graph; these types carry the display data the
//! reporting layer needs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A regional buyer paying for the product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: Uuid,
    /// Company or office name
    pub name: String,
    pub region: String,
    /// Short unique code (at most 4 characters)
    pub code: String,
}

/// A union within a buyer's region
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Union {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
}

/// City, town or site within a buyer's region
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    /// ISO 3166 alpha-2 country code
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductCategory {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub category: ProductCategory,
    pub name: String,
    pub unit: Option<Unit>,
    pub description: String,
}

/// Measurement unit of a product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    /// Short code used in letters (e.g. "MT")
    pub code: String,
    pub unit_type: UnitType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitType {
    Weight,
    Volume,
    Length,
    Counter,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Weight => "WEIGHT",
            UnitType::Volume => "VOLUME",
            UnitType::Length => "LENGTH",
            UnitType::Counter => "COUNTER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "WEIGHT" => Some(UnitType::Weight),
            "VOLUME" => Some(UnitType::Volume),
            "LENGTH" => Some(UnitType::Length),
            "COUNTER" => Some(UnitType::Counter),
            _ => None,
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitType::Weight => write!(f, "Weight/Mass"),
            UnitType::Volume => write!(f, "Volume"),
            UnitType::Length => write!(f, "Length/Distance"),
            UnitType::Counter => write!(f, "Counter"),
        }
    }
}

/// Dispatch port a vessel arrives at
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Port {
    pub id: Uuid,
    pub name: String,
    /// ISO 3166 alpha-2 country code
    pub country: String,
    pub office: String,
    pub is_default: bool,
}

/// Countries dispatch ports may be located in
pub const PORT_COUNTRIES: &[&str] = &["DJ", "ER", "SO", "SD", "KE"];

/// Order ports with the default first, then by name
pub fn sort_ports(ports: &mut [Port]) {
    ports.sort_by(|a, b| b.is_default.cmp(&a.is_default).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, is_default: bool) -> Port {
        Port {
            id: Uuid::new_v4(),
            name: name.to_string(),
            country: "DJ".to_string(),
            office: String::new(),
            is_default,
        }
    }

    #[test]
    fn test_default_port_sorts_first() {
        let mut ports = vec![port("Berbera", false), port("Djibouti", true), port("Assab", false)];
        sort_ports(&mut ports);
        let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Djibouti", "Assab", "Berbera"]);
    }
}
