//! Strongly-typed identifiers used across the domain.
//!
//! Order, line, item and location codes come from the ERP as opaque strings, so
//! they are modelled as string newtypes rather than UUIDs.

use serde::{Deserialize, Serialize};

/// Identifier of a customer order (e.g. `SO-1001`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

/// Identifier of a line within an order (e.g. `001`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

/// Item (SKU) code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCode(String);

/// Stocking / ship-from location code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationCode(String);

macro_rules! impl_code_newtype {
    ($t:ty) => {
        impl $t {
            /// Wrap a raw code without validation; blank codes are caught
            /// when a line is validated at ingestion.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

impl_code_newtype!(OrderId);
impl_code_newtype!(LineId);
impl_code_newtype!(ItemCode);
impl_code_newtype!(LocationCode);

/// Join key between pipeline stages: one order line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub order_id: OrderId,
    pub line_id: LineId,
}

impl LineKey {
    pub fn new(order_id: OrderId, line_id: LineId) -> Self {
        Self { order_id, line_id }
    }
}

impl core::fmt::Display for LineKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.order_id, self.line_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_codes_are_blank() {
        assert!(ItemCode::new("  ").is_blank());
        assert!(OrderId::from("").is_blank());
        assert!(!ItemCode::from("WIDGET-A").is_blank());
    }

    #[test]
    fn line_key_displays_order_and_line() {
        let key = LineKey::new(OrderId::from("SO-1001"), LineId::from("002"));
        assert_eq!(key.to_string(), "SO-1001/002");
    }

    #[test]
    fn codes_serialize_transparently() {
        let json = serde_json::to_string(&LocationCode::from("MAIN")).unwrap();
        assert_eq!(json, "\"MAIN\"");
    }
}
