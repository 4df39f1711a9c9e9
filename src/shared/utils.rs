//! Utility functions and helpers

use serde_json::Value;

use crate::shared::types::Balance;

/// Format amount with proper decimals
pub fn format_amount(amount: Balance, decimals: u8) -> String {
    let value = amount as f64 / 10_f64.powi(decimals as i32);
    format!("{:.6}", value)
}

/// Parse a human-readable balance ("1,234,567") back into an integer amount.
/// Empty or malformed input yields zero.
pub fn parse_human_balance(raw: &str) -> Balance {
    let digits: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<Balance>().unwrap_or(0)
}

/// Read an integer out of a primitive chain value.
///
/// Accepts JSON numbers, decimal strings (optionally with thousand separators)
/// and `0x` prefixed big-endian hex strings.
pub fn value_to_balance(value: &Value) -> Option<Balance> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(Balance::from)
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as Balance)),
        Value::String(s) => {
            if let Some(stripped) = s.strip_prefix("0x") {
                let padded = if stripped.len() % 2 == 1 {
                    format!("0{}", stripped)
                } else {
                    stripped.to_string()
                };
                let bytes = hex::decode(padded).ok()?;
                if bytes.len() > 16 {
                    return None;
                }
                Some(bytes.iter().fold(0u128, |acc, b| (acc << 8) | Balance::from(*b)))
            } else {
                let cleaned: String = s.chars().filter(|c| *c != ',').collect();
                cleaned.parse::<Balance>().ok()
            }
        }
        _ => None,
    }
}

/// Read a float out of a primitive chain value
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(_) => value_to_balance(value).map(|b| b as f64),
        _ => None,
    }
}

/// Whether the address is a 20-byte hex EVM address
pub fn is_ethereum_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(body) => body.len() == 40 && hex::decode(body).is_ok(),
        None => false,
    }
}

/// Serde adapter storing balances as decimal strings, the way chain
/// indexers and the wallet UI exchange them.
pub mod balance_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::shared::types::Balance;

    pub fn serialize<S: Serializer>(value: &Balance, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Balance, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s
                .replace(',', "")
                .parse::<Balance>()
                .map_err(|e| de::Error::custom(format!("invalid balance {:?}: {}", s, e))),
            Raw::Number(n) => Ok(Balance::from(n)),
        }
    }
}

/// Generate unique ID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
