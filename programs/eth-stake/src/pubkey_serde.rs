//! Serialize `Pubkey` as a base-58 string so snapshots stay human-readable.

use std::str::FromStr;

use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
use solana_sdk::pubkey::Pubkey;

pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(key)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
    let s = String::deserialize(deserializer)?;
    Pubkey::from_str(&s).map_err(|e| D::Error::custom(format!("invalid pubkey '{s}': {e}")))
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(key: &Option<Pubkey>, serializer: S) -> Result<S::Ok, S::Error> {
        match key {
            Some(k) => serializer.serialize_some(&k.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Pubkey>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| {
                Pubkey::from_str(&s)
                    .map_err(|e| D::Error::custom(format!("invalid pubkey '{s}': {e}")))
            })
            .transpose()
    }
}
