//! Serialize `u128` amounts as decimal strings. JSON numbers stop at
//! `u64::MAX` in `serde_json::Value`; wei amounts routinely pass it.
//!
//! Plain integers are still accepted on input as long as they fit in a `u64`.

use std::fmt;

use serde::{
    de::{self, Unexpected, Visitor},
    Deserialize, Deserializer, Serializer,
};

pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(amount)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    deserializer.deserialize_any(AmountVisitor)
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = u128;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
        Ok(v.into())
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
        u128::try_from(v).map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<u128, E> {
        s.parse()
            .map_err(|e| E::custom(format!("invalid amount '{s}': {e}")))
    }
}

pub mod option {
    use super::*;

    #[derive(Deserialize)]
    struct Amount(#[serde(with = "super")] u128);

    pub fn serialize<S: Serializer>(
        amount: &Option<u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match amount {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u128>, D::Error> {
        Ok(Option::<Amount>::deserialize(deserializer)?.map(|Amount(v)| v))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super")]
        amount: u128,
        #[serde(with = "super::option", default)]
        quote: Option<u128>,
    }

    #[test]
    fn amounts_past_u64_survive_json_values() {
        let h = Holder { amount: u128::MAX, quote: Some(20_000_000_000_000_000_000) };
        let value = serde_json::to_value(&h).unwrap();
        assert_eq!(value["amount"], "340282366920938463463374607431768211455");
        assert_eq!(value["quote"], "20000000000000000000");
        assert_eq!(serde_json::from_value::<Holder>(value).unwrap(), h);
    }

    #[test]
    fn integers_are_still_accepted() {
        let h: Holder = serde_json::from_str(r#"{ "amount": 42, "quote": null }"#).unwrap();
        assert_eq!(h, Holder { amount: 42, quote: None });
    }

    #[test]
    fn negative_and_garbage_amounts_are_refused() {
        assert!(serde_json::from_str::<Holder>(r#"{ "amount": -1 }"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{ "amount": "1e3" }"#).is_err());
    }
}
