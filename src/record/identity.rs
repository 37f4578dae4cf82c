use sha2::{Digest, Sha256};

/// Computes the identity key of a normalized record
///
/// The key hashes `name=value` pairs of `key_fields` in the given order. When
/// no key fields are configured, or every key field is empty, all fields take
/// part instead so distinct rows still get distinct keys.
pub fn identity_key(values: &[(String, Option<String>)], key_fields: &[String]) -> String {
    let selected: Vec<&(String, Option<String>)> = key_fields
        .iter()
        .filter_map(|key| values.iter().find(|(name, _)| name == key))
        .collect();

    let any_key_value = selected.iter().any(|(_, value)| value.is_some());

    let pairs: Vec<&(String, Option<String>)> = if any_key_value {
        selected
    } else {
        values.iter().collect()
    };

    let mut hasher = Sha256::new();
    for (name, value) in pairs {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_deref().unwrap_or("").as_bytes());
        // unit separator keeps ("a", "bc") and ("ab", "c") apart
        hasher.update(b"\x1f");
    }
    hex::encode(hasher.finalize())
}
