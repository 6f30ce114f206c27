//! Strict-JSON normalization for profile trees.
//!
//! Every non-finite float (NaN, +inf, -inf) becomes [`ProfileValue::Null`].
//! Maps keep their key order and lists keep their element order.

use crate::value::ProfileValue;

/// Return a copy of `value` with every non-finite float replaced by `Null`.
pub fn sanitize(value: &ProfileValue) -> ProfileValue {
    match value {
        ProfileValue::Float(f) if !f.is_finite() => ProfileValue::Null,
        ProfileValue::List(items) => ProfileValue::List(items.iter().map(sanitize).collect()),
        ProfileValue::Map(map) => ProfileValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Owned variant of [`sanitize`] that rewrites the tree without cloning it.
pub fn sanitize_in_place(value: &mut ProfileValue) {
    if matches!(value, ProfileValue::Float(f) if !f.is_finite()) {
        *value = ProfileValue::Null;
        return;
    }
    match value {
        ProfileValue::List(items) => items.iter_mut().for_each(sanitize_in_place),
        ProfileValue::Map(map) => map.values_mut().for_each(sanitize_in_place),
        _ => {}
    }
}

/// True when no non-finite float remains anywhere in the tree.
pub fn is_sanitized(value: &ProfileValue) -> bool {
    match value {
        ProfileValue::Float(f) => f.is_finite(),
        ProfileValue::List(items) => items.iter().all(is_sanitized),
        ProfileValue::Map(map) => map.values().all(is_sanitized),
        _ => true,
    }
}
