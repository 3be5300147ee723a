//! Locating the release array inside mirror payloads.
//!
//! Mirrors are run by third parties and their document layout changes without
//! notice. Instead of binding to a single shape, payloads are matched against
//! an ordered registry of candidate locations and the first one holding an
//! array wins.
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructureDescriptor {
    pub name: &'static str,
    /// Dotted path to the array, or a whole-value sentinel (`*`, `*#*`, empty).
    pub target: &'static str,
}

impl StructureDescriptor {
    pub fn is_whole_value(&self) -> bool {
        is_whole_value(self.target)
    }
}

/// Known payload layouts, tried in this order.
pub const STRUCTURES: &[StructureDescriptor] = &[
    StructureDescriptor {
        name: "v1",
        target: "*",
    },
    StructureDescriptor {
        name: "v2",
        target: "releases",
    },
];

fn is_whole_value(path: &str) -> bool {
    matches!(path, "" | "*" | "*#*")
}

/// Walks `path` into `value`. Returns `None` as soon as a segment is missing
/// or the current value cannot be indexed.
pub fn resolve<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if is_whole_value(path) {
        return value.is_array().then_some(value);
    }

    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Returns the array at the first matching descriptor, or an empty slice when
/// the payload matches none of them.
pub fn find_release_array<'a>(
    payload: &'a Value,
    descriptors: &[StructureDescriptor],
) -> &'a [Value] {
    for descriptor in descriptors {
        let candidate = if descriptor.is_whole_value() {
            Some(payload)
        } else {
            resolve(payload, descriptor.target)
        };

        if let Some(Value::Array(items)) = candidate {
            tracing::trace!(structure = descriptor.name, "matched payload structure");
            return items;
        }
    }

    &[]
}
