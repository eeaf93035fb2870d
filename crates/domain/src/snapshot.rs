//! Annotated snapshots — live values paired with the descriptors that
//! explain them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ski::Ski;

/// UTC time at which a snapshot was assembled.
pub type Timestamp = DateTime<Utc>;

/// Something that carries a protocol identifier used for interlinking.
///
/// The identifier is optional because the wire model makes every field
/// optional; entries without one never match a descriptor.
pub trait Identified {
    type Id: PartialEq + Copy;

    fn identifier(&self) -> Option<Self::Id>;
}

/// One live data point with its matching descriptor, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedEntry<V, D> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<V>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<D>,
}

/// One complete refresh result for a single device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedSnapshot<V, D> {
    pub ski: Ski,
    #[serde(rename = "value")]
    pub entries: Vec<AnnotatedEntry<V, D>>,
    pub received_at: Timestamp,
}

impl<V, D> AnnotatedSnapshot<V, D> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the live values, skipping entries without one.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().filter_map(|e| e.value.as_ref())
    }
}

/// Pair each live value with the first descriptor carrying the same id.
///
/// The output has the same length and order as `values`. Values without an
/// id, or whose id has no descriptor, get `description: None`.
pub fn interlink<V, D>(values: &[V], descriptions: &[D]) -> Vec<AnnotatedEntry<V, D>>
where
    V: Identified + Clone,
    D: Identified<Id = V::Id> + Clone,
{
    values
        .iter()
        .map(|value| {
            let description = value.identifier().and_then(|id| {
                descriptions
                    .iter()
                    .find(|d| d.identifier() == Some(id))
                    .cloned()
            });
            AnnotatedEntry {
                value: Some(value.clone()),
                description,
            }
        })
        .collect()
}

/// Interlink and stamp a snapshot for `ski`.
pub fn annotate<V, D>(
    ski: &Ski,
    values: &[V],
    descriptions: &[D],
    at: Timestamp,
) -> AnnotatedSnapshot<V, D>
where
    V: Identified + Clone,
    D: Identified<Id = V::Id> + Clone,
{
    AnnotatedSnapshot {
        ski: ski.clone(),
        entries: interlink(values, descriptions),
        received_at: at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Reading {
        id: Option<u32>,
        val: i64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Label {
        id: Option<u32>,
        name: &'static str,
    }

    impl Identified for Reading {
        type Id = u32;
        fn identifier(&self) -> Option<u32> {
            self.id
        }
    }

    impl Identified for Label {
        type Id = u32;
        fn identifier(&self) -> Option<u32> {
            self.id
        }
    }

    fn reading(id: u32, val: i64) -> Reading {
        Reading { id: Some(id), val }
    }

    fn label(id: u32, name: &'static str) -> Label {
        Label { id: Some(id), name }
    }

    #[test]
    fn should_preserve_length_and_order_of_values() {
        let values = vec![reading(3, 30), reading(1, 10), reading(2, 20)];
        let labels = vec![label(1, "a"), label(2, "b"), label(3, "c")];

        let out = interlink(&values, &labels);

        let vals: Vec<i64> = out.iter().map(|e| e.value.as_ref().unwrap().val).collect();
        assert_eq!(vals, vec![30, 10, 20]);
        let names: Vec<&str> = out
            .iter()
            .map(|e| e.description.as_ref().unwrap().name)
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn should_attach_none_when_no_descriptor_matches() {
        let out = interlink(&[reading(9, 1)], &[label(1, "Power")]);
        assert_eq!(out.len(), 1);
        assert!(out[0].description.is_none());
        assert_eq!(out[0].value, Some(reading(9, 1)));
    }

    #[test]
    fn should_attach_none_when_value_has_no_id() {
        let values = vec![Reading { id: None, val: 5 }];
        let labels = vec![Label { id: None, name: "x" }];
        let out = interlink(&values, &labels);
        assert!(out[0].description.is_none());
    }

    #[test]
    fn should_pick_first_descriptor_when_ids_are_duplicated() {
        let labels = vec![label(1, "first"), label(1, "second")];
        let out = interlink(&[reading(1, 0)], &labels);
        assert_eq!(out[0].description.as_ref().unwrap().name, "first");
    }

    #[test]
    fn should_return_empty_for_empty_values() {
        let out = interlink::<Reading, Label>(&[], &[label(1, "a")]);
        assert!(out.is_empty());
    }

    #[test]
    fn should_serialize_entries_under_value_key() {
        let ski = Ski::new("ski-1").unwrap();
        let at = Utc::now();
        let snapshot = annotate(
            &ski,
            &[reading(1, 10), reading(2, 5)],
            &[label(1, "Power")],
            at,
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["ski"], "ski-1");
        assert_eq!(json["value"][0]["value"]["val"], 10);
        assert_eq!(json["value"][0]["description"]["name"], "Power");
        assert!(json["value"][1].get("description").is_none());
    }
}
