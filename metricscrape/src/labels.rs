use std::{
    fmt::{self, Write},
    ops::Index,
};

use serde::{
    de::{Deserialize, Deserializer, MapAccess, Visitor},
    ser::{Serialize, SerializeMap, Serializer},
};

/// Label is a key/value pair of strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    pub name: String,
    pub value: String,
}

/// `Labels` is a set of `Label`s kept sorted by name, with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Labels(Vec<Label>);

impl Labels {
    /// Builds a label set from pairs in any order. When a name repeats, the
    /// last value wins.
    pub fn new<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut this = Self::default();
        for (k, v) in labels {
            this.insert(k, v);
        }
        this
    }

    /// Sets the value of the label `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Ok(index) => self.0[index].value = value,
            Err(index) => self.0.insert(index, Label { name, value }),
        }
    }

    /// Overlays every label of `other` on top of `self`.
    pub fn extend(&mut self, other: &Labels) {
        for label in other.iter() {
            self.insert(label.name.as_str(), label.value.as_str());
        }
    }

    /// Returns the value of the label with given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .ok()
            .map(|index| self.0[index].value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn position(&self, name: &str) -> Result<usize, usize> {
        self.0.binary_search_by(|label| label.name.as_str().cmp(name))
    }
}

/// Builds the registry identity of a metric: the name followed by every
/// label name and value in label-name order, each written as
/// `<byte length>:<text>`. Lengths make the key unambiguous whatever bytes
/// names and values contain.
pub fn canonical_key(name: &str, labels: &Labels) -> String {
    fn push(key: &mut String, part: &str) {
        // writing to a String cannot fail
        let _ = write!(key, "{}:{part}", part.len());
    }

    let mut key = String::with_capacity(
        name.len()
            + 4
            + labels
                .iter()
                .map(|l| l.name.len() + l.value.len() + 8)
                .sum::<usize>(),
    );
    push(&mut key, name);
    for label in labels.iter() {
        push(&mut key, &label.name);
        push(&mut key, &label.value);
    }
    key
}

impl<K, V> FromIterator<(K, V)> for Labels
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl Index<&str> for Labels {
    type Output = str;

    fn index(&self, key: &str) -> &Self::Output {
        match self.get(key) {
            Some(value) => value,
            None => panic!("no label found for key {key:?}"),
        }
    }
}

impl Serialize for Labels {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for label in &self.0 {
            map.serialize_entry(&label.name, &label.value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Labels {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LabelsVisitor;

        impl<'de> Visitor<'de> for LabelsVisitor {
            type Value = Labels;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of label names to values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Labels, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut labels = Labels::default();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    labels.insert(k, v);
                }
                Ok(labels)
            }
        }

        deserializer.deserialize_map(LabelsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn test_labels() {
        let labels = Labels::new([("b", "1"), ("a", "2"), ("c", "2")]);
        expect![[r#"
            Labels(
                [
                    Label {
                        name: "a",
                        value: "2",
                    },
                    Label {
                        name: "b",
                        value: "1",
                    },
                    Label {
                        name: "c",
                        value: "2",
                    },
                ],
            )
        "#]]
        .assert_debug_eq(&labels);

        expect![[r#"
            Labels(
                [],
            )
        "#]]
        .assert_debug_eq(&Labels::default());
    }

    #[test]
    fn test_labels_last_value_wins() {
        let labels = Labels::new([("b", "1"), ("a", "2"), ("a", "3")]);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("a"), Some("3"));
    }

    #[test]
    fn test_labels_insert_extend() {
        let mut labels = Labels::new([("job", "from-target"), ("path", "/")]);
        labels.insert("instance", "localhost:8080");
        labels.extend(&Labels::new([("job", "static"), ("env", "prod")]));

        let names = labels.iter().map(|l| l.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["env", "instance", "job", "path"]);
        assert_eq!(&labels["job"], "static");
        assert!(labels.get("x").is_none());
    }

    #[test]
    #[should_panic]
    fn test_labels_index_not_found() {
        let labels = Labels::new([("a", "1")]);
        let _ = &labels["b"];
    }

    #[test]
    fn test_canonical_key_order_independent() {
        let ab = Labels::new([("a", "1"), ("b", "2")]);
        let ba = Labels::new([("b", "2"), ("a", "1")]);
        assert_eq!(canonical_key("x", &ab), canonical_key("x", &ba));
        assert_eq!(canonical_key("x", &Labels::default()), "1:x");
        assert_eq!(canonical_key("x", &ab), "1:x1:a1:11:b1:2");
    }

    #[test]
    fn test_canonical_key_unambiguous() {
        // "a=1,b=2" as a single value must not collide with two labels.
        let one = Labels::new([("a", "1,b=2")]);
        let two = Labels::new([("a", "1"), ("b", "2")]);
        assert_ne!(canonical_key("x", &one), canonical_key("x", &two));
        assert_ne!(
            canonical_key("x", &Labels::default()),
            canonical_key("x", &Labels::new([("", "")]))
        );

        // separator-like bytes inside a value
        let one = Labels::new([("a", "1\x1fb=2")]);
        assert_ne!(canonical_key("x", &one), canonical_key("x", &two));

        // '=' moving between name and value
        let left = Labels::new([("a", "b=c")]);
        let right = Labels::new([("a=b", "c")]);
        assert_ne!(canonical_key("x", &left), canonical_key("x", &right));

        // length digits inside text
        assert_ne!(
            canonical_key("x1:a", &Labels::default()),
            canonical_key("x", &Labels::new([("a", "")]))
        );
        assert_ne!(
            canonical_key("x", &Labels::new([("a", "1:b")])),
            canonical_key("x", &Labels::new([("a", ""), ("b", "")]))
        );
    }

    #[test]
    fn test_labels_serde() {
        let labels = Labels::new([("b", "1"), ("a", "2"), ("c", "2")]);
        let json = serde_json::to_string_pretty(&labels).unwrap();
        expect![[r#"
            {
              "a": "2",
              "b": "1",
              "c": "2"
            }"#]]
        .assert_eq(&json);

        let back: Labels = serde_json::from_str(r#"{"c":"2","a":"2","b":"1"}"#).unwrap();
        assert_eq!(back, labels);
    }
}
