use serde::ser::{Serialize, SerializeMap, Serializer};

/// One harvested message: its header fields in the order they were found.
///
/// Keys are unique; when a source repeats a header, the first value wins.
/// A record only carries the fields its message actually had.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailRecord {
    fields: Vec<(String, String)>,
}

impl MailRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MailRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields: Vec<(String, String)> = Vec::new();
        for (k, v) in iter {
            let k = k.into();
            if fields.iter().any(|(existing, _)| *existing == k) {
                continue;
            }
            fields.push((k, v.into()));
        }
        Self { fields }
    }
}

impl Serialize for MailRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_discovery_order_and_first_value() {
        let rec: MailRecord = [
            ("Subject", "hello"),
            ("From", "a@example.com"),
            ("Subject", "ignored"),
            ("Date", "Mon, 1 Jan 2024 10:00:00 +0000"),
        ]
        .into_iter()
        .collect();

        assert_eq!(rec.len(), 3);
        assert_eq!(rec.keys().collect::<Vec<_>>(), ["Subject", "From", "Date"]);
        assert_eq!(rec.get("Subject"), Some("hello"));
        assert_eq!(rec.get("To"), None);
    }

    #[test]
    fn serializes_as_ordered_object() {
        let rec: MailRecord = [("Subject", "s"), ("From", "f")].into_iter().collect();
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"Subject":"s","From":"f"}"#);
    }
}
