use serde::{Deserialize, Serialize};

use crate::authentication::Attributes;

/// Resolved identity of an authentication transaction.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, values: &[&str]) -> Self {
        self.attributes.insert(
            name.to_string(),
            values.iter().map(ToString::to_string).collect(),
        );
        self
    }

    pub fn attribute_values(&self, name: &str) -> &[String] {
        self.attributes.get(name).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_values() {
        let principal = Principal::new("casuser").with_attribute("memberOf", &["staff", "faculty"]);

        assert_eq!(principal.attribute_values("memberOf"), ["staff", "faculty"]);
        assert!(principal.attribute_values("mail").is_empty());
    }

    #[test]
    fn test_deserialize_without_attributes() {
        let principal: Principal = serde_json::from_str(r#"{"id": "alice"}"#).unwrap();
        assert_eq!(principal.id, "alice");
        assert!(principal.attributes.is_empty());
    }
}
