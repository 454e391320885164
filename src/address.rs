use serde::Serialize;
use std::fmt;

/// The seven location fields of a Price Paid record, in key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub paon: String,
    pub saon: String,
    pub street: String,
    pub locality: String,
    pub city: String,
    pub district: String,
    pub county: String,
}

impl Location {
    fn components(&self) -> [&str; 7] {
        [
            &self.paon,
            &self.saon,
            &self.street,
            &self.locality,
            &self.city,
            &self.district,
            &self.county,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyLayout {
    #[default]
    Location,
    /// Appends the postcode as an eighth component.
    WithPostcode,
}

/// Grouping identity for an address. Empty components are kept so positions
/// line up; case and inner whitespace are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AddressKey(String);

impl AddressKey {
    pub fn from_location(location: &Location) -> Self {
        Self(location.components().join(" "))
    }

    pub fn build(location: &Location, postcode: &str, layout: KeyLayout) -> Self {
        let mut key = Self::from_location(location);
        if layout == KeyLayout::WithPostcode {
            key.0.push(' ');
            key.0.push_str(postcode);
        }
        key
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostcodeFilter {
    prefix: String,
}

impl PostcodeFilter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn accepts(&self, postcode: &str) -> bool {
        postcode.starts_with(&self.prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn springfield() -> Location {
        Location {
            paon: "10".into(),
            saon: "".into(),
            street: "High Street".into(),
            locality: "".into(),
            city: "Springfield".into(),
            district: "X".into(),
            county: "Y".into(),
        }
    }

    #[test]
    fn key_keeps_empty_components() {
        let key = AddressKey::from_location(&springfield());
        assert_eq!(key.as_str(), "10  High Street  Springfield X Y");
    }

    #[test]
    fn key_is_positional() {
        let mut moved = springfield();
        moved.saon = "10".into();
        moved.paon = "".into();

        assert_ne!(
            AddressKey::from_location(&springfield()),
            AddressKey::from_location(&moved)
        );
    }

    #[test]
    fn key_is_case_sensitive() {
        let mut lower = springfield();
        lower.street = "high street".into();

        assert_ne!(
            AddressKey::from_location(&springfield()),
            AddressKey::from_location(&lower)
        );
    }

    #[test]
    fn key_with_postcode_appends_it() {
        let key = AddressKey::build(&springfield(), "AB1 2CD", KeyLayout::WithPostcode);
        assert_eq!(key.as_str(), "10  High Street  Springfield X Y AB1 2CD");

        let plain = AddressKey::build(&springfield(), "AB1 2CD", KeyLayout::Location);
        assert_eq!(plain, AddressKey::from_location(&springfield()));
    }

    #[test]
    fn postcode_prefix_filter() {
        let filter = PostcodeFilter::new("SW1");

        assert!(filter.accepts("SW1A 1AA"));
        assert!(!filter.accepts("EC1"));
        assert!(!filter.accepts("sw1A 1AA"));
    }

    #[test]
    fn empty_prefix_accepts_everything() {
        let filter = PostcodeFilter::default();

        assert!(filter.accepts(""));
        assert!(filter.accepts("EC1"));
    }
}
