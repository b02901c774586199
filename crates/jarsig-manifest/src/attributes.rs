//! Attribute store: a case-insensitive key/value map.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::error::InvalidAttributeName;
use crate::name::AttributeName;

/// One section's attributes.
///
/// Keys compare without regard to ASCII case. Iteration follows the
/// case-insensitive key order, which keeps written manifests deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    map: BTreeMap<AttributeName, String>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`. Keys that are not valid attribute names are never present.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = AttributeName::new(key).ok()?;
        self.get_name(&key)
    }

    pub fn get_name(&self, key: &AttributeName) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a value, returning the previous one.
    ///
    /// Re-inserting a key spelled differently keeps the new spelling.
    pub fn put(&mut self, key: AttributeName, value: impl Into<String>) -> Option<String> {
        let previous = self.map.remove(&key);
        self.map.insert(key, value.into());
        previous
    }

    /// Validate `key` and insert.
    pub fn insert(
        &mut self,
        key: &str,
        value: impl Into<String>,
    ) -> Result<Option<String>, InvalidAttributeName> {
        let key = AttributeName::new(key)?;
        Ok(self.put(key, value))
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let key = AttributeName::new(key).ok()?;
        self.map.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.map.iter(),
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Merge `other` into `self`, later values winning.
    pub fn extend_from(&mut self, other: Attributes) {
        for (k, v) in other.map {
            self.put(k, v);
        }
    }
}

/// Iterator over `(name, value)` pairs.
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, AttributeName, String>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a AttributeName, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a AttributeName, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<(AttributeName, String)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (AttributeName, String)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.put(k, v);
        }
        attrs
    }
}
