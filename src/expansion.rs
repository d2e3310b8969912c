use std::collections::BTreeSet;

/// Keys of the rows whose detail is shown. Every change produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: BTreeSet<String>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&self, key: &str) -> Self {
        let mut expanded = self.expanded.clone();
        if !expanded.remove(key) {
            expanded.insert(key.to_string());
        }
        Self { expanded }
    }

    pub fn is_expanded(&self, key: &str) -> bool {
        self.expanded.contains(key)
    }

    /// Drops keys not among `keys`, used when the rows are replaced.
    pub fn retain_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        let present: BTreeSet<&str> = keys.into_iter().collect();
        Self {
            expanded: self
                .expanded
                .iter()
                .filter(|k| present.contains(k.as_str()))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}
