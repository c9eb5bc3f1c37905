//! Output field selection
//!
//! A [`FieldSet`] is either fixed by the caller (`fl` / `fields_name`) or
//! discovered from the data as pages stream in. Iteration order never
//! changes during an export: fixed sets keep the caller's order, discovered
//! sets keep first-seen order across all pages.

use indexmap::IndexSet;

/// Ordered, de-duplicated set of output column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    /// Field names in output order
    names: IndexSet<String>,
    /// Whether the set was fixed by the caller
    fixed: bool,
}

impl FieldSet {
    /// Create a fixed field set from caller-provided names
    ///
    /// Names are trimmed; blank names and duplicates are dropped.
    ///
    /// # Arguments
    /// * `names` - Field names in the requested order
    pub fn fixed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Self { names, fixed: true }
    }

    /// Create an empty field set that grows from observed records
    pub fn discovered() -> Self {
        Self {
            names: IndexSet::new(),
            fixed: false,
        }
    }

    /// Record the keys of one flattened record
    ///
    /// Unseen keys are appended in the order given. No-op for fixed sets.
    ///
    /// # Returns
    /// * `usize` - Number of newly added fields
    pub fn observe<'a, I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a String>,
    {
        if self.fixed {
            return 0;
        }
        let before = self.names.len();
        for key in keys {
            if !self.names.contains(key) {
                self.names.insert(key.clone());
            }
        }
        self.names.len() - before
    }

    /// Iterate field names in output order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether the set was fixed by the caller
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Field names as an owned list
    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}
