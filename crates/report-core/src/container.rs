//! Append-only store of the named data items of one report run.

use std::collections::HashMap;

use crate::error::{ReportError, Result};
use crate::models::{DataItem, DataValue, ItemGroup, Scalar, Table};

/// Keyed, insertion-ordered store of [`DataItem`]s.
///
/// Items can be added but never replaced or removed: re-adding a name fails
/// with [`ReportError::DuplicateItem`].
#[derive(Debug, Default)]
pub struct DataContainer {
    items: Vec<DataItem>,
    index: HashMap<String, usize>,
}

impl DataContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new item.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        value: impl Into<DataValue>,
        group: Option<ItemGroup>,
    ) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ReportError::DuplicateItem(name));
        }
        tracing::debug!(item = %name, group = ?group, "data item added");
        self.index.insert(name.clone(), self.items.len());
        self.items.push(DataItem {
            name,
            value: value.into(),
            group,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&DataItem> {
        self.index
            .get(name)
            .map(|&idx| &self.items[idx])
            .ok_or_else(|| ReportError::ItemNotFound(name.to_string()))
    }

    pub fn get_value(&self, name: &str) -> Result<&DataValue> {
        self.get(name).map(|item| &item.value)
    }

    /// The named item's table; a scalar under that name is a malformed table.
    pub fn get_table(&self, name: &str) -> Result<&Table> {
        self.get_value(name)?
            .as_table()
            .ok_or_else(|| ReportError::malformed(name, "expected a table, found a scalar"))
    }

    /// The named item's scalar.
    pub fn get_scalar(&self, name: &str) -> Result<&Scalar> {
        self.get_value(name)?
            .as_scalar()
            .ok_or_else(|| ReportError::malformed(name, "expected a scalar, found a table"))
    }

    /// All items tagged with `group`, in insertion order. Empty when none are.
    pub fn get_by_group(&self, group: ItemGroup) -> Vec<&DataItem> {
        self.items
            .iter()
            .filter(|item| item.group == Some(group))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataItem> {
        self.items.iter()
    }
}
