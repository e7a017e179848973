//! Group clustering of report items for the rendering boundary.

use std::collections::BTreeMap;

use report_core::models::{ItemDefinition, ItemGroup};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Report items arranged the way a template consumes them.
///
/// Ungrouped items and extra scalars are top-level entries keyed by name;
/// grouped items are nested under their group key. The `tags` group is always
/// present, possibly empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    extras: BTreeMap<String, String>,
    top_level: Vec<ItemDefinition>,
    groups: Vec<(ItemGroup, Vec<ItemDefinition>)>,
}

impl ReportLayout {
    /// Cluster `items`, keeping their order within each cluster.
    pub fn new(items: Vec<ItemDefinition>) -> Self {
        let mut top_level = Vec::new();
        let mut groups: Vec<(ItemGroup, Vec<ItemDefinition>)> = Vec::new();

        for item in items {
            match item.group {
                None => top_level.push(item),
                Some(group) => match groups.iter_mut().find(|(g, _)| *g == group) {
                    Some((_, members)) => members.push(item),
                    None => groups.push((group, vec![item])),
                },
            }
        }
        if !groups.iter().any(|(g, _)| *g == ItemGroup::Tags) {
            groups.push((ItemGroup::Tags, Vec::new()));
        }

        Self {
            extras: BTreeMap::new(),
            top_level,
            groups,
        }
    }

    /// Add a top-level scalar such as the report title.
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(name.into(), value.into());
        self
    }

    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }

    pub fn extra(&self, name: &str) -> Option<&str> {
        self.extras.get(name).map(String::as_str)
    }

    pub fn top_level(&self) -> &[ItemDefinition] {
        &self.top_level
    }

    /// Members of `group`, or `None` if no item carries it.
    pub fn group(&self, group: ItemGroup) -> Option<&[ItemDefinition]> {
        self.groups
            .iter()
            .find(|(g, _)| *g == group)
            .map(|(_, members)| members.as_slice())
    }

    /// Groups in first-seen order.
    pub fn groups(&self) -> impl Iterator<Item = (ItemGroup, &[ItemDefinition])> {
        self.groups.iter().map(|(g, m)| (*g, m.as_slice()))
    }
}

/// Items serialized as a `name → item` map.
struct ItemMap<'a>(&'a [ItemDefinition]);

impl Serialize for ItemMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for item in self.0 {
            map.serialize_entry(&item.name, item)?;
        }
        map.end()
    }
}

impl Serialize for ReportLayout {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.extras.len() + self.top_level.len() + self.groups.len();
        let mut map = serializer.serialize_map(Some(len))?;
        for (name, value) in &self.extras {
            map.serialize_entry(name, value)?;
        }
        for item in &self.top_level {
            map.serialize_entry(&item.name, item)?;
        }
        for (group, members) in &self.groups {
            map.serialize_entry(group.as_str(), &ItemMap(members))?;
        }
        map.end()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
