use std::sync::Arc;

use parking_lot::RwLock;

use crate::atlas::{RegionKind, Structure};

/// A structure plus its runtime visibility flag.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureState {
    pub structure: Structure,
    pub visible: bool,
}

/// Thread-safe container mirroring the mutable state of the loaded atlas.
#[derive(Debug, Default)]
pub struct AtlasModel {
    entries: Arc<RwLock<Vec<StructureState>>>,
}

impl Clone for AtlasModel {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl AtlasModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model from parsed atlas structures; everything starts visible.
    pub fn from_structures(structures: Vec<Structure>) -> Self {
        let entries = structures
            .into_iter()
            .map(|structure| StructureState {
                structure,
                visible: true,
            })
            .collect();
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Returns a snapshot of every structure and its visibility.
    pub fn snapshot(&self) -> Vec<StructureState> {
        self.entries.read().clone()
    }

    /// Returns a clone of the requested structure.
    pub fn get(&self, name: &str) -> Option<Structure> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.structure.name == name)
            .map(|entry| entry.structure.clone())
    }

    /// Applies a mutation to the requested structure's state.
    pub fn update<F, R>(&self, name: &str, mut updater: F) -> Option<R>
    where
        F: FnMut(&mut StructureState) -> R,
    {
        let mut guard = self.entries.write();
        let entry = guard
            .iter_mut()
            .find(|entry| entry.structure.name == name)?;
        Some(updater(entry))
    }

    pub fn set_visible(&self, name: &str, visible: bool) -> bool {
        self.update(name, |entry| entry.visible = visible).is_some()
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.structure.name == name)
            .map(|entry| entry.visible)
            .unwrap_or(false)
    }

    /// Names of interactive structures in the given layer.
    pub fn names_in(&self, region: RegionKind) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.structure.region == Some(region))
            .map(|entry| entry.structure.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_structure(name: &str, region: Option<RegionKind>) -> Structure {
        Structure {
            name: name.to_string(),
            region,
            ..Structure::default()
        }
    }

    #[test]
    fn structures_start_visible() {
        let model = AtlasModel::from_structures(vec![make_structure(
            "Frontal Lobe",
            Some(RegionKind::Lobe),
        )]);
        assert!(model.is_visible("Frontal Lobe"));
        assert!(model.get("Frontal Lobe").is_some());
    }

    #[test]
    fn set_visible_updates_state() {
        let model = AtlasModel::from_structures(vec![make_structure(
            "Thalamus",
            Some(RegionKind::DeepStructure),
        )]);
        assert!(model.set_visible("Thalamus", false));
        assert!(!model.is_visible("Thalamus"));
    }

    #[test]
    fn update_returns_none_for_missing_structure() {
        let model = AtlasModel::new();
        assert!(!model.set_visible("Unknown", false));
        assert!(!model.is_visible("Unknown"));
    }

    #[test]
    fn names_in_filters_by_region() {
        let model = AtlasModel::from_structures(vec![
            make_structure("Frontal Lobe", Some(RegionKind::Lobe)),
            make_structure("Optic Nerve", Some(RegionKind::CranialNerve)),
            make_structure("Head Shell", None),
        ]);
        assert_eq!(model.names_in(RegionKind::Lobe), vec!["Frontal Lobe"]);
        assert!(model.names_in(RegionKind::DeepStructure).is_empty());
    }
}
