//! Serializable snapshots of the engine and the JSON state files built from them.
//!
//! File layout:
//! ```json
//! {
//!   "trucks": [
//!     {
//!       "dimensions": {"length": 10.0, "width": 10.0, "height": 10.0, "door_width": 10.0, "door_height": 10.0},
//!       "loaded_items": [
//!         {"type": "box", "dimensions": {...}, "weight": 1.0, "name": "a", "position": [0.0, 0.0, 0.0], "rotation": [0.0, 0.0, 0.0]}
//!       ]
//!     }
//!   ],
//!   "unplaced_items": [ ... ]
//! }
//! ```
//!
//! I/O failures are recoverable: the operation reports `false` and logs a warning.
//! A document that cannot be decoded (malformed JSON, unknown item type, invalid
//! data) is returned as an error and never touches the live engine.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::container::Container;
use crate::engine::PackingEngine;
use crate::error::{StateError, StateResult, ValidationError};
use crate::item::Item;
use crate::types::{Rotation, Vec3};

/// Complete snapshot of an engine: containers with their loads, then the unplaced pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub trucks: Vec<TruckState>,
    pub unplaced_items: Vec<Item>,
}

/// One container with its placements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TruckState {
    pub dimensions: TruckDimensions,
    pub loaded_items: Vec<LoadedItem>,
}

/// Container size and door aperture. The door defaults to the full face when absent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TruckDimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door_height: Option<f64>,
}

/// An item record extended with where and how it was placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadedItem {
    #[serde(flatten)]
    pub item: Item,
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Rotation,
}

impl EngineState {
    /// Reads and decodes a state file.
    pub fn read(path: impl AsRef<Path>) -> StateResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| StateError::io(path, err))?;
        Self::from_json(&raw)
    }

    /// Encodes the snapshot and writes it to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> StateResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|err| StateError::io(path, err))
    }

    pub fn from_json(raw: &str) -> StateResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> StateResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl TruckDimensions {
    fn from_container(container: &Container) -> Self {
        let door = container.door();
        Self {
            length: container.length(),
            width: container.width(),
            height: container.height(),
            door_width: Some(door.width),
            door_height: Some(door.height),
        }
    }

    fn to_container(self) -> Result<Container, ValidationError> {
        let container = Container::new(self.length, self.width, self.height)?;
        container.with_door(
            self.door_width.unwrap_or(self.width),
            self.door_height.unwrap_or(self.height),
        )
    }
}

impl PackingEngine {
    /// Builds an engine from a snapshot.
    pub fn from_state(state: EngineState) -> Result<Self, ValidationError> {
        let mut engine = Self::new();
        engine.restore_state(state)?;
        Ok(engine)
    }

    /// Produces a structural snapshot of the current contents.
    pub fn get_state(&self) -> EngineState {
        let trucks = self
            .containers
            .values()
            .map(|container| TruckState {
                dimensions: TruckDimensions::from_container(container),
                loaded_items: container
                    .placements()
                    .iter()
                    .map(|p| LoadedItem {
                        item: p.item.clone(),
                        position: p.position,
                        rotation: p.rotation,
                    })
                    .collect(),
            })
            .collect();

        EngineState {
            trucks,
            unplaced_items: self.unplaced.values().cloned().collect(),
        }
    }

    /// Replaces the engine contents with a snapshot.
    ///
    /// Every container is validated before any handle is allocated, so on error the
    /// engine is left exactly as it was. All items and containers get fresh handles.
    pub fn restore_state(&mut self, state: EngineState) -> Result<(), ValidationError> {
        let built = state
            .trucks
            .into_iter()
            .map(|truck| Ok((truck.dimensions.to_container()?, truck.loaded_items)))
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let mut containers = IndexMap::with_capacity(built.len());
        for (mut container, loaded_items) in built {
            for loaded in loaded_items {
                let id = self.allocate_item_id();
                container.add_item(id, loaded.item, loaded.position, loaded.rotation);
            }
            containers.insert(self.allocate_container_id(), container);
        }

        let mut unplaced = IndexMap::with_capacity(state.unplaced_items.len());
        for item in state.unplaced_items {
            unplaced.insert(self.allocate_item_id(), item);
        }

        self.containers = containers;
        self.unplaced = unplaced;
        Ok(())
    }

    /// Writes the current state to `path`, propagating failures.
    pub fn try_save_state(&self, path: impl AsRef<Path>) -> StateResult<()> {
        self.get_state().write(path)
    }

    /// Writes the current state to `path`.
    ///
    /// # Returns
    /// `true` on success; failures are logged and reported as `false`.
    pub fn save_state(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.try_save_state(path) {
            Ok(()) => {
                info!(path = %path.display(), "💾 State saved");
                true
            }
            Err(err) => {
                warn!(path = %path.display(), "⚠️ Could not save state: {}", err);
                false
            }
        }
    }

    /// Replaces the engine contents with the state stored in `path`.
    ///
    /// # Returns
    /// * `Ok(true)` - the state was installed
    /// * `Ok(false)` - the file could not be read (logged); the engine is unchanged
    /// * `Err(_)` - the file is corrupt; the engine is unchanged
    pub fn load_state(&mut self, path: impl AsRef<Path>) -> StateResult<bool> {
        let path = path.as_ref();
        let state = match EngineState::read(path) {
            Ok(state) => state,
            Err(err) if err.is_io() => {
                warn!(path = %path.display(), "⚠️ Could not load state: {}", err);
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        self.restore_state(state)?;
        info!(
            path = %path.display(),
            containers = self.container_count(),
            unplaced = self.unplaced_count(),
            "📦 State loaded"
        );
        Ok(true)
    }

    /// Compares the current contents with the state stored in `path`.
    ///
    /// The comparison is exact and order-sensitive: the same containers in the same
    /// order, the same placements in the same order, the same unplaced pool order.
    ///
    /// # Returns
    /// `Ok(false)` when the contents differ or the file could not be read,
    /// `Err(_)` when the file is corrupt.
    pub fn verify_state(&self, path: impl AsRef<Path>) -> StateResult<bool> {
        let path = path.as_ref();
        let mut scratch = PackingEngine::new();
        if !scratch.load_state(path)? {
            return Ok(false);
        }

        match self.first_difference(&scratch) {
            None => Ok(true),
            Some(difference) => {
                debug!(path = %path.display(), "State mismatch: {}", difference);
                Ok(false)
            }
        }
    }

    /// Describes the first structural difference to `other`, if any.
    fn first_difference(&self, other: &PackingEngine) -> Option<String> {
        if self.container_count() != other.container_count() {
            return Some(format!(
                "container count {} != {}",
                self.container_count(),
                other.container_count()
            ));
        }
        if self.unplaced_count() != other.unplaced_count() {
            return Some(format!(
                "unplaced count {} != {}",
                self.unplaced_count(),
                other.unplaced_count()
            ));
        }

        for (index, (a, b)) in self
            .containers
            .values()
            .zip(other.containers.values())
            .enumerate()
        {
            if TruckDimensions::from_container(a) != TruckDimensions::from_container(b) {
                return Some(format!("container {} dimensions differ", index));
            }
            if a.placements().len() != b.placements().len() {
                return Some(format!("container {} load count differs", index));
            }
            for (slot, (pa, pb)) in a.placements().iter().zip(b.placements()).enumerate() {
                if pa.item != pb.item {
                    return Some(format!("container {} placement {} item differs", index, slot));
                }
                if pa.position != pb.position || pa.rotation != pb.rotation {
                    return Some(format!(
                        "container {} placement {} position or rotation differs",
                        index, slot
                    ));
                }
            }
        }

        self.unplaced
            .values()
            .zip(other.unplaced.values())
            .position(|(a, b)| a != b)
            .map(|slot| format!("unplaced item {} differs", slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::tests::any_item;
    use proptest::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn nested_compound() -> Item {
        let inner = Item::new_compound(
            vec![
                (Item::new_box(1.0, 2.0, 3.0, 0.5, "brick").unwrap(), Vec3::zero()),
                (
                    Item::new_cylinder(2.0, 2.0, 0.25, "can").unwrap(),
                    Vec3::new(1.0, 0.0, 0.0),
                ),
            ],
            None,
            "inner",
        )
        .unwrap();
        Item::new_compound(
            vec![
                (inner, Vec3::zero()),
                (
                    Item::new_box(3.0, 2.0, 1.0, 1.5, "lid").unwrap(),
                    Vec3::new(0.0, 0.0, 3.0),
                ),
            ],
            Some(4.0),
            "kit",
        )
        .unwrap()
    }

    fn sample_engine() -> PackingEngine {
        let mut engine = PackingEngine::new();
        let truck = engine.add_container(
            Container::new(20.0, 8.0, 9.0)
                .unwrap()
                .with_door(7.5, 8.5)
                .unwrap(),
        );
        engine.add_container(Container::new(10.0, 10.0, 10.0).unwrap());
        let kit = engine.add_item(nested_compound());
        engine.add_item(Item::new_cylinder(3.0, 4.0, 2.0, "drum").unwrap());
        engine.add_item(Item::new_box(2.5, 2.5, 2.5, 1.25, "crate").unwrap());
        assert!(engine.place_item(kit, truck, Vec3::new(1.0, 0.5, 0.0), Vec3::new(0.0, 0.0, 90.0)));
        engine
    }

    #[test]
    fn get_state_uses_documented_layout() {
        let state = sample_engine().get_state();
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(
            value["trucks"][0]["dimensions"],
            json!({"length": 20.0, "width": 8.0, "height": 9.0, "door_width": 7.5, "door_height": 8.5})
        );
        let loaded = &value["trucks"][0]["loaded_items"][0];
        assert_eq!(loaded["type"], "compound");
        assert_eq!(loaded["name"], "kit");
        assert_eq!(loaded["position"], json!([1.0, 0.5, 0.0]));
        assert_eq!(loaded["rotation"], json!([0.0, 0.0, 90.0]));
        assert_eq!(value["trucks"][1]["loaded_items"], json!([]));
        assert_eq!(value["unplaced_items"][0]["type"], "cylinder");
        assert_eq!(value["unplaced_items"][1]["type"], "box");
    }

    #[test]
    fn save_load_verify_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let engine = sample_engine();

        assert!(engine.save_state(&path));

        let mut restored = PackingEngine::new();
        assert!(restored.load_state(&path).unwrap());
        assert!(restored.verify_state(&path).unwrap());
        assert!(engine.verify_state(&path).unwrap());
        assert_eq!(restored.get_state(), engine.get_state());
    }

    #[test]
    fn round_trip_of_empty_engine() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let engine = PackingEngine::new();

        assert!(engine.save_state(&path));
        let mut restored = sample_engine();
        assert!(restored.load_state(&path).unwrap());
        assert_eq!(restored.container_count(), 0);
        assert_eq!(restored.unplaced_count(), 0);
        assert!(restored.verify_state(&path).unwrap());
    }

    #[test]
    fn verify_is_order_sensitive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut engine = PackingEngine::new();
        engine.add_container(Container::new(10.0, 10.0, 10.0).unwrap());
        let a = Item::new_box(1.0, 1.0, 1.0, 1.0, "a").unwrap();
        let b = Item::new_box(2.0, 2.0, 2.0, 1.0, "b").unwrap();
        engine.add_items(vec![a.clone(), b.clone()]);
        assert!(engine.save_state(&path));

        let mut swapped = PackingEngine::new();
        swapped.add_container(Container::new(10.0, 10.0, 10.0).unwrap());
        swapped.add_items(vec![b, a]);

        assert!(engine.verify_state(&path).unwrap());
        assert!(!swapped.verify_state(&path).unwrap());
    }

    #[test]
    fn verify_detects_moved_placement() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let engine = sample_engine();
        assert!(engine.save_state(&path));

        let mut moved = sample_engine();
        moved.reset();
        let kit = moved.item_id_at(2).unwrap();
        let truck = moved.container_id_at(0).unwrap();
        assert!(moved.place_item(kit, truck, Vec3::zero(), Vec3::new(0.0, 0.0, 90.0)));

        assert!(!moved.verify_state(&path).unwrap());
    }

    #[test]
    fn loaded_items_are_addressable_by_fresh_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let engine = sample_engine();
        assert!(engine.save_state(&path));

        let mut restored = PackingEngine::new();
        assert!(restored.load_state(&path).unwrap());
        let truck = restored.container_id_at(1).unwrap();
        let drum = restored.item_id_at(0).unwrap();
        assert_eq!(restored.unplaced_item(drum).map(Item::name), Some("drum"));
        assert!(restored.place_item(drum, truck, Vec3::zero(), Vec3::zero()));

        // reset brings the loaded placement back too
        restored.reset();
        assert_eq!(restored.unplaced_count(), 3);
    }

    #[test]
    fn missing_file_is_a_soft_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let mut engine = sample_engine();
        let before = engine.get_state();

        assert!(!engine.load_state(&path).unwrap());
        assert!(!engine.verify_state(&path).unwrap());
        assert_eq!(engine.get_state(), before);
    }

    #[test]
    fn save_to_unwritable_path_reports_false() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("state.json");
        assert!(!sample_engine().save_state(&path));
        assert!(sample_engine().try_save_state(&path).unwrap_err().is_io());
    }

    #[test]
    fn unknown_item_type_is_fatal_and_leaves_engine_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        let doc = json!({
            "trucks": [{"dimensions": {"length": 5, "width": 5, "height": 5}, "loaded_items": []}],
            "unplaced_items": [{"type": "sphere", "radius": 1.0, "weight": 1.0, "name": "ball"}]
        });
        fs::write(&path, doc.to_string()).unwrap();

        let mut engine = sample_engine();
        let before = engine.get_state();
        let err = engine.load_state(&path).unwrap_err();

        assert!(matches!(err, StateError::Corrupt(_)));
        assert!(err.to_string().contains("sphere"));
        assert_eq!(engine.get_state(), before);
        assert!(engine.verify_state(&path).is_err());
    }

    #[test]
    fn invalid_container_is_fatal_and_leaves_engine_untouched() {
        let doc = json!({
            "trucks": [
                {
                    "dimensions": {"length": 5, "width": 5, "height": 5},
                    "loaded_items": [{
                        "type": "box",
                        "dimensions": {"length": 1, "width": 1, "height": 1},
                        "name": "a",
                        "position": [0, 0, 0]
                    }]
                },
                {"dimensions": {"length": 0, "width": 5, "height": 5}, "loaded_items": []}
            ],
            "unplaced_items": []
        });
        let state: EngineState = serde_json::from_value(doc).unwrap();
        let mut engine = sample_engine();
        let mut untouched = engine.clone();
        let before = engine.get_state();

        assert!(engine.restore_state(state).is_err());
        assert_eq!(engine.get_state(), before);

        // No handles were consumed by the failed restore.
        let next_item = Item::new_box(1.0, 1.0, 1.0, 1.0, "next").unwrap();
        assert_eq!(engine.add_item(next_item.clone()), untouched.add_item(next_item));
    }

    #[test]
    fn door_defaults_to_full_face_when_missing() {
        let doc = json!({
            "trucks": [{
                "dimensions": {"length": 12, "width": 6, "height": 7},
                "loaded_items": [{
                    "type": "box",
                    "dimensions": {"length": 1, "width": 1, "height": 1},
                    "weight": 1,
                    "name": "a",
                    "position": [0, 0, 0],
                    "rotation": [0, 0, 0]
                }]
            }],
            "unplaced_items": []
        });
        let state: EngineState = serde_json::from_value(doc).unwrap();
        let engine = PackingEngine::from_state(state).unwrap();
        let (_, truck) = engine.containers().next().unwrap();

        assert_eq!(truck.door().width, 6.0);
        assert_eq!(truck.door().height, 7.0);
        assert_eq!(truck.placements().len(), 1);
        assert_eq!(truck.placements()[0].item.name(), "a");
    }

    #[test]
    fn json_string_round_trip() {
        let state = sample_engine().get_state();
        let raw = state.to_json().unwrap();
        assert_eq!(EngineState::from_json(&raw).unwrap(), state);
        assert!(EngineState::from_json("{\"trucks\": 3}").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn any_engine_survives_save_load_verify(
            items in prop::collection::vec((any_item(), 0.0f64..1.0, any::<bool>()), 0..8),
        ) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("state.json");
            let mut engine = PackingEngine::new();
            let trucks = [
                engine.add_container(Container::new(1000.0, 100.0, 100.0).unwrap()),
                engine.add_container(
                    Container::new(1000.0, 100.0, 100.0)
                        .unwrap()
                        .with_door(80.0, 90.0)
                        .unwrap(),
                ),
            ];

            // Slots 60 apart along x never overlap: no generated item is that long.
            for (slot, (item, jitter, place)) in items.into_iter().enumerate() {
                let id = engine.add_item(item);
                if place {
                    let position = Vec3::new((slot / 2) as f64 * 60.0 + jitter, jitter, 0.0);
                    let rotation = Vec3::new(0.0, 0.0, jitter * 90.0);
                    prop_assert!(engine.place_item(id, trucks[slot % 2], position, rotation));
                }
            }

            prop_assert!(engine.save_state(&path));
            let mut restored = PackingEngine::new();
            prop_assert!(restored.load_state(&path).unwrap());
            prop_assert!(restored.verify_state(&path).unwrap());
            prop_assert!(engine.verify_state(&path).unwrap());
            prop_assert_eq!(restored.get_state(), engine.get_state());
        }
    }
}
