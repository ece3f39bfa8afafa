//! The packing engine: the pool of unplaced items and the list of containers.
//!
//! Items and containers are addressed by opaque handles ([`ItemId`], [`ContainerId`])
//! allocated by the engine. Handles stay valid while other items are placed or the
//! engine is reset; they are invalidated only when the engine contents are replaced
//! by [`PackingEngine::restore_state`] or [`PackingEngine::load_state`].
//!
//! Every item is in exactly one of two states: unplaced (in the pool) or placed in one
//! container. The only transitions are a successful [`PackingEngine::place_item`]
//! and [`PackingEngine::reset`], which moves every placed item back at once.
//!
//! The engine holds no locks. Share it between tasks through
//! [`PackingService`](crate::service::PackingService).

use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::container::Container;
use crate::geometry::{Axis, exceeded_axis, first_collision, negative_axis};
use crate::item::Item;
use crate::types::{BoundingBox, Dimensional, Rotation, Vec3, Weighted};

/// Stable handle of an item owned by a [`PackingEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Stable handle of a container owned by a [`PackingEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "container#{}", self.0)
    }
}

/// Why a placement was rejected.
///
/// A rejection is a normal outcome, not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum PlacementRejection {
    UnknownItem(ItemId),
    UnknownContainer(ContainerId),
    NonFinitePosition,
    NegativeCoordinate(Axis),
    OutOfBounds(Axis),
    Collision { with: ItemId, name: String },
}

impl PlacementRejection {
    pub fn code(&self) -> &'static str {
        match self {
            PlacementRejection::UnknownItem(_) => "unknown_item",
            PlacementRejection::UnknownContainer(_) => "unknown_container",
            PlacementRejection::NonFinitePosition => "non_finite_position",
            PlacementRejection::NegativeCoordinate(_) => "negative_coordinate",
            PlacementRejection::OutOfBounds(_) => "out_of_bounds",
            PlacementRejection::Collision { .. } => "collision",
        }
    }
}

impl fmt::Display for PlacementRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementRejection::UnknownItem(id) => write!(f, "{} is not an unplaced item", id),
            PlacementRejection::UnknownContainer(id) => write!(f, "{} does not exist", id),
            PlacementRejection::NonFinitePosition => write!(f, "position is not finite"),
            PlacementRejection::NegativeCoordinate(axis) => {
                write!(f, "position is negative along the {}", axis)
            }
            PlacementRejection::OutOfBounds(axis) => {
                write!(f, "item exceeds the container {}", axis)
            }
            PlacementRejection::Collision { with, name } => {
                write!(f, "item collides with '{}' ({})", name, with)
            }
        }
    }
}

/// Aggregated figures about the current engine contents.
#[derive(Clone, Debug, PartialEq)]
pub struct PackingSummary {
    pub placed_items: usize,
    pub unplaced_items: usize,
    /// Sum of true item volumes across all containers.
    pub packed_volume: f64,
    pub packed_weight: f64,
    /// Utilization in percent, one entry per container in container order.
    pub container_utilization: Vec<f64>,
}

impl PackingSummary {
    /// Indicates whether every item is placed.
    pub fn is_complete(&self) -> bool {
        self.unplaced_items == 0
    }

    /// Calculates the average utilization of all containers.
    pub fn average_utilization(&self) -> f64 {
        if self.container_utilization.is_empty() {
            return 0.0;
        }
        self.container_utilization.iter().sum::<f64>() / self.container_utilization.len() as f64
    }
}

/// Owns the unplaced-item pool and the containers.
#[derive(Clone, Debug, Default)]
pub struct PackingEngine {
    pub(crate) unplaced: IndexMap<ItemId, Item>,
    pub(crate) containers: IndexMap<ContainerId, Container>,
    next_key: u64,
}

impl PackingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_key(&mut self) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    pub(crate) fn allocate_item_id(&mut self) -> ItemId {
        ItemId(self.next_key())
    }

    pub(crate) fn allocate_container_id(&mut self) -> ContainerId {
        ContainerId(self.next_key())
    }

    /// Appends a container and returns its handle.
    pub fn add_container(&mut self, container: Container) -> ContainerId {
        let id = self.allocate_container_id();
        self.containers.insert(id, container);
        id
    }

    /// Appends an item to the unplaced pool and returns its handle.
    pub fn add_item(&mut self, item: Item) -> ItemId {
        let id = self.allocate_item_id();
        self.unplaced.insert(id, item);
        id
    }

    /// Appends several items to the unplaced pool, preserving their order.
    pub fn add_items(&mut self, items: impl IntoIterator<Item = Item>) -> Vec<ItemId> {
        items.into_iter().map(|item| self.add_item(item)).collect()
    }

    /// Unplaced items in pool order.
    pub fn unplaced_items(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        self.unplaced.iter().map(|(id, item)| (*id, item))
    }

    pub fn unplaced_item(&self, id: ItemId) -> Option<&Item> {
        self.unplaced.get(&id)
    }

    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }

    /// Containers in the order they were added.
    pub fn containers(&self) -> impl Iterator<Item = (ContainerId, &Container)> {
        self.containers.iter().map(|(id, c)| (*id, c))
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(&id)
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Handle of the item currently at `index` in the unplaced pool.
    pub fn item_id_at(&self, index: usize) -> Option<ItemId> {
        self.unplaced.get_index(index).map(|(id, _)| *id)
    }

    /// Handle of the container at `index`.
    pub fn container_id_at(&self, index: usize) -> Option<ContainerId> {
        self.containers.get_index(index).map(|(id, _)| *id)
    }

    /// Checks a placement and reports why it is rejected.
    ///
    /// Checks, in order: both handles resolve, the position is finite and not
    /// negative, the item's bounding box stays inside the container, and the box does
    /// not overlap any item already in the target container on all three axes.
    ///
    /// `rotation` is accepted for interface symmetry but does not change the geometry.
    pub fn check_placement(
        &self,
        item: ItemId,
        container: ContainerId,
        position: Vec3,
        _rotation: Rotation,
    ) -> Result<(), PlacementRejection> {
        let Some(candidate) = self.unplaced.get(&item) else {
            return Err(PlacementRejection::UnknownItem(item));
        };
        let Some(target) = self.containers.get(&container) else {
            return Err(PlacementRejection::UnknownContainer(container));
        };

        if !position.is_finite() {
            return Err(PlacementRejection::NonFinitePosition);
        }
        if let Some(axis) = negative_axis(&position) {
            return Err(PlacementRejection::NegativeCoordinate(axis));
        }

        let dims = candidate.dimensions();
        if let Some(axis) = exceeded_axis(&position, &dims, &target.dimensions()) {
            return Err(PlacementRejection::OutOfBounds(axis));
        }

        let bbox = BoundingBox::from_position_and_dims(position, dims);
        if let Some(hit) = first_collision(&bbox, target.placements()) {
            return Err(PlacementRejection::Collision {
                with: hit.id,
                name: hit.item.name().to_string(),
            });
        }

        Ok(())
    }

    /// Checks whether the item can be placed at `position` without mutating anything.
    pub fn validate_placement(
        &self,
        item: ItemId,
        container: ContainerId,
        position: Vec3,
        rotation: Rotation,
    ) -> bool {
        match self.check_placement(item, container, position, rotation) {
            Ok(()) => true,
            Err(rejection) => {
                debug!(
                    %item,
                    %container,
                    position = ?position.as_array(),
                    reason = rejection.code(),
                    "placement rejected: {}",
                    rejection
                );
                false
            }
        }
    }

    /// Validates and commits a placement.
    ///
    /// On success the item leaves the unplaced pool (the remaining pool keeps its
    /// order) and is appended to the container. Returns `false` without mutation
    /// on any failure.
    pub fn place_item(
        &mut self,
        item: ItemId,
        container: ContainerId,
        position: Vec3,
        rotation: Rotation,
    ) -> bool {
        debug!(%item, %container, position = ?position.as_array(), "attempting placement");
        if !self.validate_placement(item, container, position, rotation) {
            return false;
        }

        let Some(target) = self.containers.get_mut(&container) else {
            return false;
        };
        let Some(object) = self.unplaced.shift_remove(&item) else {
            return false;
        };
        target.add_item(item, object, position, rotation);
        true
    }

    /// Positional variant of [`place_item`](Self::place_item).
    ///
    /// Indices are resolved at call time against the current pool and container list.
    pub fn place_item_at(
        &mut self,
        item_index: usize,
        container_index: usize,
        position: Vec3,
        rotation: Rotation,
    ) -> bool {
        match (
            self.item_id_at(item_index),
            self.container_id_at(container_index),
        ) {
            (Some(item), Some(container)) => self.place_item(item, container, position, rotation),
            _ => {
                debug!(
                    item_index,
                    container_index,
                    unplaced = self.unplaced.len(),
                    containers = self.containers.len(),
                    "placement rejected: index out of range"
                );
                false
            }
        }
    }

    /// Moves every placed item back into the unplaced pool.
    ///
    /// Items are appended in container order, then placement order, and keep their
    /// handles. Containers stay configured but empty.
    pub fn reset(&mut self) {
        for container in self.containers.values_mut() {
            for placement in container.take_placements() {
                self.unplaced.insert(placement.id, placement.item);
            }
        }
    }

    pub fn summary(&self) -> PackingSummary {
        let placed_items = self
            .containers
            .values()
            .map(|c| c.placements().len())
            .sum();

        PackingSummary {
            placed_items,
            unplaced_items: self.unplaced.len(),
            packed_volume: self.containers.values().map(Container::used_volume).sum(),
            packed_weight: self.containers.values().map(Container::total_weight).sum(),
            container_utilization: self
                .containers
                .values()
                .map(Container::utilization_percent)
                .collect(),
        }
    }

    /// Total weight of the unplaced pool.
    pub fn unplaced_weight(&self) -> f64 {
        self.unplaced.values().map(Item::weight).sum()
    }
}
