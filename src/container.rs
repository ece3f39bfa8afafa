//! Destination containers ("trucks") and the placements recorded in them.
//!
//! A [`Container`] is a plain store: [`Container::add_item`] appends a placement
//! without any checks. All geometric validation happens in the
//! [`PackingEngine`](crate::engine::PackingEngine), which lets a container be rebuilt
//! verbatim from a state file.

use crate::engine::ItemId;
use crate::error::ValidationError;
use crate::item::{Item, LengthUnit};
use crate::types::{BoundingBox, Dimensional, EPSILON_GENERAL, Rotation, Vec3, Weighted};

fn validate_container_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// An item recorded at a position inside a container.
///
/// `rotation` is an inert annotation, see [`Rotation`].
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub id: ItemId,
    pub item: Item,
    pub position: Vec3,
    pub rotation: Rotation,
}

impl Placement {
    /// Bounding box of the placed item in container coordinates.
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.position, self.item.dimensions())
    }
}

/// Door aperture of a container (width × height).
///
/// Recorded for future feasibility checks; placement validation does not consult it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DoorSize {
    pub width: f64,
    pub height: f64,
}

/// A fixed-size box that items are loaded into.
///
/// # Fields
/// * `dims` - Length (x), width (y) and height (z)
/// * `door` - Door aperture, defaults to the full width × height face
/// * `loaded` - Placements in the order they were made
#[derive(Clone, Debug, PartialEq)]
pub struct Container {
    dims: Vec3,
    door: DoorSize,
    loaded: Vec<Placement>,
}

impl Container {
    /// Creates a new empty container with a full-face door.
    ///
    /// # Examples
    /// ```
    /// use truck_loader::container::Container;
    ///
    /// let truck = Container::new(10.0, 10.0, 10.0).unwrap();
    /// assert_eq!(truck.door().width, 10.0);
    /// assert!(Container::new(10.0, 0.0, 10.0).is_err());
    /// ```
    pub fn new(length: f64, width: f64, height: f64) -> Result<Self, ValidationError> {
        validate_container_dimension(length, "Container length")?;
        validate_container_dimension(width, "Container width")?;
        validate_container_dimension(height, "Container height")?;

        Ok(Self {
            dims: Vec3::new(length, width, height),
            door: DoorSize { width, height },
            loaded: Vec::new(),
        })
    }

    /// Creates a container whose dimensions are given in `unit`; stored in inches.
    pub fn with_units(
        length: f64,
        width: f64,
        height: f64,
        unit: LengthUnit,
    ) -> Result<Self, ValidationError> {
        Self::new(
            unit.to_inches(length),
            unit.to_inches(width),
            unit.to_inches(height),
        )
    }

    /// Sets a narrower door aperture.
    pub fn with_door(mut self, width: f64, height: f64) -> Result<Self, ValidationError> {
        validate_container_dimension(width, "Door width")?;
        validate_container_dimension(height, "Door height")?;
        self.door = DoorSize { width, height };
        Ok(self)
    }

    /// Sets a narrower door aperture given in `unit`; stored in inches.
    pub fn with_door_units(
        self,
        width: f64,
        height: f64,
        unit: LengthUnit,
    ) -> Result<Self, ValidationError> {
        self.with_door(unit.to_inches(width), unit.to_inches(height))
    }

    /// Appends a placement record. Performs no validation.
    pub fn add_item(&mut self, id: ItemId, item: Item, position: Vec3, rotation: Rotation) {
        self.loaded.push(Placement {
            id,
            item,
            position,
            rotation,
        });
    }

    pub fn placements(&self) -> &[Placement] {
        &self.loaded
    }

    pub fn door(&self) -> DoorSize {
        self.door
    }

    pub fn length(&self) -> f64 {
        self.dims.x
    }

    pub fn width(&self) -> f64 {
        self.dims.y
    }

    pub fn height(&self) -> f64 {
        self.dims.z
    }

    /// Removes and returns all placements, leaving the container empty.
    pub(crate) fn take_placements(&mut self) -> Vec<Placement> {
        std::mem::take(&mut self.loaded)
    }

    /// Calculates the total weight of all placed items.
    pub fn total_weight(&self) -> f64 {
        self.loaded.iter().map(|p| p.item.weight()).sum()
    }

    /// Calculates the used volume (true item volumes, not bounding boxes).
    pub fn used_volume(&self) -> f64 {
        self.loaded.iter().map(|p| p.item.volume()).sum()
    }

    pub fn total_volume(&self) -> f64 {
        self.dims.volume()
    }

    /// Calculates the utilization of the container in percent.
    ///
    /// # Returns
    /// Percentage value of volume usage (0.0 to 100.0)
    pub fn utilization_percent(&self) -> f64 {
        let total = self.total_volume();
        if total <= 0.0 {
            return 0.0;
        }
        (self.used_volume() / total) * 100.0
    }

    /// Checks whether the item's cross-section passes through the door unrotated.
    pub fn door_admits(&self, item: &Item) -> bool {
        let dims = item.dimensions();
        dims.y <= self.door.width + EPSILON_GENERAL && dims.z <= self.door.height + EPSILON_GENERAL
    }
}

impl Dimensional for Container {
    fn dimensions(&self) -> Vec3 {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PackingEngine;

    #[test]
    fn door_defaults_to_full_face() {
        let truck = Container::new(20.0, 8.0, 9.0).unwrap();
        assert_eq!(truck.door(), DoorSize { width: 8.0, height: 9.0 });

        let narrowed = truck.with_door(6.0, 7.0).unwrap();
        assert_eq!(narrowed.door(), DoorSize { width: 6.0, height: 7.0 });
    }

    #[test]
    fn rejects_invalid_dimensions() {
        assert!(Container::new(-1.0, 1.0, 1.0).is_err());
        assert!(Container::new(1.0, 1.0, f64::NAN).is_err());
        assert!(
            Container::new(1.0, 1.0, 1.0)
                .unwrap()
                .with_door(0.0, 1.0)
                .is_err()
        );
    }

    #[test]
    fn add_item_does_not_validate() {
        let mut engine = PackingEngine::new();
        let id = engine.add_item(Item::new_box(50.0, 50.0, 50.0, 1.0, "huge").unwrap());
        let mut truck = Container::new(10.0, 10.0, 10.0).unwrap();

        let item = engine.unplaced_item(id).cloned().unwrap();
        truck.add_item(id, item, Vec3::new(-5.0, 0.0, 0.0), Vec3::zero());

        assert_eq!(truck.placements().len(), 1);
        assert_eq!(truck.placements()[0].position, Vec3::new(-5.0, 0.0, 0.0));
    }

    #[test]
    fn utilization_uses_true_volumes() {
        let mut engine = PackingEngine::new();
        let drum = Item::new_cylinder(2.0, 10.0, 3.0, "drum").unwrap();
        let id = engine.add_item(drum.clone());
        let mut truck = Container::new(10.0, 10.0, 10.0).unwrap();
        truck.add_item(id, drum.clone(), Vec3::zero(), Vec3::zero());

        assert!((truck.used_volume() - drum.volume()).abs() < 1e-9);
        assert!((truck.utilization_percent() - drum.volume() / 10.0).abs() < 1e-9);
        assert!((truck.total_weight() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn door_admits_checks_cross_section() {
        let truck = Container::new(20.0, 8.0, 8.0)
            .unwrap()
            .with_door(5.0, 6.0)
            .unwrap();
        assert!(truck.door_admits(&Item::new_box(15.0, 5.0, 6.0, 1.0, "long").unwrap()));
        assert!(!truck.door_admits(&Item::new_box(2.0, 7.0, 2.0, 1.0, "wide").unwrap()));
    }

    #[test]
    fn unit_constructors_convert_body_and_door() {
        let truck = Container::with_units(53.0, 8.5, 9.0, LengthUnit::Feet).unwrap();
        assert!((truck.length() - 636.0).abs() < 1e-9);
        assert!((truck.width() - 102.0).abs() < 1e-9);
        assert!((truck.height() - 108.0).abs() < 1e-9);
        assert_eq!(truck.door(), DoorSize { width: truck.width(), height: truck.height() });

        let narrowed = truck.with_door_units(200.0, 250.0, LengthUnit::Centimeters).unwrap();
        assert!((narrowed.door().width - 200.0 / 2.54).abs() < 1e-9);
        assert!((narrowed.door().height - 250.0 / 2.54).abs() < 1e-9);
        assert!(narrowed.door_admits(&Item::new_box(100.0, 70.0, 90.0, 1.0, "pallet").unwrap()));
    }
}
