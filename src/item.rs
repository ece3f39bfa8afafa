//! Items that can be loaded into a truck.
//!
//! An [`Item`] is a closed set of shapes:
//! - `Box`: explicit length × width × height
//! - `Cylinder`: diameter and height, packed as its diameter × diameter × height box
//! - `Compound`: sub-items at fixed offsets, packed as the union of their boxes
//!
//! All shapes are immutable once constructed. Construction (including deserialization
//! from a state file) validates the data, so every `Item` in the engine is well formed.
//!
//! Serialized form (internally tagged by `type`):
//! ```json
//! {"type": "box", "dimensions": {"length": 4.0, "width": 4.0, "height": 4.0}, "weight": 1.0, "name": "crate"}
//! {"type": "cylinder", "diameter": 2.0, "height": 3.0, "weight": 1.0, "name": "drum"}
//! {"type": "compound", "items": [...], "relative_positions": [[0.0, 0.0, 0.0]], "weight": 2.0, "name": "kit"}
//! ```

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{BoundingBox, Dimensional, Vec3, Weighted};

const DEFAULT_WEIGHT: f64 = 1.0;
const DEFAULT_NAME: &str = "unnamed";
const DEFAULT_COMPOUND_NAME: &str = "compound";

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_weight_value(value: f64) -> Result<(), ValidationError> {
    if value < 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "Weight must be finite and not negative, got: {}",
            value
        )));
    }
    Ok(())
}

/// Length units accepted by the unit-aware constructors.
///
/// The engine itself is unit-agnostic; these helpers normalize to inches so that
/// trucks and items from differently specified sources can share one engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthUnit {
    Inches,
    Centimeters,
    Meters,
    Feet,
}

impl LengthUnit {
    /// Converts a value in this unit to inches.
    pub fn to_inches(self, value: f64) -> f64 {
        match self {
            LengthUnit::Inches => value,
            LengthUnit::Centimeters => value / 2.54,
            LengthUnit::Meters => value / 0.0254,
            LengthUnit::Feet => value * 12.0,
        }
    }
}

/// Weight units accepted by the unit-aware constructors, normalized to kilograms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightUnit {
    Kilograms,
    Pounds,
}

impl WeightUnit {
    const POUNDS_PER_KILOGRAM: f64 = 2.20462;

    /// Converts a value in this unit to kilograms.
    pub fn to_kilograms(self, value: f64) -> f64 {
        match self {
            WeightUnit::Kilograms => value,
            WeightUnit::Pounds => value / Self::POUNDS_PER_KILOGRAM,
        }
    }
}

/// Length × width × height triple as it appears in state files.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    #[inline]
    pub fn as_vec3(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.length, "Length")?;
        validate_dimension(self.width, "Width")?;
        validate_dimension(self.height, "Height")?;
        Ok(())
    }
}

/// A simple box-shaped item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BoxRecord")]
pub struct BoxItem {
    dimensions: Dimensions,
    weight: f64,
    name: String,
}

#[derive(Deserialize)]
struct BoxRecord {
    dimensions: Dimensions,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default = "default_name")]
    name: String,
}

impl TryFrom<BoxRecord> for BoxItem {
    type Error = ValidationError;

    fn try_from(record: BoxRecord) -> Result<Self, Self::Error> {
        BoxItem::new(record.dimensions, record.weight, record.name)
    }
}

impl BoxItem {
    /// Creates a box after validating its dimensions and weight.
    ///
    /// # Examples
    /// ```
    /// use truck_loader::item::{BoxItem, Dimensions};
    ///
    /// assert!(BoxItem::new(Dimensions::new(4.0, 4.0, 4.0), 2.0, "crate").is_ok());
    /// assert!(BoxItem::new(Dimensions::new(-4.0, 4.0, 4.0), 2.0, "crate").is_err());
    /// ```
    pub fn new(
        dimensions: Dimensions,
        weight: f64,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        dimensions.validate()?;
        validate_weight_value(weight)?;
        Ok(Self {
            dimensions,
            weight,
            name: name.into(),
        })
    }

    /// Creates a box from dimensions in `unit` and a weight in `weight_unit`;
    /// stored in inches and kilograms.
    pub fn with_units(
        dimensions: Dimensions,
        unit: LengthUnit,
        weight: f64,
        weight_unit: WeightUnit,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let converted = Dimensions::new(
            unit.to_inches(dimensions.length),
            unit.to_inches(dimensions.width),
            unit.to_inches(dimensions.height),
        );
        Self::new(converted, weight_unit.to_kilograms(weight), name)
    }

    pub fn box_dimensions(&self) -> Dimensions {
        self.dimensions
    }
}

/// A cylindrical item standing upright.
///
/// Packs as its bounding box, but reports the true cylinder volume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CylinderRecord")]
pub struct CylinderItem {
    diameter: f64,
    height: f64,
    weight: f64,
    name: String,
}

#[derive(Deserialize)]
struct CylinderRecord {
    diameter: f64,
    height: f64,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default = "default_name")]
    name: String,
}

impl TryFrom<CylinderRecord> for CylinderItem {
    type Error = ValidationError;

    fn try_from(record: CylinderRecord) -> Result<Self, Self::Error> {
        CylinderItem::new(record.diameter, record.height, record.weight, record.name)
    }
}

impl CylinderItem {
    pub fn new(
        diameter: f64,
        height: f64,
        weight: f64,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        validate_dimension(diameter, "Diameter")?;
        validate_dimension(height, "Height")?;
        validate_weight_value(weight)?;
        Ok(Self {
            diameter,
            height,
            weight,
            name: name.into(),
        })
    }

    /// Creates a cylinder from sizes in `unit` and a weight in `weight_unit`.
    pub fn with_units(
        diameter: f64,
        height: f64,
        unit: LengthUnit,
        weight: f64,
        weight_unit: WeightUnit,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::new(
            unit.to_inches(diameter),
            unit.to_inches(height),
            weight_unit.to_kilograms(weight),
            name,
        )
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

/// An item built from sub-items at offsets relative to the compound origin.
///
/// Sub-items may themselves be compounds. The bounding box is recomputed on every
/// call by walking the tree; the volume is the sum of the sub-item volumes, which can
/// be much smaller than the bounding-box volume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CompoundRecord")]
pub struct CompoundItem {
    items: Vec<Item>,
    relative_positions: Vec<Vec3>,
    weight: f64,
    name: String,
}

#[derive(Deserialize)]
struct CompoundRecord {
    items: Vec<Item>,
    relative_positions: Vec<Vec3>,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default = "default_compound_name")]
    name: String,
}

impl TryFrom<CompoundRecord> for CompoundItem {
    type Error = ValidationError;

    fn try_from(record: CompoundRecord) -> Result<Self, Self::Error> {
        CompoundItem::new(
            record.items,
            record.relative_positions,
            record.weight,
            record.name,
        )
    }
}

impl CompoundItem {
    /// Creates a compound item.
    ///
    /// `weight` defaults to the sum of the sub-item weights.
    ///
    /// # Returns
    /// `Err` if the number of sub-items and offsets differ, an offset is not finite,
    /// or the weight is invalid.
    pub fn new(
        items: Vec<Item>,
        relative_positions: Vec<Vec3>,
        weight: Option<f64>,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if items.len() != relative_positions.len() {
            return Err(ValidationError::InvalidConfiguration(format!(
                "Number of items ({}) must match number of positions ({})",
                items.len(),
                relative_positions.len()
            )));
        }
        if let Some(offset) = relative_positions.iter().find(|p| !p.is_finite()) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "Relative position must be finite, got: {:?}",
                offset.as_array()
            )));
        }

        let weight = weight.unwrap_or_else(|| items.iter().map(Item::weight).sum());
        validate_weight_value(weight)?;

        Ok(Self {
            items,
            relative_positions,
            weight,
            name: name.into(),
        })
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn relative_positions(&self) -> &[Vec3] {
        &self.relative_positions
    }

    /// Union of all sub-item boxes in compound space, `None` when empty.
    fn extent(&self) -> Option<BoundingBox> {
        self.items
            .iter()
            .zip(&self.relative_positions)
            .map(|(item, offset)| BoundingBox::from_position_and_dims(*offset, item.dimensions()))
            .reduce(|acc, next| acc.union(&next))
    }
}

fn default_weight() -> f64 {
    DEFAULT_WEIGHT
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_compound_name() -> String {
    DEFAULT_COMPOUND_NAME.to_string()
}

/// Any item the engine can hold.
///
/// Equality is structural and order-sensitive: same variant, weight, name and
/// variant fields; compounds additionally compare offsets and sub-items in list order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    Box(BoxItem),
    Cylinder(CylinderItem),
    Compound(CompoundItem),
}

impl Item {
    /// Shorthand for a validated box item.
    pub fn new_box(
        length: f64,
        width: f64,
        height: f64,
        weight: f64,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        BoxItem::new(Dimensions::new(length, width, height), weight, name).map(Item::Box)
    }

    /// Shorthand for a validated cylinder item.
    pub fn new_cylinder(
        diameter: f64,
        height: f64,
        weight: f64,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        CylinderItem::new(diameter, height, weight, name).map(Item::Cylinder)
    }

    /// Shorthand for a validated compound item from `(sub_item, offset)` pairs.
    pub fn new_compound(
        parts: Vec<(Item, Vec3)>,
        weight: Option<f64>,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let (items, offsets) = parts.into_iter().unzip();
        CompoundItem::new(items, offsets, weight, name).map(Item::Compound)
    }

    pub fn name(&self) -> &str {
        match self {
            Item::Box(b) => &b.name,
            Item::Cylinder(c) => &c.name,
            Item::Compound(c) => &c.name,
        }
    }

    /// Serialized type tag of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Item::Box(_) => "box",
            Item::Cylinder(_) => "cylinder",
            Item::Compound(_) => "compound",
        }
    }
}

impl Dimensional for Item {
    fn dimensions(&self) -> Vec3 {
        match self {
            Item::Box(b) => b.dimensions.as_vec3(),
            Item::Cylinder(c) => Vec3::new(c.diameter, c.diameter, c.height),
            Item::Compound(c) => c
                .extent()
                .map(|bbox| bbox.dimensions())
                .unwrap_or_else(Vec3::zero),
        }
    }

    fn volume(&self) -> f64 {
        match self {
            Item::Box(b) => b.dimensions.as_vec3().volume(),
            Item::Cylinder(c) => {
                let radius = c.diameter / 2.0;
                PI * radius * radius * c.height
            }
            Item::Compound(c) => c.items.iter().map(Dimensional::volume).sum(),
        }
    }
}

impl Weighted for Item {
    fn weight(&self) -> f64 {
        match self {
            Item::Box(b) => b.weight,
            Item::Cylinder(c) => c.weight,
            Item::Compound(c) => c.weight,
        }
    }
}

impl From<BoxItem> for Item {
    fn from(item: BoxItem) -> Self {
        Item::Box(item)
    }
}

impl From<CylinderItem> for Item {
    fn from(item: CylinderItem) -> Self {
        Item::Cylinder(item)
    }
}

impl From<CompoundItem> for Item {
    fn from(item: CompoundItem) -> Self {
        Item::Compound(item)
    }
}
