//! Component geometry as seen by the engine: footprints from a read-only
//! catalog plus the placement transform that maps them onto the grid.

use crate::geom::coord::GridPos;
use crate::geom::rect::GridRect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    pub fn from_degrees(deg: i32) -> Option<Self> {
        match deg.rem_euclid(360) {
            0 => Some(Rotation::R0),
            90 => Some(Rotation::R90),
            180 => Some(Rotation::R180),
            270 => Some(Rotation::R270),
            _ => None,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    /// Rows grow downwards, so a quarter turn maps `(c, r)` to `(-r, c)`.
    fn apply(self, p: GridPos) -> GridPos {
        match self {
            Rotation::R0 => p,
            Rotation::R90 => GridPos::new(-p.row, p.col),
            Rotation::R180 => GridPos::new(-p.col, -p.row),
            Rotation::R270 => GridPos::new(p.row, -p.col),
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = String;
    fn try_from(deg: i32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(deg).ok_or_else(|| format!("rotation must be a multiple of 90, got {deg}"))
    }
}

impl From<Rotation> for i32 {
    fn from(r: Rotation) -> i32 {
        r.degrees()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub anchor: GridPos,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub mirrored: bool,
}

impl Placement {
    pub fn at(anchor: GridPos) -> Self {
        Self {
            anchor,
            rotation: Rotation::R0,
            mirrored: false,
        }
    }

    pub fn rotated(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }

    /// Mirror about the anchor column first, then rotate, then translate.
    pub fn transform(&self, offset: GridPos) -> GridPos {
        let m = if self.mirrored {
            GridPos::new(-offset.col, offset.row)
        } else {
            offset
        };
        self.anchor + self.rotation.apply(m)
    }

    pub fn transform_rect(&self, rect: &GridRect) -> GridRect {
        GridRect::new(self.transform(rect.min), self.transform(rect.max))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinDef {
    pub number: String,
    pub offset: GridPos,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub name: String,
    /// Body outline relative to the anchor, before rotation.
    pub body: GridRect,
    #[serde(default)]
    pub pins: Vec<PinDef>,
}

impl Footprint {
    pub fn body_rect(&self, placement: &Placement) -> GridRect {
        placement.transform_rect(&self.body)
    }

    pub fn pin_positions(&self, placement: &Placement) -> Vec<(String, GridPos)> {
        self.pins
            .iter()
            .map(|p| (p.number.clone(), placement.transform(p.offset)))
            .collect()
    }

    /// Silhouette used for blocking: the hull of the body and every pin.
    pub fn bbox(&self, placement: &Placement) -> GridRect {
        let body = self.body_rect(placement);
        self.pins
            .iter()
            .fold(body, |r, p| r.including(placement.transform(p.offset)))
    }
}

/// Read-only footprint lookup; the engine never stores geometry itself.
pub trait Catalog {
    fn footprint(&self, name: &str) -> Option<&Footprint>;
}

#[derive(Clone, Debug, Default)]
pub struct Library {
    footprints: HashMap<String, Footprint>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_footprints<I: IntoIterator<Item = Footprint>>(items: I) -> Self {
        let mut lib = Self::new();
        for fp in items {
            lib.insert(fp);
        }
        lib
    }

    /// Through-hole parts on a 0.1" grid.
    pub fn standard() -> Self {
        let pin = |n: &str, c: i32, r: i32| PinDef {
            number: n.to_string(),
            offset: GridPos::new(c, r),
        };
        let rect = |c0: i32, r0: i32, c1: i32, r1: i32| GridRect::new(GridPos::new(c0, r0), GridPos::new(c1, r1));

        let mut dip8_pins = Vec::new();
        for i in 0..4 {
            dip8_pins.push(pin(&(i + 1).to_string(), 0, i));
        }
        for i in 0..4 {
            dip8_pins.push(pin(&(i + 5).to_string(), 3, 3 - i));
        }

        Self::from_footprints([
            Footprint {
                name: "AXIAL-0.4".to_string(),
                body: rect(1, 0, 2, 0),
                pins: vec![pin("1", 0, 0), pin("2", 3, 0)],
            },
            Footprint {
                name: "RADIAL-0.1".to_string(),
                body: rect(0, 0, 1, 0),
                pins: vec![pin("1", 0, 0), pin("2", 1, 0)],
            },
            Footprint {
                name: "TO-92".to_string(),
                body: rect(0, -1, 2, 0),
                pins: vec![pin("1", 0, 0), pin("2", 1, 0), pin("3", 2, 0)],
            },
            Footprint {
                name: "DIP-8".to_string(),
                body: rect(0, 0, 3, 3),
                pins: dip8_pins,
            },
            Footprint {
                name: "HEADER-1x2".to_string(),
                body: rect(0, 0, 0, 1),
                pins: vec![pin("1", 0, 0), pin("2", 0, 1)],
            },
        ])
    }

    pub fn insert(&mut self, fp: Footprint) {
        self.footprints.insert(fp.name.clone(), fp);
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    /// Footprints sorted by name.
    pub fn footprints(&self) -> Vec<&Footprint> {
        let mut all: Vec<&Footprint> = self.footprints.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

impl Catalog for Library {
    fn footprint(&self, name: &str) -> Option<&Footprint> {
        self.footprints.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_turn_keeps_anchor_fixed() {
        let lib = Library::standard();
        let axial = lib.footprint("AXIAL-0.4").unwrap();
        let placement = Placement::at(GridPos::new(5, 5)).rotated(Rotation::R90);
        let pins = axial.pin_positions(&placement);
        assert_eq!(pins[0].1, GridPos::new(5, 5));
        assert_eq!(pins[1].1, GridPos::new(5, 8));
        assert_eq!(
            axial.bbox(&placement),
            GridRect::new(GridPos::new(5, 5), GridPos::new(5, 8))
        );
    }

    #[test]
    fn mirror_flips_columns_before_rotation() {
        let placement = Placement::at(GridPos::new(10, 0)).mirrored(true);
        assert_eq!(placement.transform(GridPos::new(3, 1)), GridPos::new(7, 1));
        let turned = placement.rotated(Rotation::R180);
        assert_eq!(turned.transform(GridPos::new(3, 1)), GridPos::new(13, -1));
    }

    #[test]
    fn rotation_degrees_round_trip() {
        for r in Rotation::ALL {
            assert_eq!(Rotation::from_degrees(r.degrees()), Some(r));
        }
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::R270));
        assert!(Rotation::try_from(45).is_err());
    }

    #[test]
    fn dip8_pins_sit_on_body_edge() {
        let lib = Library::standard();
        let dip = lib.footprint("DIP-8").unwrap();
        let placement = Placement::at(GridPos::new(0, 0));
        let bbox = dip.bbox(&placement);
        assert_eq!(bbox, GridRect::new(GridPos::new(0, 0), GridPos::new(3, 3)));
        assert_eq!(dip.pin_positions(&placement).len(), 8);
    }
}
