use serde::{Deserialize, Serialize};

use crate::types::Position;

/// Errors from building a world object out of raw wire values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object face: {0} (expected 0..=3)")]
    InvalidFace(u8),
    #[error("invalid object kind: {0} (expected 0..=22)")]
    InvalidKind(u8),
}

/// Direction an object faces on its tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Face {
    #[default]
    West = 0,
    North = 1,
    East = 2,
    South = 3,
}

impl Face {
    pub fn from_raw(raw: u8) -> Result<Self, ObjectError> {
        match raw {
            0 => Ok(Self::West),
            1 => Ok(Self::North),
            2 => Ok(Self::East),
            3 => Ok(Self::South),
            other => Err(ObjectError::InvalidFace(other)),
        }
    }

    pub fn as_raw(self) -> u8 {
        self as u8
    }
}

/// Placement type of an object: which slot of the tile it occupies and how
/// the client lays it out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectKind {
    LengthwiseWall = 0,
    TriangularCorner = 1,
    WallCorner = 2,
    RectangularCorner = 3,
    WallDecorationInside = 4,
    WallDecorationOutside = 5,
    DiagonalWallDecorationOutside = 6,
    DiagonalWallDecorationInside = 7,
    DiagonalWallDecorationBoth = 8,
    DiagonalWall = 9,
    #[default]
    Interactable = 10,
    DiagonalInteractable = 11,
    StraightSlopedRoof = 12,
    DiagonalSlopedRoof = 13,
    DiagonalSlopedConnectingRoof = 14,
    StraightSlopedCornerConnectingRoof = 15,
    StraightSlopedCornerRoof = 16,
    StraightFlatTopRoof = 17,
    StraightBottomEdgeRoof = 18,
    DiagonalBottomEdgeConnectingRoof = 19,
    StraightBottomEdgeConnectingRoof = 20,
    StraightBottomEdgeConnectingCornerRoof = 21,
    FloorDecoration = 22,
}

impl ObjectKind {
    const ALL: [ObjectKind; 23] = [
        Self::LengthwiseWall,
        Self::TriangularCorner,
        Self::WallCorner,
        Self::RectangularCorner,
        Self::WallDecorationInside,
        Self::WallDecorationOutside,
        Self::DiagonalWallDecorationOutside,
        Self::DiagonalWallDecorationInside,
        Self::DiagonalWallDecorationBoth,
        Self::DiagonalWall,
        Self::Interactable,
        Self::DiagonalInteractable,
        Self::StraightSlopedRoof,
        Self::DiagonalSlopedRoof,
        Self::DiagonalSlopedConnectingRoof,
        Self::StraightSlopedCornerConnectingRoof,
        Self::StraightSlopedCornerRoof,
        Self::StraightFlatTopRoof,
        Self::StraightBottomEdgeRoof,
        Self::DiagonalBottomEdgeConnectingRoof,
        Self::StraightBottomEdgeConnectingRoof,
        Self::StraightBottomEdgeConnectingCornerRoof,
        Self::FloorDecoration,
    ];

    pub fn from_raw(raw: u8) -> Result<Self, ObjectError> {
        Self::ALL
            .get(raw as usize)
            .copied()
            .ok_or(ObjectError::InvalidKind(raw))
    }

    pub fn as_raw(self) -> u8 {
        self as u8
    }
}

/// A placed object in the shared world.
///
/// Two objects are the same object only when every field matches; two
/// different placements may share a position for a moment, but the registry
/// never keeps both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldObject {
    /// Object definition id understood by the client.
    pub id: u16,
    pub position: Position,
    #[serde(default)]
    pub face: Face,
    #[serde(default)]
    pub kind: ObjectKind,
}

impl WorldObject {
    pub fn new(id: u16, position: Position, face: Face, kind: ObjectKind) -> Self {
        Self {
            id,
            position,
            face,
            kind,
        }
    }

    /// Build an object from raw face/kind numbers as they arrive from game
    /// scripts or the wire.
    pub fn from_raw(id: u16, position: Position, face: u8, kind: u8) -> Result<Self, ObjectError> {
        Ok(Self::new(
            id,
            position,
            Face::from_raw(face)?,
            ObjectKind::from_raw(kind)?,
        ))
    }

    /// Shorthand for a default-facing interactable object.
    pub fn interactable(id: u16, position: Position) -> Self {
        Self::new(id, position, Face::default(), ObjectKind::Interactable)
    }
}
