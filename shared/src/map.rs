//! Fixed-size tile grid owned by each room.

use crate::{DEFAULT_TILE, MAP_COLUMNS, MAP_ROWS, MAP_SIZE, TILE_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerrainError {
    #[error("grid point ({x}, {y}) is not a tile centre")]
    Misaligned { x: i32, y: i32 },
    #[error("grid point ({x}, {y}) lies outside the map")]
    OutOfBounds { x: i32, y: i32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("map must hold {expected} tiles, got {actual}")]
pub struct TileMapError {
    pub expected: usize,
    pub actual: usize,
}

/// Centre of a tile in world units, as sent with `terrain/insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Snaps a world position to the centre of the tile containing it.
    pub fn containing(world_x: f32, world_y: f32) -> Self {
        let half = TILE_SIZE / 2;
        Self {
            x: (world_x / TILE_SIZE as f32).floor() as i32 * TILE_SIZE + half,
            y: (world_y / TILE_SIZE as f32).floor() as i32 * TILE_SIZE + half,
        }
    }

    /// Flat map index `(x-16)/32 + (y-16)/32*64`, rejecting points that are not
    /// tile centres or whose column or row falls outside the grid.
    pub fn tile_index(&self) -> Result<usize, TerrainError> {
        let half = TILE_SIZE / 2;
        let (dx, dy) = (self.x - half, self.y - half);

        if dx < 0 || dy < 0 {
            return Err(TerrainError::OutOfBounds {
                x: self.x,
                y: self.y,
            });
        }
        if dx % TILE_SIZE != 0 || dy % TILE_SIZE != 0 {
            return Err(TerrainError::Misaligned {
                x: self.x,
                y: self.y,
            });
        }

        let column = (dx / TILE_SIZE) as usize;
        let row = (dy / TILE_SIZE) as usize;
        if column >= MAP_COLUMNS || row >= MAP_ROWS {
            return Err(TerrainError::OutOfBounds {
                x: self.x,
                y: self.y,
            });
        }

        Ok(column + row * MAP_COLUMNS)
    }
}

/// Top-left world coordinates of the tile at `index`.
pub fn tile_origin(index: usize) -> (f32, f32) {
    let column = (index % MAP_COLUMNS) as i32;
    let row = (index / MAP_COLUMNS) as i32;
    ((column * TILE_SIZE) as f32, (row * TILE_SIZE) as f32)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u16>", into = "Vec<u16>")]
pub struct TileMap {
    tiles: Vec<u16>,
}

impl TileMap {
    pub fn new() -> Self {
        Self {
            tiles: vec![DEFAULT_TILE; MAP_SIZE],
        }
    }

    pub fn tiles(&self) -> &[u16] {
        &self.tiles
    }

    pub fn get(&self, index: usize) -> Option<u16> {
        self.tiles.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Overwrites the tile under `grid`, returning the index that changed.
    pub fn place(&mut self, grid: GridPoint, tile: u16) -> Result<usize, TerrainError> {
        let index = grid.tile_index()?;
        self.tiles[index] = tile;
        Ok(index)
    }
}

impl Default for TileMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<u16>> for TileMap {
    type Error = TileMapError;

    fn try_from(tiles: Vec<u16>) -> Result<Self, Self::Error> {
        if tiles.len() != MAP_SIZE {
            return Err(TileMapError {
                expected: MAP_SIZE,
                actual: tiles.len(),
            });
        }
        Ok(Self { tiles })
    }
}

impl From<TileMap> for Vec<u16> {
    fn from(map: TileMap) -> Self {
        map.tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_map_is_all_default_tiles() {
        let map = TileMap::new();
        assert_eq!(map.len(), 4096);
        assert!(map.tiles().iter().all(|&tile| tile == DEFAULT_TILE));
    }

    #[test]
    fn test_tile_index_for_tile_centres() {
        assert_eq!(GridPoint::new(16, 16).tile_index(), Ok(0));
        assert_eq!(GridPoint::new(48, 16).tile_index(), Ok(1));
        assert_eq!(GridPoint::new(16, 48).tile_index(), Ok(64));
        assert_eq!(GridPoint::new(2032, 2032).tile_index(), Ok(4095));
    }

    #[test]
    fn test_tile_index_rejects_outside_points() {
        assert_eq!(
            GridPoint::new(-16, 16).tile_index(),
            Err(TerrainError::OutOfBounds { x: -16, y: 16 })
        );
        // Column 64 would wrap into the next row of the flat index.
        assert_eq!(
            GridPoint::new(2064, 16).tile_index(),
            Err(TerrainError::OutOfBounds { x: 2064, y: 16 })
        );
        assert_eq!(
            GridPoint::new(16, 2064).tile_index(),
            Err(TerrainError::OutOfBounds { x: 16, y: 2064 })
        );
    }

    #[test]
    fn test_tile_index_rejects_misaligned_points() {
        assert_eq!(
            GridPoint::new(20, 16).tile_index(),
            Err(TerrainError::Misaligned { x: 20, y: 16 })
        );
    }

    #[test]
    fn test_place_overwrites_single_tile() {
        let mut map = TileMap::new();
        assert_eq!(map.place(GridPoint::new(48, 16), 5), Ok(1));
        assert_eq!(map.get(1), Some(5));
        assert_eq!(map.get(0), Some(DEFAULT_TILE));
        assert_eq!(map.tiles().iter().filter(|&&t| t != DEFAULT_TILE).count(), 1);
    }

    #[test]
    fn test_place_out_of_range_leaves_map_untouched() {
        let mut map = TileMap::new();
        assert!(map.place(GridPoint::new(16, 4000), 5).is_err());
        assert_eq!(map, TileMap::new());
    }

    #[test]
    fn test_containing_snaps_to_centre() {
        assert_eq!(GridPoint::containing(0.0, 0.0), GridPoint::new(16, 16));
        assert_eq!(GridPoint::containing(40.5, 70.0), GridPoint::new(48, 80));
        assert_eq!(GridPoint::containing(-1.0, 5.0), GridPoint::new(-16, 16));
    }

    #[test]
    fn test_tile_origin() {
        assert_eq!(tile_origin(0), (0.0, 0.0));
        assert_eq!(tile_origin(1), (32.0, 0.0));
        assert_eq!(tile_origin(64), (0.0, 32.0));
    }

    #[test]
    fn test_map_rejects_wrong_length() {
        let err = TileMap::try_from(vec![1, 2, 3]).unwrap_err();
        assert_eq!(err.actual, 3);
        assert!(serde_json::from_str::<TileMap>("[71, 71]").is_err());
    }
}
