use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Largest board a round can use; tile sets are single `u64` bitsets.
pub const MAX_TILES: u8 = 64;

/// Default 5x5 board.
pub const DEFAULT_TILES: u8 = 25;

/// Check that `hazard_count` hazards fit on a `total_tiles` board with at
/// least one safe tile left.
pub fn check_board(total_tiles: u8, hazard_count: u8) -> EngineResult<()> {
    if total_tiles < 2 || total_tiles > MAX_TILES || hazard_count == 0 || hazard_count >= total_tiles
    {
        return Err(EngineError::InvalidBoard {
            total_tiles,
            hazard_count,
        });
    }
    Ok(())
}

/// Set of tile indices below [`MAX_TILES`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileSet(u64);

impl TileSet {
    pub const fn empty() -> Self {
        TileSet(0)
    }

    pub fn contains(self, tile: u8) -> bool {
        tile < MAX_TILES && self.0 & (1u64 << tile) != 0
    }

    /// Returns `false` if the tile was already present or is out of range.
    pub fn insert(&mut self, tile: u8) -> bool {
        if tile >= MAX_TILES || self.contains(tile) {
            return false;
        }
        self.0 |= 1u64 << tile;
        true
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_disjoint(self, other: TileSet) -> bool {
        self.0 & other.0 == 0
    }

    /// Tiles in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..MAX_TILES).filter(move |t| self.contains(*t))
    }

    pub fn to_vec(self) -> Vec<u8> {
        self.iter().collect()
    }
}

impl FromIterator<u8> for TileSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = TileSet::empty();
        for tile in iter {
            set.insert(tile);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut set = TileSet::empty();
        assert!(set.insert(0));
        assert!(set.insert(63));
        assert!(!set.insert(63));
        assert!(!set.insert(64));
        assert!(set.contains(0) && set.contains(63));
        assert!(!set.contains(5));
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_vec(), vec![0, 63]);
    }

    #[test]
    fn test_disjoint() {
        let a: TileSet = [1, 2, 3].into_iter().collect();
        let b: TileSet = [4, 5].into_iter().collect();
        assert!(a.is_disjoint(b));
        assert!(!a.is_disjoint([3].into_iter().collect()));
    }

    #[test]
    fn test_check_board() {
        assert!(check_board(25, 3).is_ok());
        assert!(check_board(25, 24).is_ok());
        assert!(check_board(25, 25).is_err());
        assert!(check_board(25, 0).is_err());
        assert!(check_board(65, 3).is_err());
        assert!(check_board(1, 0).is_err());
    }
}
