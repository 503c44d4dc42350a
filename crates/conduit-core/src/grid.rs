use serde::{Deserialize, Serialize};

/// A position on the 3D grid. Value equality, hashable, totally ordered so
/// collections keyed by position iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Pos3 {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The neighboring cell one step in `dir`.
    pub fn offset(self, dir: Direction) -> Self {
        let (dx, dy, dz) = dir.vector();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// One of the six axis-aligned unit directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    /// All six directions, in a fixed order used for deterministic iteration.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    /// Unit vector for this direction. North is -z, East is +x, Up is +y.
    pub fn vector(self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    /// Index into per-direction arrays. Matches the order of [`Direction::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Direction::ALL.get(index).copied()
    }

    /// The direction that steps from `from` to `to`, if they are orthogonally
    /// adjacent.
    pub fn between(from: Pos3, to: Pos3) -> Option<Self> {
        let delta = (to.x - from.x, to.y - from.y, to.z - from.z);
        Direction::ALL.into_iter().find(|d| d.vector() == delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_and_between_agree() {
        let origin = Pos3::new(3, -2, 7);
        for dir in Direction::ALL {
            let next = origin.offset(dir);
            assert_eq!(Direction::between(origin, next), Some(dir));
            assert_eq!(Direction::between(next, origin), Some(dir.opposite()));
        }
    }

    #[test]
    fn between_rejects_non_adjacent() {
        let a = Pos3::new(0, 0, 0);
        assert_eq!(Direction::between(a, Pos3::new(2, 0, 0)), None);
        assert_eq!(Direction::between(a, Pos3::new(1, 1, 0)), None);
        assert_eq!(Direction::between(a, a), None);
    }

    #[test]
    fn opposites_are_involutions() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_ne!(dir.opposite(), dir);
        }
    }

    #[test]
    fn index_round_trips() {
        for (i, dir) in Direction::ALL.into_iter().enumerate() {
            assert_eq!(dir.index(), i);
            assert_eq!(Direction::from_index(i), Some(dir));
        }
        assert_eq!(Direction::from_index(6), None);
    }

    #[test]
    fn positions_order_deterministically() {
        let mut set = std::collections::BTreeSet::new();
        set.insert(Pos3::new(1, 0, 0));
        set.insert(Pos3::new(0, 0, 0));
        set.insert(Pos3::new(0, 5, -1));
        let collected: Vec<_> = set.into_iter().collect();
        assert_eq!(collected[0], Pos3::new(0, 0, 0));
        assert_eq!(collected[1], Pos3::new(0, 5, -1));
        assert_eq!(collected[2], Pos3::new(1, 0, 0));
    }
}
