//! Shortest walks over the tile grid.
//!
//! [`shortest_path`] is a breadth-first search over four-connected tiles.
//! Neighbors are expanded in row-major order (up, left, right, down), so
//! for a fixed grid the returned walk is always the same. An unreachable
//! goal yields an empty walk, which callers treat as "stay in place".

use std::collections::{BTreeMap, VecDeque};

use township_types::TilePos;

use crate::grid::Grid;

/// Four-connected neighbors of `pos` inside the grid, in row-major order.
fn neighbors(grid: &Grid, pos: TilePos) -> impl Iterator<Item = TilePos> {
    let up = pos.y.checked_sub(1).map(|y| TilePos::new(pos.x, y));
    let left = pos.x.checked_sub(1).map(|x| TilePos::new(x, pos.y));
    let right = pos.x.checked_add(1).map(|x| TilePos::new(x, pos.y));
    let down = pos.y.checked_add(1).map(|y| TilePos::new(pos.x, y));
    [up, left, right, down]
        .into_iter()
        .flatten()
        .filter(move |p| grid.in_bounds(*p))
}

/// The shortest four-connected walk from `start` to `end`, both inclusive.
///
/// Tiles for which `is_blocked` returns `true` are never entered. Returns
/// `[start]` when `start == end` and an empty vector when either endpoint
/// is outside the grid or no walk exists.
pub fn shortest_path<F>(grid: &Grid, start: TilePos, end: TilePos, is_blocked: F) -> Vec<TilePos>
where
    F: Fn(TilePos) -> bool,
{
    if !grid.in_bounds(start) || !grid.in_bounds(end) {
        return Vec::new();
    }
    if start == end {
        return vec![start];
    }
    if is_blocked(end) {
        return Vec::new();
    }

    let mut came_from: BTreeMap<TilePos, TilePos> = BTreeMap::new();
    let mut frontier = VecDeque::new();
    frontier.push_back(start);
    came_from.insert(start, start);

    while let Some(current) = frontier.pop_front() {
        if current == end {
            break;
        }
        for next in neighbors(grid, current) {
            if came_from.contains_key(&next) || is_blocked(next) {
                continue;
            }
            came_from.insert(next, current);
            frontier.push_back(next);
        }
    }

    if !came_from.contains_key(&end) {
        return Vec::new();
    }

    let mut path = VecDeque::new();
    let mut current = end;
    path.push_front(current);
    while current != start {
        let Some(&previous) = came_from.get(&current) else {
            return Vec::new();
        };
        path.push_front(previous);
        current = previous;
    }
    path.into_iter().collect()
}

/// Among `targets`, the one with the shortest walk from `start`, together
/// with that walk. Ties go to the earliest target; unreachable targets are
/// skipped. Returns `None` when no target is reachable.
pub fn closest_by_path<F>(
    grid: &Grid,
    start: TilePos,
    targets: &[TilePos],
    is_blocked: F,
) -> Option<(TilePos, Vec<TilePos>)>
where
    F: Fn(TilePos) -> bool,
{
    let mut best: Option<(TilePos, Vec<TilePos>)> = None;
    for &target in targets {
        let path = shortest_path(grid, start, target, &is_blocked);
        if path.is_empty() {
            continue;
        }
        let shorter = best
            .as_ref()
            .is_none_or(|(_, best_path)| path.len() < best_path.len());
        if shorter {
            best = Some((target, path));
        }
    }
    best
}

/// Where to walk to meet an agent standing at `other`: the midpoint of the
/// walk between the two, preferring whichever of the two middle tiles is
/// closer to `start`. Adjacent agents stay where they are.
pub fn meeting_point<F>(grid: &Grid, start: TilePos, other: TilePos, is_blocked: F) -> Option<TilePos>
where
    F: Fn(TilePos) -> bool,
{
    let path = shortest_path(grid, start, other, &is_blocked);
    if path.len() <= 2 {
        return path.first().copied();
    }
    let half = path.len() / 2;
    let first = *path.get(half)?;
    let Some(&second) = path.get(half.saturating_add(1)) else {
        return Some(first);
    };
    let to_first = shortest_path(grid, start, first, &is_blocked).len();
    let to_second = shortest_path(grid, start, second, &is_blocked).len();
    if to_first <= to_second {
        Some(first)
    } else {
        Some(second)
    }
}
