//! Turning an action target into one tile step per tick.
//!
//! When an action has no committed walk, its target is resolved to candidate
//! tiles, up to four are sampled, tiles already occupied by another agent's
//! event are dropped (unless that leaves nothing), and the candidate with the
//! shortest walk wins. The walk minus the current tile is committed and one
//! tile is popped per tick. Co-location is tolerated: occupied tiles are
//! only deprioritized.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use township_types::TilePos;
use township_world::{Grid, WorldError, closest_by_path, meeting_point};
use tracing::{debug, warn};

use crate::action::{ActionState, ActionTarget};
use crate::error::AgentError;

/// How many candidate tiles are sampled per target.
const TARGET_SAMPLE_SIZE: usize = 4;

/// Read-only world context for navigation.
#[derive(Debug, Clone, Copy)]
pub struct NavigationContext<'a> {
    /// The grid being walked.
    pub grid: &'a Grid,
    /// Where every agent currently stands, by name.
    pub agent_tiles: &'a BTreeMap<String, TilePos>,
    /// Address used when an action address is unknown.
    pub fallback_address: &'a str,
}

impl NavigationContext<'_> {
    fn is_blocked(&self, pos: TilePos) -> bool {
        self.grid.is_blocked(pos)
    }

    /// Whether a tile carries an event of an agent other than `me`.
    fn occupied_by_other(&self, pos: TilePos, me: &str) -> bool {
        self.grid.events_at(pos).is_ok_and(|events| {
            events
                .iter()
                .any(|e| e.subject != me && self.agent_tiles.contains_key(&e.subject))
        })
    }

    /// Tiles of `address`, or of the fallback address if it is unknown.
    fn address_tiles(&self, address: &str) -> Result<&BTreeSet<TilePos>, WorldError> {
        match self.grid.tiles_for_address(address) {
            Ok(tiles) => Ok(tiles),
            Err(WorldError::AddressNotFound(missing)) => {
                warn!(
                    address = %missing,
                    fallback = %self.fallback_address,
                    "Action address not found, using fallback"
                );
                self.grid.tiles_for_address(self.fallback_address)
            }
            Err(e) => Err(e),
        }
    }
}

/// Candidate destination tiles for `target`.
fn resolve_targets<R: Rng + ?Sized>(
    target: &ActionTarget,
    me: &str,
    here: TilePos,
    ctx: &NavigationContext<'_>,
    rng: &mut R,
) -> Result<Vec<TilePos>, WorldError> {
    match target {
        ActionTarget::Wait(tile) => Ok(vec![*tile]),
        ActionTarget::Agent(name) => {
            let Some(&there) = ctx.agent_tiles.get(name) else {
                debug!(agent = %me, partner = %name, "Partner location unknown");
                return Ok(Vec::new());
            };
            Ok(meeting_point(ctx.grid, here, there, |p| ctx.is_blocked(p))
                .into_iter()
                .collect())
        }
        ActionTarget::RandomIn(address) => {
            let tiles: Vec<TilePos> = ctx.address_tiles(address)?.iter().copied().collect();
            let mut picked: Vec<TilePos> = tiles.choose(rng).copied().into_iter().collect();
            picked.truncate(1);
            Ok(picked)
        }
        ActionTarget::Address(address) => {
            let mut tiles: Vec<TilePos> = ctx.address_tiles(address)?.iter().copied().collect();
            tiles.shuffle(rng);
            tiles.truncate(TARGET_SAMPLE_SIZE);
            let free: Vec<TilePos> = tiles
                .iter()
                .copied()
                .filter(|t| !ctx.occupied_by_other(*t, me))
                .collect();
            Ok(if free.is_empty() { tiles } else { free })
        }
    }
}

/// Plan the walk for `action` if needed and return the tile to occupy after
/// this tick. With no action, no reachable target, or an exhausted walk the
/// agent stays on `here`.
pub fn next_step<R: Rng + ?Sized>(
    action: &mut ActionState,
    me: &str,
    here: TilePos,
    ctx: &NavigationContext<'_>,
    rng: &mut R,
) -> Result<TilePos, AgentError> {
    let Some(target) = action.target.clone() else {
        return Ok(here);
    };

    if matches!(target, ActionTarget::RandomIn(_))
        && action.path_committed
        && action.planned_path.is_empty()
    {
        action.path_committed = false;
    }

    if !action.path_committed {
        let candidates = resolve_targets(&target, me, here, ctx, rng)?;
        let walk = closest_by_path(ctx.grid, here, &candidates, |p| ctx.is_blocked(p));
        action.planned_path.clear();
        match walk {
            Some((destination, path)) => {
                debug!(
                    agent = %me,
                    target = %target,
                    destination = %destination,
                    steps = path.len().saturating_sub(1),
                    "Walk planned"
                );
                action.planned_path.extend(path.into_iter().skip(1));
            }
            None => debug!(agent = %me, target = %target, "No walk found, holding position"),
        }
        action.path_committed = true;
    }

    Ok(action.planned_path.pop_front().unwrap_or(here))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use township_types::TileEvent;
    use township_world::{SAMPLE_FALLBACK_ADDRESS, sample_town};

    use super::*;
    use crate::action::NewAction;

    fn begin(target: ActionTarget) -> ActionState {
        let now = NaiveDate::from_ymd_opt(2023, 2, 13)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut action = ActionState::default();
        action.begin(NewAction::new("Klaus", target, 30, "doing things"), now);
        action
    }

    fn walk_until_still(
        action: &mut ActionState,
        start: TilePos,
        ctx: &NavigationContext<'_>,
        rng: &mut StdRng,
    ) -> TilePos {
        let mut here = start;
        for _ in 0..200 {
            let next = next_step(action, "Klaus", here, ctx, rng).unwrap();
            if next == here && action.planned_path.is_empty() {
                break;
            }
            assert_eq!(here.x.abs_diff(next.x) + here.y.abs_diff(next.y), 1);
            here = next;
        }
        here
    }

    #[test]
    fn walks_to_an_address_tile() {
        let grid = Grid::from_definition(&sample_town()).unwrap();
        let tiles = BTreeMap::new();
        let ctx = NavigationContext {
            grid: &grid,
            agent_tiles: &tiles,
            fallback_address: SAMPLE_FALLBACK_ADDRESS,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let address = "oakhaven:hobbs cafe:cafe:coffee machine";
        let mut action = begin(ActionTarget::Address(String::from(address)));

        let end = walk_until_still(&mut action, TilePos::new(2, 3), &ctx, &mut rng);
        assert!(grid.tiles_for_address(address).unwrap().contains(&end));
    }

    #[test]
    fn unknown_address_uses_fallback() {
        let grid = Grid::from_definition(&sample_town()).unwrap();
        let tiles = BTreeMap::new();
        let ctx = NavigationContext {
            grid: &grid,
            agent_tiles: &tiles,
            fallback_address: SAMPLE_FALLBACK_ADDRESS,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut action = begin(ActionTarget::Address(String::from("oakhaven:nowhere")));
        let end = walk_until_still(&mut action, TilePos::new(10, 7), &ctx, &mut rng);
        assert!(grid.tiles_for_address(SAMPLE_FALLBACK_ADDRESS).unwrap().contains(&end));
    }

    #[test]
    fn bad_fallback_surfaces_error() {
        let grid = Grid::from_definition(&sample_town()).unwrap();
        let tiles = BTreeMap::new();
        let ctx = NavigationContext {
            grid: &grid,
            agent_tiles: &tiles,
            fallback_address: "oakhaven:also nowhere",
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut action = begin(ActionTarget::Address(String::from("oakhaven:nowhere")));
        assert!(matches!(
            next_step(&mut action, "Klaus", TilePos::new(10, 7), &ctx, &mut rng),
            Err(AgentError::World {
                source: WorldError::AddressNotFound(_)
            })
        ));
    }

    #[test]
    fn occupied_tiles_are_avoided_when_possible() {
        let mut grid = Grid::from_definition(&sample_town()).unwrap();
        let address = "oakhaven:oak library:reading room:bookshelf";
        let shelves: Vec<TilePos> = grid.tiles_for_address(address).unwrap().iter().copied().collect();
        let (taken, free) = shelves.split_at(shelves.len() - 1);
        let mut tiles = BTreeMap::new();
        for (i, tile) in taken.iter().enumerate() {
            let name = format!("Reader {i}");
            grid.add_event(*tile, TileEvent::new(name.clone(), "is", "reading", "reading")).unwrap();
            tiles.insert(name, *tile);
        }
        let ctx = NavigationContext {
            grid: &grid,
            agent_tiles: &tiles,
            fallback_address: SAMPLE_FALLBACK_ADDRESS,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let mut action = begin(ActionTarget::Address(String::from(address)));
        let end = walk_until_still(&mut action, TilePos::new(20, 7), &ctx, &mut rng);
        assert_eq!(Some(&end), free.first());
    }

    #[test]
    fn wait_target_holds_and_agent_target_meets_midway() {
        let grid = Grid::from_definition(&sample_town()).unwrap();
        let mut tiles = BTreeMap::new();
        tiles.insert(String::from("Maria"), TilePos::new(21, 7));
        let ctx = NavigationContext {
            grid: &grid,
            agent_tiles: &tiles,
            fallback_address: SAMPLE_FALLBACK_ADDRESS,
        };
        let mut rng = StdRng::seed_from_u64(5);

        let here = TilePos::new(5, 7);
        let mut wait = begin(ActionTarget::Wait(here));
        assert_eq!(next_step(&mut wait, "Klaus", here, &ctx, &mut rng).unwrap(), here);
        assert!(wait.path_committed);

        let mut meet = begin(ActionTarget::Agent(String::from("Maria")));
        let end = walk_until_still(&mut meet, here, &ctx, &mut rng);
        assert_eq!(end, TilePos::new(13, 7));
    }

    #[test]
    fn no_target_stays_put() {
        let grid = Grid::from_definition(&sample_town()).unwrap();
        let tiles = BTreeMap::new();
        let ctx = NavigationContext {
            grid: &grid,
            agent_tiles: &tiles,
            fallback_address: SAMPLE_FALLBACK_ADDRESS,
        };
        let mut rng = StdRng::seed_from_u64(5);
        let mut idle = ActionState::default();
        let here = TilePos::new(5, 7);
        assert_eq!(next_step(&mut idle, "Klaus", here, &ctx, &mut rng).unwrap(), here);
    }
}
