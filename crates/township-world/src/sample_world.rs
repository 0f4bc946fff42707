//! A small built-in town for the engine's offline runs and for tests.
//!
//! Layout (24x14, `#` walls):
//!
//! ```text
//! ########################
//! #   #   #        #     #
//! #   #   #        #     #
//! #       #        #     #
//! #   #   #        #     #
//! #   #   #        #     #
//! ##### ###       ##    ##
//! #                      #
//! #                      #
//! #                      #
//! #                      #
//! #                      #
//! #                      #
//! ########################
//! ```
//!
//! Maple House (bedroom + kitchen), Hobbs Cafe, Oak Library, Main Street,
//! and Town Park, with a handful of game objects and four spawn points.

use township_types::TilePos;

use crate::definition::WorldDefinition;

/// Fallback address used when an action address cannot be resolved in the
/// sample town.
pub const SAMPLE_FALLBACK_ADDRESS: &str = "oakhaven:town park:park garden";

const WIDTH: u32 = 24;
const HEIGHT: u32 = 14;

/// Inclusive rectangle of tiles.
#[derive(Debug, Clone, Copy)]
struct Rect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

const fn rect(x0: u32, y0: u32, x1: u32, y1: u32) -> Rect {
    Rect { x0, y0, x1, y1 }
}

fn paint(layer: &mut [u32], area: Rect, code: u32) {
    for y in area.y0..=area.y1 {
        for x in area.x0..=area.x1 {
            let idx = y.checked_mul(WIDTH).and_then(|row| row.checked_add(x));
            if let Some(cell) = idx
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| layer.get_mut(i))
            {
                *cell = code;
            }
        }
    }
}

fn paint_tile(layer: &mut [u32], pos: TilePos, code: u32) {
    paint(layer, rect(pos.x, pos.y, pos.x, pos.y), code);
}

/// Build the sample town definition.
pub fn sample_town() -> WorldDefinition {
    let mut definition = WorldDefinition::open("oakhaven", WIDTH, HEIGHT);
    let area = usize::try_from(WIDTH.saturating_mul(HEIGHT)).unwrap_or(0);

    for (code, name) in [
        (1, "maple house"),
        (2, "hobbs cafe"),
        (3, "oak library"),
        (4, "main street"),
        (5, "town park"),
    ] {
        definition.sectors.insert(code, String::from(name));
    }
    for (code, name) in [
        (1, "bedroom"),
        (2, "kitchen"),
        (3, "cafe"),
        (4, "reading room"),
        (5, "street"),
        (6, "park garden"),
    ] {
        definition.arenas.insert(code, String::from(name));
    }
    for (code, name) in [
        (1, "bed"),
        (2, "desk"),
        (3, "stove"),
        (4, "refrigerator"),
        (5, "cafe counter"),
        (6, "coffee machine"),
        (7, "cafe table"),
        (8, "bookshelf"),
        (9, "reading desk"),
        (10, "bench"),
        (11, "fountain"),
    ] {
        definition.game_objects.insert(code, String::from(name));
    }
    for (code, name) in [
        (1, "maple house a"),
        (2, "maple house b"),
        (3, "hobbs cafe"),
        (4, "oak library"),
    ] {
        definition.spawn_locations.insert(code, String::from(name));
    }

    // Walls: outer border plus interior partitions with doorways.
    let mut collision = vec![0; area];
    paint(&mut collision, rect(0, 0, WIDTH - 1, 0), 1);
    paint(&mut collision, rect(0, HEIGHT - 1, WIDTH - 1, HEIGHT - 1), 1);
    paint(&mut collision, rect(0, 0, 0, HEIGHT - 1), 1);
    paint(&mut collision, rect(WIDTH - 1, 0, WIDTH - 1, HEIGHT - 1), 1);
    paint(&mut collision, rect(4, 1, 4, 5), 1);
    paint_tile(&mut collision, TilePos::new(4, 3), 0);
    paint(&mut collision, rect(1, 6, 7, 6), 1);
    paint_tile(&mut collision, TilePos::new(5, 6), 0);
    paint(&mut collision, rect(8, 1, 8, 6), 1);
    paint(&mut collision, rect(17, 1, 17, 6), 1);
    paint_tile(&mut collision, TilePos::new(16, 6), 1);
    paint_tile(&mut collision, TilePos::new(22, 6), 1);

    let mut sector = vec![0; area];
    paint(&mut sector, rect(1, 1, 7, 5), 1);
    paint_tile(&mut sector, TilePos::new(5, 6), 1);
    paint(&mut sector, rect(9, 1, 16, 6), 2);
    paint(&mut sector, rect(18, 1, 22, 6), 3);
    paint(&mut sector, rect(1, 7, 22, 7), 4);
    paint(&mut sector, rect(1, 8, 22, 12), 5);

    let mut arena = vec![0; area];
    paint(&mut arena, rect(1, 1, 3, 5), 1);
    paint(&mut arena, rect(4, 3, 4, 3), 1);
    paint(&mut arena, rect(5, 1, 7, 5), 2);
    paint_tile(&mut arena, TilePos::new(5, 6), 2);
    paint(&mut arena, rect(9, 1, 16, 6), 3);
    paint(&mut arena, rect(18, 1, 22, 6), 4);
    paint(&mut arena, rect(1, 7, 22, 7), 5);
    paint(&mut arena, rect(1, 8, 22, 12), 6);

    let mut game_object = vec![0; area];
    paint_tile(&mut game_object, TilePos::new(1, 1), 1);
    paint_tile(&mut game_object, TilePos::new(3, 1), 2);
    paint_tile(&mut game_object, TilePos::new(7, 1), 3);
    paint_tile(&mut game_object, TilePos::new(5, 1), 4);
    paint(&mut game_object, rect(10, 1, 12, 1), 5);
    paint_tile(&mut game_object, TilePos::new(14, 1), 6);
    paint(&mut game_object, rect(12, 4, 13, 4), 7);
    paint(&mut game_object, rect(18, 1, 21, 1), 8);
    paint_tile(&mut game_object, TilePos::new(20, 4), 9);
    paint(&mut game_object, rect(4, 10, 6, 10), 10);
    paint_tile(&mut game_object, TilePos::new(12, 10), 11);

    let mut spawn_location = vec![0; area];
    paint_tile(&mut spawn_location, TilePos::new(2, 3), 1);
    paint_tile(&mut spawn_location, TilePos::new(2, 4), 2);
    paint_tile(&mut spawn_location, TilePos::new(11, 3), 3);
    paint_tile(&mut spawn_location, TilePos::new(20, 3), 4);

    definition.layers.collision = collision;
    definition.layers.sector = sector;
    definition.layers.arena = arena;
    definition.layers.game_object = game_object;
    definition.layers.spawn_location = spawn_location;
    definition
}
