//! Portal firing against terrain walls and portal bookkeeping.

use portal_grid_core::{Cell, Direction, Event, PortalColor, Position};
use tracing::debug;

use crate::{grid::Grid, World};

/// Fires the portal selected by the pending prompt.
///
/// Both portal prompts are consumed whether or not the shot lands.
pub(crate) fn shoot(world: &mut World, direction: Direction, out_events: &mut Vec<Event>) {
    let color = if world.prompts.blue_portal {
        Some(PortalColor::Blue)
    } else if world.prompts.orange_portal {
        Some(PortalColor::Orange)
    } else {
        None
    };
    world.prompts.blue_portal = false;
    world.prompts.orange_portal = false;

    let Some(color) = color else {
        return;
    };
    if !world.player_is_in_the_world() {
        return;
    }

    if let Some(previous) = world.portals.get(color) {
        remove_portal(world, previous);
        world.portals.set(color, None);
        if previous == world.player.position {
            world.paint_player();
        }
    }

    match cast(&world.terrain, world.player.position, direction) {
        Some(position) => {
            world.paint(position, color.cell());
            world.portals.set(color, Some(position));
            debug!(?color, %position, "portal placed");
            out_events.push(Event::PortalPlaced { color, position });
        }
        None => {
            debug!(?color, ?direction, "portal shot found no surface");
            out_events.push(Event::PortalMissed { color });
        }
    }
}

/// Clears a portal cell, or only repaints the surface when something else has
/// already replaced the portal on the terrain.
fn remove_portal(world: &mut World, position: Position) {
    if world.terrain.get(position).map_or(false, Cell::is_portal) {
        world.paint(position, Cell::None);
    } else {
        world.restore(position);
    }
}

/// Walks the terrain from `origin` until a wall and returns the cell in front
/// of it when that cell is bare floor.
fn cast(terrain: &Grid, origin: Position, direction: Direction) -> Option<Position> {
    let mut previous: Option<Position> = None;
    let mut cursor = Some(origin);

    while let Some(position) = cursor.filter(|candidate| terrain.contains(*candidate)) {
        if terrain.get(position) == Some(Cell::Wall) {
            return previous.filter(|landing| terrain.get(*landing) == Some(Cell::None));
        }
        previous = Some(position);
        cursor = position.step(direction);
    }

    None
}

pub(crate) fn are_portals_real(world: &World) -> bool {
    let portals = world.portals;
    if let (Some(blue), Some(orange)) = (portals.blue, portals.orange) {
        if !world.terrain.contains(blue) || !world.terrain.contains(orange) {
            return false;
        }
    }

    [PortalColor::Blue, PortalColor::Orange]
        .into_iter()
        .all(|color| match portals.get(color) {
            Some(position) => world.terrain.get(position) == Some(color.cell()),
            None => true,
        })
}
