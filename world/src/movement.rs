//! Player stepping, portal traversal and the clear-field trap.

use portal_grid_core::{Cell, Direction, Event, Portals};
use tracing::debug;

use crate::World;

pub(crate) fn can_go(world: &World, direction: Direction) -> bool {
    if !world.player_is_in_the_world() {
        return false;
    }

    world
        .terrain
        .neighbor(world.player.position, direction)
        .and_then(|target| world.surface.get(target))
        .map_or(false, Cell::is_traversable)
}

pub(crate) fn go_to(world: &mut World, direction: Direction, out_events: &mut Vec<Event>) {
    if !can_go(world, direction) {
        return;
    }
    let from = world.player.position;
    let Some(mut destination) = world.terrain.neighbor(from, direction) else {
        return;
    };

    world.restore(from);

    // Entering one end of the pair exits through the other; a missing partner
    // leaves the player standing on the portal.
    match world.surface.get(destination) {
        Some(Cell::BluePortal) => destination = world.portals.orange.unwrap_or(destination),
        Some(Cell::OrangePortal) => destination = world.portals.blue.unwrap_or(destination),
        _ => {}
    }
    world.player.position = destination;

    if world.surface.get(destination) == Some(Cell::ClearField) {
        dissolve_portals(world, out_events);
    }

    world.paint_player();
    out_events.push(Event::PlayerMoved {
        from,
        to: destination,
    });
}

fn dissolve_portals(world: &mut World, out_events: &mut Vec<Event>) {
    let Portals { blue, orange } = world.portals;
    if blue.is_none() && orange.is_none() {
        return;
    }

    for position in [blue, orange].into_iter().flatten() {
        world.paint(position, Cell::None);
    }
    world.portals = Portals::default();
    debug!("clear field dissolved both portals");
    out_events.push(Event::PortalsDissolved);
}
