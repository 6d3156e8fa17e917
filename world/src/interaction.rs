//! Use and drop actions, and activation propagation between props.

use portal_grid_core::{Cell, Direction, Event, Position, Prop};
use tracing::debug;

use crate::World;

const SCAN_ORDER: [Direction; 4] = [
    Direction::Left,
    Direction::Right,
    Direction::Up,
    Direction::Down,
];

fn neighbours_where(world: &World, accept: fn(Cell) -> bool) -> Vec<Position> {
    if !world.player_is_in_the_world() {
        return Vec::new();
    }

    SCAN_ORDER
        .into_iter()
        .filter_map(|direction| world.terrain.neighbor(world.player.position, direction))
        .filter(|position| world.surface.get(*position).map_or(false, accept))
        .collect()
}

pub(crate) fn usable_positions(world: &World) -> Vec<Position> {
    neighbours_where(world, Cell::is_usable)
}

pub(crate) fn droppable_positions(world: &World) -> Vec<Position> {
    neighbours_where(world, Cell::is_droppable)
}

/// Uses every usable neighbour of the player.
pub(crate) fn toggle_use(world: &mut World, out_events: &mut Vec<Event>) {
    for position in usable_positions(world) {
        match world.surface.get(position) {
            Some(cell @ (Cell::Cube | Cell::ActivatedCubeButton)) => {
                if !world.player.holding {
                    pick_up(world, position, cell, out_events);
                }
            }
            Some(Cell::Button) => press_button(world, position, out_events),
            _ => {}
        }
    }
}

fn pick_up(world: &mut World, position: Position, cell: Cell, out_events: &mut Vec<Event>) {
    world.player.holding = true;
    world.paint_player();

    if cell == Cell::ActivatedCubeButton {
        world.paint(position, Cell::CubeButton);
        if let Some(index) = world.prop_index(position) {
            if let Prop::Button(button) = &mut world.props[index] {
                button.activated = false;
            }
        }
    } else {
        world.paint(position, Cell::None);
    }

    out_events.push(Event::CubePickedUp { from: position });
}

fn press_button(world: &mut World, position: Position, out_events: &mut Vec<Event>) {
    let Some(index) = world.prop_index(position) else {
        return;
    };
    let Prop::Button(button) = &mut world.props[index] else {
        return;
    };
    button.activated = true;
    let timer = button.timer;
    let link = button.activate;

    if let Some(ticks) = timer {
        world.ticks.arm(position, ticks);
    }
    world.paint(position, Cell::ActivatedButton);
    out_events.push(Event::ButtonPressed { button: position });

    if let Some(target) = link {
        activate_link(world, target);
    }
}

/// Puts the held cube down on the neighbour in `direction`.
pub(crate) fn drop_cube(world: &mut World, direction: Direction, out_events: &mut Vec<Event>) {
    if !world.player.holding || !world.player_is_in_the_world() {
        return;
    }
    let Some(target) = world.terrain.neighbor(world.player.position, direction) else {
        return;
    };

    match world.surface.get(target) {
        Some(Cell::CubeButton) => {
            world.paint(target, Cell::ActivatedCubeButton);
            let mut link = None;
            if let Some(index) = world.prop_index(target) {
                if let Prop::Button(button) = &mut world.props[index] {
                    button.activated = true;
                    link = button.activate;
                    out_events.push(Event::ButtonPressed { button: target });
                }
            }
            if let Some(linked) = link {
                activate_link(world, linked);
            }
        }
        Some(Cell::None) => world.paint(target, Cell::Cube),
        _ => return,
    }

    world.player.holding = false;
    world.paint_player();
    out_events.push(Event::CubeDropped { at: target });
}

/// Activates the prop referenced by an activation link, if it still exists.
fn activate_link(world: &mut World, target: Position) {
    let Some(index) = world.prop_index(target) else {
        debug!(%target, "activation link points at nothing");
        return;
    };
    let prop = &mut world.props[index];
    prop.set_activated(true);

    let cell = match prop {
        Prop::Door(_) => Some(Cell::OpenedDoor),
        Prop::CubeDropper(_) => Some(Cell::Cube),
        Prop::Button(_) => None,
    };
    if let Some(cell) = cell {
        world.paint(target, cell);
    }
}

/// Reverts the prop referenced by an expired button's activation link.
///
/// Doors close again; a cube dropper only loses its flag and its cube stays.
pub(crate) fn deactivate_link(world: &mut World, target: Position) {
    let Some(index) = world.prop_index(target) else {
        return;
    };
    let cell = match &mut world.props[index] {
        Prop::Door(door) => {
            door.activated = false;
            Some(Cell::ClosedDoor)
        }
        Prop::CubeDropper(dropper) => {
            dropper.activated = false;
            None
        }
        Prop::Button(_) => None,
    };
    if let Some(cell) = cell {
        world.paint(target, cell);
    }
}
