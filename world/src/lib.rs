#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Portal Grid.
//!
//! The world keeps two grids of identical size: the terrain, which holds the
//! static layout together with placed portals and props, and the play surface,
//! which additionally shows transient occupants such as the player. Whenever an
//! occupant leaves a cell the surface is restored from the terrain.

use std::fmt;

use portal_grid_core::{
    Cell, Command, DirectionPrompt, Event, Level, Player, PortalColor, Portals, Position, Prop,
    WorldSize,
};
use thiserror::Error;
use tracing::debug;

mod grid;
mod interaction;
mod movement;
mod portals;
mod ticks;

use grid::Grid;
use ticks::TickState;

/// Largest number of cells a world may contain.
pub const MAX_CELLS: u64 = 200;

/// Health removed by each goo damage pulse.
pub const GOO_DAMAGE: i32 = 20;

/// Ticks between consecutive goo damage pulses while the player stays in goo.
pub const GOO_DAMAGE_PERIOD: u64 = 1000;

/// Integrity violations detected while constructing a [`World`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// The declared size holds no cells or more than [`MAX_CELLS`].
    #[error("world is too big or too small ({width}x{height})")]
    WorldSize {
        /// Declared column count.
        width: u32,
        /// Declared row count.
        height: u32,
    },
    /// The field does not have the declared number of rows and columns.
    #[error("world is shorter or larger than its setting")]
    DimensionMismatch,
    /// The player starts outside of the field.
    #[error("player is out of world at {position}")]
    PlayerOutOfWorld {
        /// Requested starting cell.
        position: Position,
    },
    /// A preset portal lies outside of the field.
    #[error("{color:?} portal is out of world at {position}")]
    PortalOutOfWorld {
        /// Color of the offending portal.
        color: PortalColor,
        /// Requested portal cell.
        position: Position,
    },
    /// A prop lies outside of the field.
    #[error("prop settings are weird: prop at {position} is out of world")]
    PropOutOfWorld {
        /// Requested prop cell.
        position: Position,
    },
    /// Portal slots disagree with the cells painted on the terrain.
    #[error("portal settings are weird")]
    InconsistentPortals,
}

/// Represents the authoritative Portal Grid world state.
#[derive(Clone, Debug)]
pub struct World {
    terrain: Grid,
    surface: Grid,
    player: Player,
    portals: Portals,
    props: Vec<Prop>,
    prompts: Prompts,
    tick: u64,
    ticks: TickState,
}

impl World {
    /// Builds a world from a level, validating its integrity.
    pub fn new(level: Level) -> Result<Self, ConstructionError> {
        let Level {
            world: layout,
            player,
            portals,
            props,
        } = level;
        let WorldSize { width, height } = layout.size;

        let cell_count = u64::from(width) * u64::from(height);
        if cell_count == 0 || cell_count > MAX_CELLS {
            return Err(ConstructionError::WorldSize { width, height });
        }

        let rows_match = usize::try_from(height).map_or(false, |rows| layout.field.len() == rows);
        let columns_match = usize::try_from(width).map_or(false, |columns| {
            layout.field.iter().all(|row| row.len() == columns)
        });
        if !rows_match || !columns_match {
            return Err(ConstructionError::DimensionMismatch);
        }

        let terrain = Grid::from_field(layout.size, &layout.field);
        let mut world = Self {
            surface: terrain.clone(),
            terrain,
            player,
            portals,
            props: Vec::new(),
            prompts: Prompts::default(),
            tick: 0,
            ticks: TickState::default(),
        };

        if !world.player_is_in_the_world() {
            return Err(ConstructionError::PlayerOutOfWorld {
                position: world.player.position,
            });
        }

        for color in [PortalColor::Blue, PortalColor::Orange] {
            if let Some(position) = world.portals.get(color) {
                if !world.terrain.contains(position) {
                    return Err(ConstructionError::PortalOutOfWorld { color, position });
                }
                world.paint(position, color.cell());
            }
        }

        for prop in &props {
            let position = prop.position();
            if !world.terrain.contains(position) {
                return Err(ConstructionError::PropOutOfWorld { position });
            }
            if let Some(cell) = prop.cell() {
                world.paint(position, cell);
            }
        }
        world.props = props;

        if !portals::are_portals_real(&world) {
            return Err(ConstructionError::InconsistentPortals);
        }

        world.paint_player();
        debug!(width, height, props = world.props.len(), "world constructed");
        Ok(world)
    }

    fn player_is_in_the_world(&self) -> bool {
        self.terrain.contains(self.player.position)
    }

    /// Writes `cell` into both the terrain and the play surface.
    fn paint(&mut self, position: Position, cell: Cell) {
        self.terrain.set(position, cell);
        self.surface.set(position, cell);
    }

    /// Restores the play surface at `position` from the terrain.
    fn restore(&mut self, position: Position) {
        if let Some(cell) = self.terrain.get(position) {
            self.surface.set(position, cell);
        }
    }

    fn paint_player(&mut self) {
        let cell = if self.player.holding {
            Cell::PlayerHoldingACube
        } else {
            Cell::Player
        };
        self.surface.set(self.player.position, cell);
    }

    fn prop_index(&self, position: Position) -> Option<usize> {
        self.props
            .iter()
            .position(|prop| prop.position() == position)
    }
}

impl fmt::Display for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, row) in self.surface.rows().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            for cell in row {
                write!(f, "{}", cell.glyph())?;
            }
        }
        Ok(())
    }
}

/// Follow-up inputs the caller announced it is waiting for.
#[derive(Clone, Copy, Debug, Default)]
struct Prompts {
    blue_portal: bool,
    orange_portal: bool,
    drop: bool,
}

impl Prompts {
    fn get(&self, prompt: DirectionPrompt) -> bool {
        match prompt {
            DirectionPrompt::BluePortal => self.blue_portal,
            DirectionPrompt::OrangePortal => self.orange_portal,
            DirectionPrompt::Drop => self.drop,
        }
    }

    fn set(&mut self, prompt: DirectionPrompt, waiting: bool) {
        match prompt {
            DirectionPrompt::BluePortal => self.blue_portal = waiting,
            DirectionPrompt::OrangePortal => self.orange_portal = waiting,
            DirectionPrompt::Drop => self.drop = waiting,
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Commands that cannot take effect leave the world untouched and emit no
/// events.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Move { direction } => movement::go_to(world, direction, out_events),
        Command::ShootPortal { direction } => portals::shoot(world, direction, out_events),
        Command::ToggleUse => interaction::toggle_use(world, out_events),
        Command::Drop { direction } => interaction::drop_cube(world, direction, out_events),
        Command::SetDirectionPrompt { prompt, waiting } => world.prompts.set(prompt, waiting),
        Command::Tick => ticks::advance(world, out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use portal_grid_core::{
        Cell, Direction, DirectionPrompt, Player, Portals, Position, Prop, WorldSize,
    };

    use super::{interaction, movement, portals, World};

    /// Current player state.
    #[must_use]
    pub fn player(world: &World) -> &Player {
        &world.player
    }

    /// Remaining player health.
    #[must_use]
    pub fn health(world: &World) -> i32 {
        world.player.health
    }

    /// Placed portals.
    #[must_use]
    pub fn portals(world: &World) -> Portals {
        world.portals
    }

    /// Props in their current state.
    #[must_use]
    pub fn props(world: &World) -> &[Prop] {
        &world.props
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick(world: &World) -> u64 {
        world.tick
    }

    /// Dimensions of the field.
    #[must_use]
    pub fn size(world: &World) -> WorldSize {
        world.terrain.size()
    }

    /// Reports whether the player stands on a cell of the field.
    #[must_use]
    pub fn player_is_in_the_world(world: &World) -> bool {
        world.player_is_in_the_world()
    }

    /// Reports whether portal slots agree with the terrain.
    #[must_use]
    pub fn are_portals_real(world: &World) -> bool {
        portals::are_portals_real(world)
    }

    /// Reports whether the player could step in `direction`.
    #[must_use]
    pub fn can_go(world: &World, direction: Direction) -> bool {
        movement::can_go(world, direction)
    }

    /// Neighbouring cells the use action would affect, in left, right, up,
    /// down order.
    #[must_use]
    pub fn usable_prop_positions(world: &World) -> Vec<Position> {
        interaction::usable_positions(world)
    }

    /// Neighbouring cells a held cube could be dropped on, in left, right, up,
    /// down order.
    #[must_use]
    pub fn droppable_positions(world: &World) -> Vec<Position> {
        interaction::droppable_positions(world)
    }

    /// Cell shown on the play surface at `position`.
    #[must_use]
    pub fn cell_at(world: &World, position: Position) -> Option<Cell> {
        world.surface.get(position)
    }

    /// Terrain cell at `position`, ignoring transient occupants.
    #[must_use]
    pub fn terrain_at(world: &World, position: Position) -> Option<Cell> {
        world.terrain.get(position)
    }

    /// Reports whether the caller announced it awaits a direction for `prompt`.
    #[must_use]
    pub fn is_waiting_for(world: &World, prompt: DirectionPrompt) -> bool {
        world.prompts.get(prompt)
    }

    /// Ticks left before the timed button at `button` releases itself.
    #[must_use]
    pub fn timer_remaining(world: &World, button: Position) -> Option<u32> {
        world.ticks.remaining(button)
    }

    /// Reports whether the player reached the goal cell.
    #[must_use]
    pub fn player_on_goal(world: &World) -> bool {
        world.terrain.get(world.player.position) == Some(Cell::Goal)
    }

    /// Textual dump of the play surface, one line per row and one glyph per
    /// cell.
    #[must_use]
    pub fn render(world: &World) -> String {
        world.to_string()
    }
}
