#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Portal Grid engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and the session that drives it. Adapters submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! that subscribers observe. Levels are described by a [`Level`] bundle that
//! the authoring and persistence collaborators produce.

use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};

/// Kind of a single grid cell.
///
/// A cell kind is both rendering state and game-logic state: interactive props
/// overwrite the terrain cell at their position instead of living on a separate
/// layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cell {
    /// Empty floor.
    None,
    /// Wall that accepts portals.
    Wall,
    /// Wall that never hosts a portal.
    NonPortalableWall,
    /// Orange end of the portal pair.
    OrangePortal,
    /// Blue end of the portal pair.
    BluePortal,
    /// Weight-activated button without a cube on it.
    CubeButton,
    /// Weight-activated button holding a cube.
    ActivatedCubeButton,
    /// Button pressed by using it.
    Button,
    /// Button that has been pressed.
    ActivatedButton,
    /// Loose cube lying on the floor.
    Cube,
    /// Trap that dissolves both portals when entered.
    ClearField,
    /// Player with empty hands.
    Player,
    /// Player carrying a cube.
    PlayerHoldingACube,
    /// Door blocking the way.
    ClosedDoor,
    /// Door that can be walked through.
    OpenedDoor,
    /// Hazard that damages a player standing in it.
    Goo,
    /// Exit of the level.
    Goal,
}

impl Cell {
    /// Every cell kind in declaration order.
    pub const ALL: [Cell; 17] = [
        Cell::None,
        Cell::Wall,
        Cell::NonPortalableWall,
        Cell::OrangePortal,
        Cell::BluePortal,
        Cell::CubeButton,
        Cell::ActivatedCubeButton,
        Cell::Button,
        Cell::ActivatedButton,
        Cell::Cube,
        Cell::ClearField,
        Cell::Player,
        Cell::PlayerHoldingACube,
        Cell::ClosedDoor,
        Cell::OpenedDoor,
        Cell::Goo,
        Cell::Goal,
    ];

    /// Single character used by the textual grid dump.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::None => '.',
            Self::Wall => '#',
            Self::NonPortalableWall => '=',
            Self::OrangePortal => 'O',
            Self::BluePortal => 'B',
            Self::CubeButton => 'c',
            Self::ActivatedCubeButton => 'C',
            Self::Button => 'n',
            Self::ActivatedButton => 'N',
            Self::Cube => 'x',
            Self::ClearField => '~',
            Self::Player => '@',
            Self::PlayerHoldingACube => '&',
            Self::ClosedDoor => '|',
            Self::OpenedDoor => '/',
            Self::Goo => '%',
            Self::Goal => '*',
        }
    }

    /// Parses a glyph produced by [`Cell::glyph`].
    #[must_use]
    pub fn from_glyph(glyph: char) -> Option<Self> {
        Self::ALL.into_iter().find(|cell| cell.glyph() == glyph)
    }

    /// Reports whether the player may step onto a cell of this kind.
    #[must_use]
    pub const fn is_traversable(self) -> bool {
        matches!(
            self,
            Self::None
                | Self::BluePortal
                | Self::OrangePortal
                | Self::ClearField
                | Self::OpenedDoor
                | Self::Goo
                | Self::Goal
        )
    }

    /// Reports whether a neighbouring cell of this kind reacts to the use action.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Cube | Self::Button | Self::ActivatedCubeButton)
    }

    /// Reports whether a held cube can be put down onto a cell of this kind.
    #[must_use]
    pub const fn is_droppable(self) -> bool {
        matches!(self, Self::CubeButton | Self::None)
    }

    /// Reports whether the cell is either end of the portal pair.
    #[must_use]
    pub const fn is_portal(self) -> bool {
        matches!(self, Self::BluePortal | Self::OrangePortal)
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    x: u32,
    y: u32,
}

impl Position {
    /// Creates a new grid position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Zero-based column index.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Zero-based row index.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }

    /// Neighbouring position one step away in `direction`.
    ///
    /// Returns `None` when the step would underflow the top or left edge. The
    /// bottom and right edges depend on the grid and are checked by the world.
    #[must_use]
    pub fn step(self, direction: Direction) -> Option<Self> {
        match direction {
            Direction::Up => self.y.checked_sub(1).map(|y| Self::new(self.x, y)),
            Direction::Down => self.y.checked_add(1).map(|y| Self::new(self.x, y)),
            Direction::Left => self.x.checked_sub(1).map(|x| Self::new(x, self.y)),
            Direction::Right => self.x.checked_add(1).map(|x| Self::new(x, self.y)),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal directions available to the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Toward decreasing row indices.
    Up,
    /// Toward increasing row indices.
    Down,
    /// Toward decreasing column indices.
    Left,
    /// Toward increasing column indices.
    Right,
}

/// One end of the portal pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortalColor {
    /// Blue portal.
    Blue,
    /// Orange portal.
    Orange,
}

impl PortalColor {
    /// Cell kind painted where a portal of this color sits.
    #[must_use]
    pub const fn cell(self) -> Cell {
        match self {
            Self::Blue => Cell::BluePortal,
            Self::Orange => Cell::OrangePortal,
        }
    }
}

/// Portal gun modes a player can carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortalGun {
    /// No portal gun.
    #[default]
    None,
    /// Fires blue portals only.
    BlueOnly,
    /// Fires orange portals only.
    OrangeOnly,
    /// Fires both colors.
    All,
}

impl PortalGun {
    /// Reports whether the gun mode permits firing `color`.
    #[must_use]
    pub const fn can_fire(self, color: PortalColor) -> bool {
        match (self, color) {
            (Self::All, _) => true,
            (Self::BlueOnly, PortalColor::Blue) => true,
            (Self::OrangeOnly, PortalColor::Orange) => true,
            _ => false,
        }
    }
}

/// State of the player at construction time and during play.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Cell the player occupies.
    pub position: Position,
    /// Portal gun the player carries.
    #[serde(default)]
    pub portalgun: PortalGun,
    /// Remaining health; the player dies at zero or below.
    pub health: i32,
    /// Whether the player is carrying a cube.
    #[serde(default)]
    pub holding: bool,
}

impl Player {
    /// Creates an empty-handed player without a portal gun.
    #[must_use]
    pub const fn new(position: Position, health: i32) -> Self {
        Self {
            position,
            portalgun: PortalGun::None,
            health,
            holding: false,
        }
    }

    /// Returns the player equipped with the provided portal gun.
    #[must_use]
    pub const fn with_portalgun(mut self, portalgun: PortalGun) -> Self {
        self.portalgun = portalgun;
        self
    }
}

/// Positions of the two portal ends; `None` when a portal is not placed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portals {
    /// Blue portal position.
    pub blue: Option<Position>,
    /// Orange portal position.
    pub orange: Option<Position>,
}

impl Portals {
    /// Position of the portal with the provided color.
    #[must_use]
    pub const fn get(&self, color: PortalColor) -> Option<Position> {
        match color {
            PortalColor::Blue => self.blue,
            PortalColor::Orange => self.orange,
        }
    }

    /// Replaces the slot of the provided color.
    pub fn set(&mut self, color: PortalColor, position: Option<Position>) {
        match color {
            PortalColor::Blue => self.blue = position,
            PortalColor::Orange => self.orange = position,
        }
    }
}

/// Button that toggles another prop when pressed or weighed down.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Cell the button occupies.
    pub position: Position,
    /// Position of the prop this button controls, if any.
    #[serde(default)]
    pub activate: Option<Position>,
    /// Whether the button is currently pressed.
    #[serde(default)]
    pub activated: bool,
    /// Whether the button is weight-activated by a cube.
    #[serde(default)]
    pub cube: bool,
    /// Ticks until a pressed button releases itself; `None` keeps it pressed.
    #[serde(default)]
    pub timer: Option<u32>,
}

impl Button {
    /// Cell kind painted for this button in its current state.
    #[must_use]
    pub const fn cell(&self) -> Cell {
        match (self.cube, self.activated) {
            (true, true) => Cell::ActivatedCubeButton,
            (true, false) => Cell::CubeButton,
            (false, true) => Cell::ActivatedButton,
            (false, false) => Cell::Button,
        }
    }
}

/// Door opened by an activation link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    /// Cell the door occupies.
    pub position: Position,
    /// Whether the door is open.
    #[serde(default)]
    pub activated: bool,
}

/// Dispenser that spawns a cube at its position when activated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeDropper {
    /// Cell the dropper spawns its cube on.
    pub position: Position,
    /// Whether the dropper has been triggered.
    #[serde(default)]
    pub activated: bool,
}

/// Interactive, positioned entity distinct from plain terrain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Prop {
    /// A button.
    Button(Button),
    /// A door.
    Door(Door),
    /// A cube dropper.
    CubeDropper(CubeDropper),
}

impl Prop {
    /// Cell the prop occupies.
    #[must_use]
    pub const fn position(&self) -> Position {
        match self {
            Self::Button(button) => button.position,
            Self::Door(door) => door.position,
            Self::CubeDropper(dropper) => dropper.position,
        }
    }

    /// Whether the prop is currently activated.
    #[must_use]
    pub const fn activated(&self) -> bool {
        match self {
            Self::Button(button) => button.activated,
            Self::Door(door) => door.activated,
            Self::CubeDropper(dropper) => dropper.activated,
        }
    }

    /// Updates the activation flag of the prop.
    pub fn set_activated(&mut self, activated: bool) {
        match self {
            Self::Button(button) => button.activated = activated,
            Self::Door(door) => door.activated = activated,
            Self::CubeDropper(dropper) => dropper.activated = activated,
        }
    }

    /// Cell kind the prop paints in its current state.
    ///
    /// An idle cube dropper paints nothing and leaves the terrain visible.
    #[must_use]
    pub const fn cell(&self) -> Option<Cell> {
        match self {
            Self::Button(button) => Some(button.cell()),
            Self::Door(door) => Some(if door.activated {
                Cell::OpenedDoor
            } else {
                Cell::ClosedDoor
            }),
            Self::CubeDropper(dropper) => {
                if dropper.activated {
                    Some(Cell::Cube)
                } else {
                    None
                }
            }
        }
    }
}

/// Dimensions of a world measured in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSize {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
}

/// Static layout of a level before props, portals and the player are painted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldLayout {
    /// Declared dimensions of the field.
    pub size: WorldSize,
    /// Rows of cells, `size.height` rows of `size.width` cells each.
    pub field: Vec<Vec<Cell>>,
}

impl WorldLayout {
    /// Parses a layout from rows of cell glyphs.
    ///
    /// The declared size is taken from the row count and the first row's
    /// length; ragged rows are kept as-is so the world can reject them.
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self, UnknownGlyph> {
        let mut field = Vec::with_capacity(rows.len());
        for (y, row) in rows.iter().enumerate() {
            let mut cells = Vec::new();
            for (x, glyph) in row.as_ref().chars().enumerate() {
                let cell = Cell::from_glyph(glyph).ok_or(UnknownGlyph { glyph, x, y })?;
                cells.push(cell);
            }
            field.push(cells);
        }

        let width = field.first().map_or(0, Vec::len);
        Ok(Self {
            size: WorldSize {
                width: u32::try_from(width).unwrap_or(u32::MAX),
                height: u32::try_from(field.len()).unwrap_or(u32::MAX),
            },
            field,
        })
    }
}

/// Glyph that does not name any [`Cell`] kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownGlyph {
    /// Offending character.
    pub glyph: char,
    /// Column the character was found in.
    pub x: usize,
    /// Row the character was found in.
    pub y: usize,
}

impl fmt::Display for UnknownGlyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown cell glyph '{}' at ({}, {})",
            self.glyph, self.x, self.y
        )
    }
}

impl Error for UnknownGlyph {}

/// Everything required to construct a play session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Static layout.
    pub world: WorldLayout,
    /// Starting player state.
    pub player: Player,
    /// Portals placed before play starts.
    #[serde(default)]
    pub portals: Portals,
    /// Interactive props.
    #[serde(default)]
    pub props: Vec<Prop>,
}

/// Follow-up inputs the caller may be waiting for before issuing a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectionPrompt {
    /// The next direction fires the blue portal.
    BluePortal,
    /// The next direction fires the orange portal.
    OrangePortal,
    /// The next direction drops the held cube.
    Drop,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Moves the player one cell, following portals.
    Move {
        /// Direction of travel.
        direction: Direction,
    },
    /// Fires the portal selected by the pending direction prompt.
    ShootPortal {
        /// Direction the shot travels.
        direction: Direction,
    },
    /// Uses every usable neighbour of the player.
    ToggleUse,
    /// Puts the held cube down on a neighbouring cell.
    Drop {
        /// Side of the player the cube is dropped on.
        direction: Direction,
    },
    /// Marks whether the caller awaits a direction for a follow-up command.
    SetDirectionPrompt {
        /// Prompt being toggled.
        prompt: DirectionPrompt,
        /// Whether the prompt is pending.
        waiting: bool,
    },
    /// Advances the simulation clock by one tick.
    Tick,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// The simulation clock advanced.
    TimeAdvanced {
        /// Number of the tick that was just processed.
        tick: u64,
    },
    /// The player's health changed.
    HealthChanged {
        /// Health after the change.
        health: i32,
    },
    /// A timed button released itself.
    TimerExpired {
        /// Position of the released button.
        button: Position,
    },
    /// The player's health is at or below zero.
    PlayerDied,
    /// The player moved, possibly through a portal.
    PlayerMoved {
        /// Cell the player left.
        from: Position,
        /// Cell the player ended up on.
        to: Position,
    },
    /// A portal landed on a cell.
    PortalPlaced {
        /// Color of the portal.
        color: PortalColor,
        /// Cell the portal occupies.
        position: Position,
    },
    /// A portal shot found no surface; the portal of that color is gone.
    PortalMissed {
        /// Color of the portal.
        color: PortalColor,
    },
    /// A clear field removed both portals.
    PortalsDissolved,
    /// The player lifted a cube.
    CubePickedUp {
        /// Cell the cube was lifted from.
        from: Position,
    },
    /// The player put a cube down.
    CubeDropped {
        /// Cell the cube was put on.
        at: Position,
    },
    /// A button was pressed or weighed down.
    ButtonPressed {
        /// Position of the button.
        button: Position,
    },
}
