#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Play session that owns a Portal Grid world for its whole lifetime.
//!
//! A [`Game`] serializes caller commands and clock ticks against a single world
//! behind a lock, so no two mutations interleave. Every event produced while
//! the lock is held is forwarded, in order, to the receivers handed out by
//! [`Game::subscribe`]. Closing the game stops its clock and detaches all
//! subscribers.
//!
//! Subscriber queues are bounded. Once a queue holds [`TICK_EVENT_BACKLOG`]
//! events, per-tick notifications are skipped for it until it is drained;
//! every other notification is still queued. A subscriber whose queue fills up
//! completely is detached and observes a disconnected receiver.

use std::{
    fmt, io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use portal_grid_core::{
    Cell, Command, Direction, DirectionPrompt, Event, Level, Player, PortalColor, Portals,
    Position, Prop, WorldSize,
};
use portal_grid_system_clock::{self as clock, Clock};
use portal_grid_world::{self as world, query, ConstructionError, World};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Capacity of every subscriber queue.
pub const SUBSCRIBER_QUEUE_DEPTH: usize = 256;

/// Queue length from which per-tick notifications are no longer queued.
pub const TICK_EVENT_BACKLOG: usize = SUBSCRIBER_QUEUE_DEPTH / 2;

/// Source of ticks for a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockMode {
    /// A dedicated thread ticks the world at the configured cadence.
    FreeRunning(clock::Config),
    /// Ticks are applied only through [`Game::advance`].
    Manual,
}

/// Configuration parameters required to start a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    clock: ClockMode,
}

impl Config {
    /// Creates a configuration using the provided tick source.
    #[must_use]
    pub const fn new(clock: ClockMode) -> Self {
        Self { clock }
    }

    /// Configuration for sessions driven exclusively by [`Game::advance`].
    #[must_use]
    pub const fn manual() -> Self {
        Self::new(ClockMode::Manual)
    }

    /// Tick source of the session.
    #[must_use]
    pub const fn clock(&self) -> ClockMode {
        self.clock
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(ClockMode::FreeRunning(clock::Config::default()))
    }
}

/// Failures that prevent a session from starting.
#[derive(Debug, Error)]
pub enum StartError {
    /// The level violates world integrity rules.
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    /// The clock thread could not be spawned.
    #[error("failed to spawn the clock thread")]
    Clock(#[source] io::Error),
}

/// Running play session.
#[derive(Debug)]
pub struct Game {
    shared: Arc<Shared>,
    clock: Mutex<Option<Clock>>,
}

impl Game {
    /// Builds the world from `level` and starts its tick source.
    pub fn start(level: Level, config: Config) -> Result<Self, StartError> {
        let world = World::new(level)?;
        let shared = Arc::new(Shared {
            world: Mutex::new(world),
            subscribers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });

        let clock = match config.clock() {
            ClockMode::FreeRunning(clock_config) => {
                let ticking = Arc::clone(&shared);
                let clock = Clock::spawn(clock_config, move |_| {
                    let _ = ticking.apply(&[Command::Tick]);
                })
                .map_err(StartError::Clock)?;
                Some(clock)
            }
            ClockMode::Manual => None,
        };
        info!(clock = ?config.clock(), "game started");

        Ok(Self {
            shared,
            clock: Mutex::new(clock),
        })
    }

    /// Registers a new observer of every event raised from now on.
    ///
    /// The receiver disconnects once the game is closed, or once it falls
    /// [`SUBSCRIBER_QUEUE_DEPTH`] events behind.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_QUEUE_DEPTH);
        let mut subscribers = lock(&self.shared.subscribers);
        if !self.shared.closed.load(Ordering::SeqCst) {
            subscribers.push(tx);
        }
        rx
    }

    /// Stops the clock and detaches every subscriber. Safe to call repeatedly.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(mut clock) = lock(&self.clock).take() {
            clock.stop();
        }
        lock(&self.shared.subscribers).clear();
        info!(tick = self.tick(), "game closed");
    }

    /// Reports whether [`Game::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Applies `ticks` ticks synchronously and returns the events they raised.
    pub fn advance(&self, ticks: u64) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(self.shared.apply(&[Command::Tick]));
        }
        events
    }

    /// Moves the player one cell; returns whether the player actually moved.
    pub fn go_to(&self, direction: Direction) -> bool {
        self.shared
            .apply(&[Command::Move { direction }])
            .iter()
            .any(|event| matches!(event, Event::PlayerMoved { .. }))
    }

    /// Fires the portal selected by the waiting-for-direction flags.
    pub fn shoot_portal(&self, direction: Direction) {
        let _ = self.shared.apply(&[Command::ShootPortal { direction }]);
    }

    /// Arms the flag for `color` and fires in `direction` as one operation.
    pub fn fire_portal(&self, color: PortalColor, direction: Direction) {
        let prompt = match color {
            PortalColor::Blue => DirectionPrompt::BluePortal,
            PortalColor::Orange => DirectionPrompt::OrangePortal,
        };
        let _ = self.shared.apply(&[
            Command::SetDirectionPrompt {
                prompt,
                waiting: true,
            },
            Command::ShootPortal { direction },
        ]);
    }

    /// Uses every usable neighbour of the player.
    pub fn toggle_use(&self) {
        let _ = self.shared.apply(&[Command::ToggleUse]);
    }

    /// Puts the held cube down on the neighbour in `direction`.
    pub fn drop_cube(&self, direction: Direction) {
        let _ = self.shared.apply(&[Command::Drop { direction }]);
    }

    /// Marks whether the next direction fires the blue portal.
    pub fn set_waiting_for_blue_portal_direction(&self, waiting: bool) {
        self.set_prompt(DirectionPrompt::BluePortal, waiting);
    }

    /// Marks whether the next direction fires the orange portal.
    pub fn set_waiting_for_orange_portal_direction(&self, waiting: bool) {
        self.set_prompt(DirectionPrompt::OrangePortal, waiting);
    }

    /// Marks whether the next direction drops the held cube.
    pub fn set_waiting_for_drop_direction(&self, waiting: bool) {
        self.set_prompt(DirectionPrompt::Drop, waiting);
    }

    /// Whether the next direction fires the blue portal.
    #[must_use]
    pub fn waiting_for_blue_portal_direction(&self) -> bool {
        self.shared
            .read(|world| query::is_waiting_for(world, DirectionPrompt::BluePortal))
    }

    /// Whether the next direction fires the orange portal.
    #[must_use]
    pub fn waiting_for_orange_portal_direction(&self) -> bool {
        self.shared
            .read(|world| query::is_waiting_for(world, DirectionPrompt::OrangePortal))
    }

    /// Whether the next direction drops the held cube.
    #[must_use]
    pub fn waiting_for_drop_direction(&self) -> bool {
        self.shared
            .read(|world| query::is_waiting_for(world, DirectionPrompt::Drop))
    }

    fn set_prompt(&self, prompt: DirectionPrompt, waiting: bool) {
        let _ = self
            .shared
            .apply(&[Command::SetDirectionPrompt { prompt, waiting }]);
    }

    /// Reports whether the player stands on a cell of the field.
    #[must_use]
    pub fn player_is_in_the_world(&self) -> bool {
        self.shared.read(query::player_is_in_the_world)
    }

    /// Reports whether portal slots agree with the terrain.
    #[must_use]
    pub fn are_portals_real(&self) -> bool {
        self.shared.read(query::are_portals_real)
    }

    /// Remaining player health.
    #[must_use]
    pub fn health(&self) -> i32 {
        self.shared.read(query::health)
    }

    /// Snapshot of the player.
    #[must_use]
    pub fn player(&self) -> Player {
        self.shared.read(|world| query::player(world).clone())
    }

    /// Placed portals.
    #[must_use]
    pub fn portals(&self) -> Portals {
        self.shared.read(query::portals)
    }

    /// Snapshot of every prop.
    #[must_use]
    pub fn props(&self) -> Vec<Prop> {
        self.shared.read(|world| query::props(world).to_vec())
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.shared.read(query::tick)
    }

    /// Dimensions of the field.
    #[must_use]
    pub fn size(&self) -> WorldSize {
        self.shared.read(query::size)
    }

    /// Neighbouring cells the use action would affect.
    #[must_use]
    pub fn usable_prop_positions(&self) -> Vec<Position> {
        self.shared.read(query::usable_prop_positions)
    }

    /// Neighbouring cells a held cube could be dropped on.
    #[must_use]
    pub fn droppable_positions(&self) -> Vec<Position> {
        self.shared.read(query::droppable_positions)
    }

    /// Cell shown on the play surface at `position`.
    #[must_use]
    pub fn cell_at(&self, position: Position) -> Option<Cell> {
        self.shared.read(|world| query::cell_at(world, position))
    }

    /// Terrain cell at `position`.
    #[must_use]
    pub fn terrain_at(&self, position: Position) -> Option<Cell> {
        self.shared.read(|world| query::terrain_at(world, position))
    }

    /// Reports whether the player reached the goal cell.
    #[must_use]
    pub fn player_on_goal(&self) -> bool {
        self.shared.read(query::player_on_goal)
    }

    /// Textual dump of the play surface.
    #[must_use]
    pub fn render(&self) -> String {
        self.shared.read(query::render)
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug)]
struct Shared {
    world: Mutex<World>,
    subscribers: Mutex<Vec<Sender<Event>>>,
    closed: AtomicBool,
}

impl Shared {
    /// Applies `commands` under one lock acquisition and publishes their events
    /// before releasing it.
    fn apply(&self, commands: &[Command]) -> Vec<Event> {
        let mut world = lock(&self.world);
        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut world, *command, &mut events);
        }
        self.publish(&events);
        events
    }

    fn publish(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|subscriber| deliver(subscriber, events));
        if subscribers.len() != before {
            debug!(
                dropped = before - subscribers.len(),
                "detached subscribers"
            );
        }
    }

    fn read<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        f(&lock(&self.world))
    }
}

/// Queues `events` for one subscriber; returns `false` once it must be
/// detached.
fn deliver(subscriber: &Sender<Event>, events: &[Event]) -> bool {
    for event in events {
        if repeats_every_tick(event) && subscriber.len() >= TICK_EVENT_BACKLOG {
            continue;
        }
        match subscriber.try_send(*event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(?event, "subscriber queue is full, detaching it");
                return false;
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
    true
}

/// Notifications that the next tick raises again, so skipping one loses
/// nothing a lagging subscriber could act on.
fn repeats_every_tick(event: &Event) -> bool {
    matches!(event, Event::TimeAdvanced { .. } | Event::PlayerDied)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
