//! Per-tick update: goo damage, timed button expiry and the death check.

use std::collections::BTreeMap;

use portal_grid_core::{Cell, Event, Position, Prop};
use tracing::debug;

use crate::{interaction, World, GOO_DAMAGE, GOO_DAMAGE_PERIOD};

/// Transient scheduler state, never persisted.
#[derive(Clone, Debug, Default)]
pub(crate) struct TickState {
    goo_entry: Option<u64>,
    timers: BTreeMap<Position, u32>,
}

impl TickState {
    /// Starts (or restarts) the countdown of a timed button.
    ///
    /// A zero countdown never runs out, so such a button stays pressed.
    pub(crate) fn arm(&mut self, button: Position, ticks: u32) {
        if ticks == 0 {
            return;
        }
        let _ = self.timers.insert(button, ticks);
    }

    pub(crate) fn remaining(&self, button: Position) -> Option<u32> {
        self.timers.get(&button).copied()
    }

    /// Counts every timer down by one tick and returns the buttons that ran out.
    fn count_down(&mut self) -> Vec<Position> {
        let mut expired = Vec::new();
        self.timers.retain(|button, remaining| {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                expired.push(*button);
                false
            } else {
                true
            }
        });
        expired
    }
}

pub(crate) fn advance(world: &mut World, out_events: &mut Vec<Event>) {
    world.tick = world.tick.saturating_add(1);
    let tick = world.tick;
    out_events.push(Event::TimeAdvanced { tick });

    apply_goo(world, tick, out_events);

    for button in world.ticks.count_down() {
        release_button(world, button, out_events);
    }

    if world.player.health <= 0 {
        out_events.push(Event::PlayerDied);
    }
}

fn apply_goo(world: &mut World, tick: u64, out_events: &mut Vec<Event>) {
    let in_goo = world.terrain.get(world.player.position) == Some(Cell::Goo);
    if !in_goo {
        world.ticks.goo_entry = None;
        return;
    }

    let pulse = match world.ticks.goo_entry {
        None => {
            world.ticks.goo_entry = Some(tick);
            true
        }
        Some(entry) => (tick - entry) % GOO_DAMAGE_PERIOD == 0,
    };

    if pulse {
        world.player.health = world.player.health.saturating_sub(GOO_DAMAGE);
        out_events.push(Event::HealthChanged {
            health: world.player.health,
        });
    }
}

fn release_button(world: &mut World, position: Position, out_events: &mut Vec<Event>) {
    let Some(index) = world.prop_index(position) else {
        return;
    };
    let Prop::Button(button) = &mut world.props[index] else {
        return;
    };
    button.activated = false;
    let cell = button.cell();
    let link = button.activate;

    world.paint(position, cell);
    if let Some(target) = link {
        interaction::deactivate_link(world, target);
    }

    debug!(%position, "button timer expired");
    out_events.push(Event::TimerExpired { button: position });
}

#[cfg(test)]
mod tests {
    use portal_grid_core::{
        Button, Command, CubeDropper, Direction, Door, Level, Player, Portals, WorldLayout,
    };

    use super::*;
    use crate::{apply, query};

    fn world(rows: &[&str], player: Position, health: i32, props: Vec<Prop>) -> World {
        World::new(Level {
            world: WorldLayout::parse(rows).expect("layout parses"),
            player: Player::new(player, health),
            portals: Portals::default(),
            props,
        })
        .expect("world builds")
    }

    fn tick(world: &mut World, count: u64) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..count {
            apply(world, Command::Tick, &mut events);
        }
        events
    }

    fn health_changes(events: &[Event]) -> Vec<i32> {
        events
            .iter()
            .filter_map(|event| match event {
                Event::HealthChanged { health } => Some(*health),
                _ => None,
            })
            .collect()
    }

    fn step(world: &mut World, direction: Direction) {
        let mut events = Vec::new();
        apply(world, Command::Move { direction }, &mut events);
    }

    #[test]
    fn ticks_are_numbered_from_one() {
        let mut world = world(&[".."], Position::new(0, 0), 100, Vec::new());

        let events = tick(&mut world, 2);

        assert_eq!(
            events,
            vec![
                Event::TimeAdvanced { tick: 1 },
                Event::TimeAdvanced { tick: 2 }
            ]
        );
        assert_eq!(query::tick(&world), 2);
    }

    #[test]
    fn goo_hurts_on_entry_and_every_period() {
        let mut world = world(&["%."], Position::new(0, 0), 100, Vec::new());

        assert_eq!(health_changes(&tick(&mut world, 1)), vec![80]);
        assert_eq!(health_changes(&tick(&mut world, 999)), Vec::<i32>::new());
        assert_eq!(health_changes(&tick(&mut world, 1)), vec![60]);
        assert_eq!(health_changes(&tick(&mut world, 1000)), vec![40]);
        assert_eq!(query::health(&world), 40);
    }

    #[test]
    fn leaving_goo_early_stops_damage() {
        let mut world = world(&[".%."], Position::new(0, 0), 100, Vec::new());
        step(&mut world, Direction::Right);
        assert_eq!(health_changes(&tick(&mut world, 1)), vec![80]);

        let _ = tick(&mut world, 500);
        step(&mut world, Direction::Right);

        assert!(health_changes(&tick(&mut world, 3000)).is_empty());
        assert_eq!(query::health(&world), 80);
    }

    #[test]
    fn reentering_goo_hurts_immediately() {
        let mut world = world(&[".%"], Position::new(1, 0), 100, Vec::new());
        let _ = tick(&mut world, 10);
        step(&mut world, Direction::Left);
        let _ = tick(&mut world, 1);
        step(&mut world, Direction::Right);

        assert_eq!(health_changes(&tick(&mut world, 1)), vec![60]);
    }

    #[test]
    fn death_is_reported_every_tick() {
        let mut world = world(&["%"], Position::new(0, 0), 20, Vec::new());

        let events = tick(&mut world, 3);

        let deaths = events
            .iter()
            .filter(|event| **event == Event::PlayerDied)
            .count();
        assert_eq!(deaths, 3);
        assert_eq!(query::health(&world), 0);
    }

    #[test]
    fn timed_button_closes_linked_door() {
        let mut world = world(
            &["...", "..."],
            Position::new(1, 0),
            100,
            vec![
                Prop::Button(Button {
                    position: Position::new(0, 0),
                    activate: Some(Position::new(2, 1)),
                    activated: false,
                    cube: false,
                    timer: Some(3000),
                }),
                Prop::Door(Door {
                    position: Position::new(2, 1),
                    activated: false,
                }),
            ],
        );
        let _ = tick(&mut world, 7);
        let mut events = Vec::new();
        apply(&mut world, Command::ToggleUse, &mut events);
        assert_eq!(query::render(&world), "N@.\n../");
        assert_eq!(query::timer_remaining(&world, Position::new(0, 0)), Some(3000));

        let events = tick(&mut world, 2999);
        assert!(!events
            .iter()
            .any(|event| matches!(event, Event::TimerExpired { .. })));
        assert_eq!(query::render(&world), "N@.\n../");

        let events = tick(&mut world, 1);
        assert_eq!(
            events,
            vec![
                Event::TimeAdvanced { tick: 3007 },
                Event::TimerExpired {
                    button: Position::new(0, 0)
                },
            ]
        );
        assert_eq!(query::render(&world), "n@.\n..|");
        assert!(query::props(&world).iter().all(|prop| !prop.activated()));
        assert_eq!(query::timer_remaining(&world, Position::new(0, 0)), None);
    }

    #[test]
    fn zero_timer_keeps_button_pressed() {
        let mut world = world(
            &["..."],
            Position::new(1, 0),
            100,
            vec![
                Prop::Button(Button {
                    position: Position::new(0, 0),
                    activate: Some(Position::new(2, 0)),
                    activated: false,
                    cube: false,
                    timer: Some(0),
                }),
                Prop::Door(Door {
                    position: Position::new(2, 0),
                    activated: false,
                }),
            ],
        );
        let mut events = Vec::new();
        apply(&mut world, Command::ToggleUse, &mut events);
        assert_eq!(query::timer_remaining(&world, Position::new(0, 0)), None);

        let events = tick(&mut world, 5000);

        assert!(!events
            .iter()
            .any(|event| matches!(event, Event::TimerExpired { .. })));
        assert_eq!(query::render(&world), "N@/");
        assert!(query::props(&world).iter().all(Prop::activated));
    }

    #[test]
    fn expired_timer_leaves_dropped_cube() {
        let mut world = world(
            &["..."],
            Position::new(1, 0),
            100,
            vec![
                Prop::Button(Button {
                    position: Position::new(0, 0),
                    activate: Some(Position::new(2, 0)),
                    activated: false,
                    cube: false,
                    timer: Some(2),
                }),
                Prop::CubeDropper(CubeDropper {
                    position: Position::new(2, 0),
                    activated: false,
                }),
            ],
        );
        let mut events = Vec::new();
        apply(&mut world, Command::ToggleUse, &mut events);

        let _ = tick(&mut world, 2);

        assert_eq!(query::render(&world), "n@x");
        assert!(!query::props(&world)[1].activated());
    }
}
