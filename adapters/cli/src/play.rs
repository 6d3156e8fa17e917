//! Line-oriented terminal front end for a running game.

use std::{
    fmt,
    io::{self, BufRead, Write},
    thread,
};

use anyhow::{Context, Result};
use crossbeam_channel::{select, Receiver};
use portal_grid_core::{Direction, Event, PortalColor, PortalGun};
use portal_grid_system_session::Game;
use tracing::info;

/// Help text printed at the start of a session.
pub(crate) const CONTROLS: &str = "controls: w/a/s/d move | b <dir> / o <dir> fire blue / orange \
                                   | e use | q <dir> drop | t <ticks> wait | x quit";

const INPUT_THREAD_NAME: &str = "portal-grid-input";
const INPUT_QUEUE_DEPTH: usize = 8;
/// Ticks applied between two notification reports while waiting.
const WAIT_SLICE: u64 = 1_000;

/// Single instruction typed by the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Input {
    Move(Direction),
    Fire(PortalColor, Direction),
    Use,
    Drop(Direction),
    Wait(u64),
    Quit,
}

/// Reasons a typed line could not be understood.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum InputError {
    Empty,
    UnknownAction(String),
    MissingDirection(String),
    UnknownDirection(String),
    InvalidTicks(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "type an action; {CONTROLS}"),
            Self::UnknownAction(action) => write!(f, "unknown action '{action}'; {CONTROLS}"),
            Self::MissingDirection(action) => {
                write!(f, "'{action}' needs a direction (w/a/s/d or up/left/down/right)")
            }
            Self::UnknownDirection(direction) => write!(f, "unknown direction '{direction}'"),
            Self::InvalidTicks(ticks) => write!(f, "'{ticks}' is not a tick count"),
        }
    }
}

/// How a terminal session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Won,
    Died,
    Quit,
    InputClosed,
    Closed,
}

pub(crate) fn parse_input(line: &str) -> Result<Input, InputError> {
    let mut words = line.split_whitespace();
    let Some(action) = words.next() else {
        return Err(InputError::Empty);
    };
    let argument = words.next();

    let direction = |action: &str| -> Result<Direction, InputError> {
        let word = argument.ok_or_else(|| InputError::MissingDirection(action.to_owned()))?;
        parse_direction(word).ok_or_else(|| InputError::UnknownDirection(word.to_owned()))
    };

    match action.to_ascii_lowercase().as_str() {
        "w" | "a" | "s" | "d" | "up" | "down" | "left" | "right" => parse_direction(action)
            .map(Input::Move)
            .ok_or_else(|| InputError::UnknownAction(action.to_owned())),
        "b" => direction(action).map(|to| Input::Fire(PortalColor::Blue, to)),
        "o" => direction(action).map(|to| Input::Fire(PortalColor::Orange, to)),
        "q" => direction(action).map(Input::Drop),
        "e" => Ok(Input::Use),
        "t" => {
            let ticks = argument.unwrap_or("1");
            ticks
                .parse()
                .map(Input::Wait)
                .map_err(|_| InputError::InvalidTicks(ticks.to_owned()))
        }
        "x" | "quit" => Ok(Input::Quit),
        _ => Err(InputError::UnknownAction(action.to_owned())),
    }
}

fn parse_direction(word: &str) -> Option<Direction> {
    match word.to_ascii_lowercase().as_str() {
        "w" | "up" => Some(Direction::Up),
        "s" | "down" => Some(Direction::Down),
        "a" | "left" => Some(Direction::Left),
        "d" | "right" => Some(Direction::Right),
        _ => None,
    }
}

/// Reads inputs until the game ends, printing the board after every input.
///
/// Notifications are reported as they arrive, so the session ends on death
/// even while no input is pending. The game is closed before returning.
pub(crate) fn run<R, W>(
    game: &Game,
    events: &Receiver<Event>,
    input: R,
    out: &mut W,
) -> Result<Outcome>
where
    R: BufRead + Send + 'static,
    W: Write,
{
    let lines = read_lines(input)?;
    let outcome = drive(game, events, &lines, out);
    game.close();
    let outcome = outcome?;
    info!(?outcome, tick = game.tick(), "session finished");
    Ok(outcome)
}

/// Forwards input lines from a dedicated thread.
///
/// The thread ends once the input is exhausted or the receiver is dropped.
fn read_lines<R: BufRead + Send + 'static>(input: R) -> Result<Receiver<io::Result<String>>> {
    let (tx, rx) = crossbeam_channel::bounded(INPUT_QUEUE_DEPTH);
    let _ = thread::Builder::new()
        .name(INPUT_THREAD_NAME.to_owned())
        .spawn(move || {
            for line in input.lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn the input thread")?;
    Ok(rx)
}

fn drive<W: Write>(
    game: &Game,
    events: &Receiver<Event>,
    lines: &Receiver<io::Result<String>>,
    out: &mut W,
) -> Result<Outcome> {
    writeln!(out, "{CONTROLS}")?;
    write_status(game, out)?;

    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else {
                    return Ok(Outcome::Closed);
                };
                if let Some(outcome) = report_event(event, out)? {
                    return Ok(outcome);
                }
            }
            recv(lines) -> line => {
                let Ok(line) = line else {
                    return Ok(Outcome::InputClosed);
                };
                let line = line.context("failed to read input")?;
                if let Some(outcome) = handle_line(game, events, &line, out)? {
                    return Ok(outcome);
                }
            }
        }
    }
}

fn handle_line<W: Write>(
    game: &Game,
    events: &Receiver<Event>,
    line: &str,
    out: &mut W,
) -> Result<Option<Outcome>> {
    match parse_input(line) {
        Ok(Input::Quit) => {
            writeln!(out, "game over.")?;
            return Ok(Some(Outcome::Quit));
        }
        Ok(Input::Wait(ticks)) => {
            if let Some(outcome) = wait(game, events, ticks, out)? {
                return Ok(Some(outcome));
            }
        }
        Ok(action) => perform(game, action, out)?,
        Err(error) => writeln!(out, "{error}")?,
    }

    if let Some(outcome) = report_events(events, out)? {
        return Ok(Some(outcome));
    }
    write_status(game, out)?;
    if game.player_on_goal() {
        writeln!(out, "congratulations! you cleared the chamber.")?;
        return Ok(Some(Outcome::Won));
    }
    Ok(None)
}

fn perform<W: Write>(game: &Game, action: Input, out: &mut W) -> Result<()> {
    match action {
        Input::Move(direction) => {
            if !game.go_to(direction) {
                writeln!(out, "you cannot go that way.")?;
            }
        }
        Input::Fire(color, direction) => {
            if game.player().portalgun.can_fire(color) {
                game.fire_portal(color, direction);
            } else {
                writeln!(out, "your portal gun cannot fire {}.", color_name(color))?;
            }
        }
        Input::Use => {
            if game.player().holding {
                writeln!(out, "your hands are full; drop the cube with q <dir>.")?;
            } else {
                game.toggle_use();
            }
        }
        Input::Drop(direction) => {
            if game.player().holding {
                game.set_waiting_for_drop_direction(true);
                game.drop_cube(direction);
                game.set_waiting_for_drop_direction(false);
            } else {
                writeln!(out, "you are not holding a cube.")?;
            }
        }
        Input::Wait(_) | Input::Quit => {}
    }
    Ok(())
}

/// Advances time in slices, reporting notifications after each one.
fn wait<W: Write>(
    game: &Game,
    events: &Receiver<Event>,
    ticks: u64,
    out: &mut W,
) -> Result<Option<Outcome>> {
    let mut remaining = ticks;
    while remaining > 0 {
        let slice = remaining.min(WAIT_SLICE);
        let _ = game.advance(slice);
        remaining -= slice;
        if let Some(outcome) = report_events(events, out)? {
            return Ok(Some(outcome));
        }
    }
    Ok(None)
}

fn report_events<W: Write>(events: &Receiver<Event>, out: &mut W) -> Result<Option<Outcome>> {
    for event in events.try_iter() {
        if let Some(outcome) = report_event(event, out)? {
            return Ok(Some(outcome));
        }
    }
    Ok(None)
}

/// Prints one notification; returns an outcome once the player has died.
fn report_event<W: Write>(event: Event, out: &mut W) -> Result<Option<Outcome>> {
    match event {
        Event::HealthChanged { health } => writeln!(out, "ouch! health is now {health}.")?,
        Event::TimerExpired { button } => writeln!(out, "the button at {button} popped back up.")?,
        Event::PortalsDissolved => writeln!(out, "the clear field dissolved your portals.")?,
        Event::PlayerDied => {
            writeln!(out, "you died! the game is over.")?;
            return Ok(Some(Outcome::Died));
        }
        _ => {}
    }
    Ok(None)
}

fn write_status<W: Write>(game: &Game, out: &mut W) -> Result<()> {
    writeln!(out, "{game}")?;
    writeln!(
        out,
        "health: {} | portal gun: {}",
        game.health(),
        gun_label(game.player().portalgun)
    )?;
    Ok(())
}

fn color_name(color: PortalColor) -> &'static str {
    match color {
        PortalColor::Blue => "blue",
        PortalColor::Orange => "orange",
    }
}

fn gun_label(gun: PortalGun) -> &'static str {
    match gun {
        PortalGun::None => "none",
        PortalGun::BlueOnly => "blue",
        PortalGun::OrangeOnly => "orange",
        PortalGun::All => "blue + orange",
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufReader, Read},
        time::Duration,
    };

    use portal_grid_core::{Level, Player, Portals, Position, WorldLayout};
    use portal_grid_system_clock as clock;
    use portal_grid_system_session::{ClockMode, Config};

    use super::*;

    fn level(rows: &[&str], player: Player) -> Level {
        Level {
            world: WorldLayout::parse(rows).expect("layout parses"),
            player,
            portals: Portals::default(),
            props: Vec::new(),
        }
    }

    fn game(rows: &[&str], player: Player) -> Game {
        Game::start(level(rows, player), Config::manual()).expect("game starts")
    }

    fn play(game: &Game, script: &'static str) -> (Outcome, String) {
        let events = game.subscribe();
        let mut out = Vec::new();
        let outcome = run(game, &events, script.as_bytes(), &mut out).expect("session runs");
        (outcome, String::from_utf8(out).expect("utf-8 output"))
    }

    /// Input that stays silent until its sender is dropped.
    struct SilentInput(Receiver<()>);

    impl Read for SilentInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn parses_every_action() {
        assert_eq!(parse_input("w"), Ok(Input::Move(Direction::Up)));
        assert_eq!(parse_input("  Left "), Ok(Input::Move(Direction::Left)));
        assert_eq!(
            parse_input("b d"),
            Ok(Input::Fire(PortalColor::Blue, Direction::Right))
        );
        assert_eq!(
            parse_input("o down"),
            Ok(Input::Fire(PortalColor::Orange, Direction::Down))
        );
        assert_eq!(parse_input("q a"), Ok(Input::Drop(Direction::Left)));
        assert_eq!(parse_input("e"), Ok(Input::Use));
        assert_eq!(parse_input("t"), Ok(Input::Wait(1)));
        assert_eq!(parse_input("t 250"), Ok(Input::Wait(250)));
        assert_eq!(parse_input("x"), Ok(Input::Quit));
    }

    #[test]
    fn reports_malformed_lines() {
        assert_eq!(parse_input(""), Err(InputError::Empty));
        assert_eq!(
            parse_input("jump"),
            Err(InputError::UnknownAction("jump".to_owned()))
        );
        assert_eq!(
            parse_input("b"),
            Err(InputError::MissingDirection("b".to_owned()))
        );
        assert_eq!(
            parse_input("q north"),
            Err(InputError::UnknownDirection("north".to_owned()))
        );
        assert_eq!(
            parse_input("t soon"),
            Err(InputError::InvalidTicks("soon".to_owned()))
        );
    }

    #[test]
    fn reaching_the_goal_wins() {
        let game = game(&[".*"], Player::new(Position::new(0, 0), 100));

        let (outcome, output) = play(&game, "d\nd\n");

        assert_eq!(outcome, Outcome::Won);
        assert!(output.contains("congratulations"));
        assert!(game.is_closed());
    }

    #[test]
    fn gun_mode_limits_portal_colors() {
        let player = Player::new(Position::new(2, 0), 100).with_portalgun(PortalGun::OrangeOnly);
        let game = game(&["#.."], player);

        let (outcome, output) = play(&game, "b a\no a\n");

        assert_eq!(outcome, Outcome::InputClosed);
        assert!(output.contains("your portal gun cannot fire blue."));
        assert_eq!(game.portals().orange, Some(Position::new(1, 0)));
        assert_eq!(game.portals().blue, None);
    }

    #[test]
    fn waiting_in_goo_ends_in_death() {
        let game = game(&["%."], Player::new(Position::new(0, 0), 20));

        let (outcome, output) = play(&game, "t\nd\n");

        assert_eq!(outcome, Outcome::Died);
        assert!(output.contains("ouch! health is now 0."));
        assert!(output.contains("you died!"));
        assert_eq!(game.player().position, Position::new(0, 0));
    }

    #[test]
    fn long_wait_stops_at_death() {
        let game = game(&["%."], Player::new(Position::new(0, 0), 100));

        let (outcome, output) = play(&game, "t 100000\n");

        assert_eq!(outcome, Outcome::Died);
        assert_eq!(output.matches("ouch!").count(), 5);
        assert_eq!(game.tick(), 5_000);
    }

    #[test]
    fn death_ends_the_session_without_further_input() {
        let config = Config::new(ClockMode::FreeRunning(clock::Config::new(
            Duration::from_micros(500),
        )));
        let game = Game::start(level(&["%."], Player::new(Position::new(0, 0), 20)), config)
            .expect("game starts");
        let events = game.subscribe();
        let (_keep_silent, silence) = crossbeam_channel::bounded::<()>(0);
        let mut out = Vec::new();

        let outcome = run(&game, &events, BufReader::new(SilentInput(silence)), &mut out)
            .expect("session runs");

        assert_eq!(outcome, Outcome::Died);
        assert!(String::from_utf8(out)
            .expect("utf-8 output")
            .ends_with("you died! the game is over.\n"));
        assert!(game.is_closed());
    }

    #[test]
    fn closing_the_game_elsewhere_ends_the_session() {
        let game = game(&[".."], Player::new(Position::new(0, 0), 100));
        let events = game.subscribe();
        game.close();
        let (_keep_silent, silence) = crossbeam_channel::bounded::<()>(0);
        let mut out = Vec::new();

        let outcome = run(&game, &events, BufReader::new(SilentInput(silence)), &mut out)
            .expect("session runs");

        assert_eq!(outcome, Outcome::Closed);
    }

    #[test]
    fn quitting_closes_the_game() {
        let game = game(&[".."], Player::new(Position::new(0, 0), 100));

        let (outcome, output) = play(&game, "e\nx\nd\n");

        assert_eq!(outcome, Outcome::Quit);
        assert!(output.ends_with("game over.\n"));
        assert_eq!(game.player().position, Position::new(0, 0));
    }
}
