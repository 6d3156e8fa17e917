use std::{error::Error, fmt};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use portal_grid_core::{Level, WorldSize};

const CODE_DOMAIN: &str = "portal";
const CODE_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded level payload.
pub(crate) const CODE_HEADER: &str = "portal:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Encodes a level into a single-line share code.
pub(crate) fn encode(level: &Level) -> Result<String, LevelTransferError> {
    let json = serde_json::to_vec(level).map_err(LevelTransferError::InvalidPayload)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    let WorldSize { width, height } = level.world.size;
    Ok(format!("{CODE_HEADER}:{width}x{height}:{encoded}"))
}

/// Decodes a level from a share code produced by [`encode`].
pub(crate) fn decode(value: &str) -> Result<Level, LevelTransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LevelTransferError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(LevelTransferError::MissingPrefix)?;
    let version = parts.next().ok_or(LevelTransferError::MissingVersion)?;
    let dimensions = parts.next().ok_or(LevelTransferError::MissingDimensions)?;
    let payload = parts.next().ok_or(LevelTransferError::MissingPayload)?;

    if domain != CODE_DOMAIN {
        return Err(LevelTransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != CODE_VERSION {
        return Err(LevelTransferError::UnsupportedVersion(version.to_owned()));
    }

    let declared = parse_dimensions(dimensions)?;
    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(LevelTransferError::InvalidEncoding)?;
    let level: Level =
        serde_json::from_slice(&bytes).map_err(LevelTransferError::InvalidPayload)?;

    if level.world.size != declared {
        return Err(LevelTransferError::DimensionMismatch {
            declared,
            actual: level.world.size,
        });
    }

    Ok(level)
}

/// Errors that can occur while encoding or decoding share codes.
#[derive(Debug)]
pub(crate) enum LevelTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the code.
    MissingPrefix,
    /// The code did not contain a version segment.
    MissingVersion,
    /// The code did not include grid dimensions.
    MissingDimensions,
    /// The code did not include the payload segment.
    MissingPayload,
    /// The code used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The code used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed from the code.
    InvalidDimensions(String),
    /// The dimensions in the header disagree with the embedded level.
    DimensionMismatch {
        /// Size stated in the header.
        declared: WorldSize,
        /// Size of the decoded level.
        actual: WorldSize,
    },
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The payload could not be (de)serialised.
    InvalidPayload(serde_json::Error),
}

impl fmt::Display for LevelTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "share code was empty"),
            Self::MissingPrefix => write!(f, "share code is missing the prefix"),
            Self::MissingVersion => write!(f, "share code is missing the version"),
            Self::MissingDimensions => write!(f, "share code is missing the world size"),
            Self::MissingPayload => write!(f, "share code is missing the payload"),
            Self::InvalidPrefix(prefix) => write!(f, "share code prefix '{prefix}' is not supported"),
            Self::UnsupportedVersion(version) => {
                write!(f, "share code version '{version}' is not supported")
            }
            Self::InvalidDimensions(dimensions) => {
                write!(f, "could not parse world size '{dimensions}'")
            }
            Self::DimensionMismatch { declared, actual } => write!(
                f,
                "share code announces a {}x{} world but carries {}x{}",
                declared.width, declared.height, actual.width, actual.height
            ),
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode level payload: {error}")
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not parse level payload: {error}")
            }
        }
    }
}

impl Error for LevelTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) => Some(error),
            _ => None,
        }
    }
}

fn parse_dimensions(dimensions: &str) -> Result<WorldSize, LevelTransferError> {
    let invalid = || LevelTransferError::InvalidDimensions(dimensions.to_owned());
    let (width, height) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;

    let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
    let height = height.trim().parse::<u32>().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(invalid());
    }

    Ok(WorldSize { width, height })
}

#[cfg(test)]
mod tests {
    use portal_grid_core::{
        Button, Door, Player, PortalGun, Portals, Position, Prop, WorldLayout,
    };

    use super::*;

    fn level() -> Level {
        Level {
            world: WorldLayout::parse(&["#####", "#..*#", "#####"]).expect("layout parses"),
            player: Player::new(Position::new(1, 1), 100).with_portalgun(PortalGun::BlueOnly),
            portals: Portals::default(),
            props: vec![
                Prop::Button(Button {
                    position: Position::new(2, 1),
                    activate: Some(Position::new(3, 1)),
                    activated: false,
                    cube: false,
                    timer: Some(3000),
                }),
                Prop::Door(Door {
                    position: Position::new(3, 1),
                    activated: false,
                }),
            ],
        }
    }

    #[test]
    fn code_carries_header_and_size() {
        let code = encode(&level()).expect("level encodes");

        assert!(code.starts_with(&format!("{CODE_HEADER}:5x3:")));
        assert_eq!(decode(&code).expect("code decodes"), level());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let code = encode(&level()).expect("level encodes");

        assert!(decode(&format!("  {code}\n")).is_ok());
    }

    #[test]
    fn rejects_foreign_prefix_and_version() {
        assert!(matches!(
            decode("maze:v1:5x3:abc"),
            Err(LevelTransferError::InvalidPrefix(prefix)) if prefix == "maze"
        ));
        assert!(matches!(
            decode("portal:v2:5x3:abc"),
            Err(LevelTransferError::UnsupportedVersion(version)) if version == "v2"
        ));
        assert!(matches!(decode("   "), Err(LevelTransferError::EmptyPayload)));
        assert!(matches!(
            decode("portal:v1:5x3"),
            Err(LevelTransferError::MissingPayload)
        ));
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert!(matches!(
            decode("portal:v1:0x3:abc"),
            Err(LevelTransferError::InvalidDimensions(_))
        ));
        assert!(matches!(
            decode("portal:v1:five:abc"),
            Err(LevelTransferError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn rejects_header_disagreeing_with_payload() {
        let code = encode(&level()).expect("level encodes");
        let forged = code.replacen(":5x3:", ":4x3:", 1);

        assert!(matches!(
            decode(&forged),
            Err(LevelTransferError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn rejects_garbage_payload() {
        assert!(matches!(
            decode("portal:v1:5x3:!!!"),
            Err(LevelTransferError::InvalidEncoding(_))
        ));
        let not_a_level = STANDARD_NO_PAD.encode(b"{}");
        assert!(matches!(
            decode(&format!("portal:v1:5x3:{not_a_level}")),
            Err(LevelTransferError::InvalidPayload(_))
        ));
    }
}
