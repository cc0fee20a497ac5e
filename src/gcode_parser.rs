//! Byte-at-a-time G-code parser for the laser command set.
//!
//! ```text
//! M1                          laser on
//! M2                          laser off
//! G0 X.. Y..                  rapid move, laser off
//! G1 X.. Y.. F..              linear move
//! G2 X.. Y.. I.. J.. F..      clockwise arc
//! G3 X.. Y.. I.. J.. F..      counter-clockwise arc
//! ```
//!
//! Words are a letter followed by a signed decimal. A line is executed on
//! `\n`; anything after `;` is a comment. Letters the machine does not use
//! are accepted and ignored, and so are whole-number G/M codes outside the
//! set above (`G21`, `G90`, `M3`...), so a line like `G90 G1 X10 F600` still
//! moves. A malformed word throws away the rest of its line and the parser
//! picks up again at the next one.

use heapless::String;
use thiserror::Error;

use crate::{CircularDirection, Coordinates, Fixed32, Offsets};

const MAX_NUMBER_LEN: usize = 16;

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum Command {
    RapidMove {
        target: Coordinates,
    }, //G0
    LinearMove {
        target: Coordinates,
        feed: Option<Fixed32>,
    }, //G1
    ArcMove {
        direction: CircularDirection,
        target: Coordinates,
        center: Offsets,
        feed: Option<Fixed32>,
    }, //G2, G3
    LaserOn,  //M1
    LaserOff, //M2
}

#[derive(Debug, PartialEq, Copy, Clone)]
enum LineMode {
    MoveRapid,
    MoveLinear,
    MoveCircular(CircularDirection),
    LaserOn,
    LaserOff,
}

#[derive(Error, Debug, PartialEq, Copy, Clone)]
pub enum ParseError {
    #[error("Unexpected byte ({0:#04x})")]
    UnexpectedByte(u8),
    #[error("Invalid number for word {0:?}")]
    InvalidNumber(char),
    #[error("Number too long for word {0:?}")]
    NumberTooLong(char),
    #[error("Unsupported command ({0}{1})")]
    UnsupportedCommand(char, Fixed32),
    #[error("Conflicting command ({0}{1} follows another command word)")]
    ConflictingCommand(char, Fixed32),
}

#[derive(Debug, PartialEq, Copy, Clone)]
enum ParserState {
    Idle,
    Word(char),
    Comment,
    Discard,
}

/// Words collected so far on the current line.
#[derive(Debug, Default, Copy, Clone)]
struct LineWords {
    mode: Option<LineMode>,
    x: Option<Fixed32>,
    y: Option<Fixed32>,
    i: Option<Fixed32>,
    j: Option<Fixed32>,
    f: Option<Fixed32>,
}

impl LineWords {
    fn into_command(self) -> Option<Command> {
        let target = Coordinates {
            x: self.x,
            y: self.y,
        };

        let command = match self.mode? {
            LineMode::MoveRapid => Command::RapidMove { target },
            LineMode::MoveLinear => Command::LinearMove {
                target,
                feed: self.f,
            },
            LineMode::MoveCircular(direction) => Command::ArcMove {
                direction,
                target,
                center: Offsets {
                    i: self.i.unwrap_or(Fixed32::ZERO),
                    j: self.j.unwrap_or(Fixed32::ZERO),
                },
                feed: self.f,
            },
            LineMode::LaserOn => Command::LaserOn,
            LineMode::LaserOff => Command::LaserOff,
        };

        Some(command)
    }
}

pub struct GCodeParser {
    state: ParserState,
    number: String<MAX_NUMBER_LEN>,
    line: LineWords,
    ready: Option<Command>,
}

impl Default for GCodeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl GCodeParser {
    pub const fn new() -> Self {
        Self {
            state: ParserState::Idle,
            number: String::new(),
            line: LineWords {
                mode: None,
                x: None,
                y: None,
                i: None,
                j: None,
                f: None,
            },
            ready: None,
        }
    }

    /// Consumes one received byte.
    ///
    /// A command completed by this byte is held until [`Self::next_command`]
    /// takes it; callers should take it before feeding the next line.
    pub fn feed(&mut self, byte: u8) {
        if let Err(err) = self.accept(byte) {
            log::warn!("Discarding line: {}", err);
            self.discard(byte);
        }
    }

    /// Takes the most recently completed command, if any.
    pub fn next_command(&mut self) -> Option<Command> {
        self.ready.take()
    }

    pub fn has_command(&self) -> bool {
        self.ready.is_some()
    }

    fn accept(&mut self, byte: u8) -> Result<(), ParseError> {
        match self.state {
            ParserState::Discard => {
                if byte == b'\n' {
                    self.state = ParserState::Idle;
                }
                return Ok(());
            }
            ParserState::Comment => {
                if byte == b'\n' {
                    self.end_line();
                }
                return Ok(());
            }
            _ => {}
        }

        match byte {
            b'\n' => {
                self.finish_word()?;
                self.end_line();
            }
            b';' => {
                self.finish_word()?;
                self.state = ParserState::Comment;
            }
            b' ' | b'\t' | b'\r' => {
                self.finish_word()?;
            }
            b'a'..=b'z' | b'A'..=b'Z' => {
                self.finish_word()?;
                self.state = ParserState::Word(byte.to_ascii_uppercase() as char);
            }
            b'0'..=b'9' | b'-' | b'+' | b'.' => {
                let ParserState::Word(letter) = self.state else {
                    return Err(ParseError::UnexpectedByte(byte));
                };
                self.push_digit(letter, byte)?;
            }
            _ => return Err(ParseError::UnexpectedByte(byte)),
        }

        Ok(())
    }

    fn push_digit(&mut self, letter: char, byte: u8) -> Result<(), ParseError> {
        let valid = match byte {
            b'-' | b'+' => self.number.is_empty(),
            b'.' => !self.number.contains('.'),
            _ => true,
        };

        if !valid {
            return Err(ParseError::InvalidNumber(letter));
        }

        self.number
            .push(byte as char)
            .map_err(|_| ParseError::NumberTooLong(letter))
    }

    fn finish_word(&mut self) -> Result<(), ParseError> {
        let ParserState::Word(letter) = self.state else {
            return Ok(());
        };

        let value = parse_number(&self.number).ok_or(ParseError::InvalidNumber(letter))?;
        self.number.clear();
        self.state = ParserState::Idle;

        self.apply_word(letter, value)
    }

    fn apply_word(&mut self, letter: char, value: Fixed32) -> Result<(), ParseError> {
        match letter {
            'G' | 'M' => {
                let Some(number) = command_number(value) else {
                    return Err(ParseError::UnsupportedCommand(letter, value));
                };

                let mode = match (letter, number) {
                    ('G', 0) => LineMode::MoveRapid,
                    ('G', 1) => LineMode::MoveLinear,
                    ('G', 2) => LineMode::MoveCircular(CircularDirection::Clockwise),
                    ('G', 3) => LineMode::MoveCircular(CircularDirection::CounterClockwise),
                    ('M', 1) => LineMode::LaserOn,
                    ('M', 2) => LineMode::LaserOff,
                    _ => {
                        log::debug!("Ignoring {}{}", letter, number);
                        return Ok(());
                    }
                };

                if self.line.mode.is_some() {
                    return Err(ParseError::ConflictingCommand(letter, value));
                }
                self.line.mode = Some(mode);
            }
            'X' => self.line.x = Some(value),
            'Y' => self.line.y = Some(value),
            'I' => self.line.i = Some(value),
            'J' => self.line.j = Some(value),
            'F' => self.line.f = Some(value),
            _ => {}
        }

        Ok(())
    }

    fn end_line(&mut self) {
        if let Some(command) = self.line.into_command() {
            self.ready = Some(command);
        }
        self.line = LineWords::default();
        self.state = ParserState::Idle;
    }

    fn discard(&mut self, byte: u8) {
        self.number.clear();
        self.line = LineWords::default();
        self.state = if byte == b'\n' {
            ParserState::Idle
        } else {
            ParserState::Discard
        };
    }
}

fn parse_number(text: &str) -> Option<Fixed32> {
    if !text.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    let value: f32 = text.parse().ok()?;
    Fixed32::checked_from_num(value)
}

fn command_number(value: Fixed32) -> Option<u8> {
    if value.frac() != Fixed32::ZERO || value < Fixed32::ZERO {
        return None;
    }
    value.checked_to_num::<u8>()
}

/// Converts a feed rate in units/minute to units/second.
///
/// The feed is truncated toward zero to whole units per minute first, the
/// protocol carries F as an integer.
pub fn feed_to_speed(feed: Fixed32) -> f32 {
    feed.round_to_zero().to_num::<f32>() / 60.0
}
