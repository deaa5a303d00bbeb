//! A smallest piece of music, that is held by Voice.
use serde::{Deserialize, Serialize};

use super::Rational;
use crate::error::{TimeError, TimeResult};

/// What the time-keeping code needs to know about a leaf.
///
/// Ties are not a part of the event: they belong to the
/// [Voice](super::Voice), which holds the leaves.
pub trait TimedEvent: Clone {
    /// Duration as notated, before tuplet or tremolo multipliers.
    fn written_duration(&self) -> Rational;
    /// Tuplet or tremolo multiplier, if any.
    fn multiplier(&self) -> Option<Rational> {
        None
    }
    /// Copy of the event with other written duration.
    fn with_written_duration(&self, duration: Rational) -> Self;

    fn prolated_duration(&self) -> Rational {
        self.written_duration() * self.multiplier().unwrap_or(Rational::one())
    }
}

/// Generic leaf of a voice.
///
/// `Leaf` is about duration, while `LeafKind` responds for what
/// sounds (or not sounds) during it.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(try_from = "LeafFields")]
pub struct Leaf {
    pub kind: LeafKind,
    written_duration: Rational,
    multiplier: Option<Rational>,
}

/// Unchecked form, in which leaves are deserialized.
#[derive(Deserialize)]
struct LeafFields {
    kind: LeafKind,
    written_duration: Rational,
    multiplier: Option<Rational>,
}
impl TryFrom<LeafFields> for Leaf {
    type Error = TimeError;
    fn try_from(fields: LeafFields) -> Result<Self, Self::Error> {
        let mut leaf = Self::new(fields.kind, fields.written_duration)?;
        if let Some(multiplier) = fields.multiplier {
            leaf.set_multiplier(multiplier)?;
        }
        Ok(leaf)
    }
}
impl Leaf {
    pub fn new(kind: LeafKind, written_duration: Rational) -> TimeResult<Self> {
        if !written_duration.is_positive() {
            return Err(TimeError::InvalidArgument(format!(
                "written duration must be positive, got {}",
                written_duration
            )));
        }
        Ok(Self {
            kind,
            written_duration,
            multiplier: None,
        })
    }
    pub fn note(pitch: u8, written_duration: Rational) -> TimeResult<Self> {
        Self::new(LeafKind::Note(Note::new(pitch)), written_duration)
    }
    pub fn rest(written_duration: Rational) -> TimeResult<Self> {
        Self::new(LeafKind::Rest, written_duration)
    }

    pub fn set_multiplier(
        &mut self,
        multiplier: Rational,
    ) -> TimeResult<&mut Self> {
        if !multiplier.is_positive() {
            return Err(TimeError::InvalidArgument(format!(
                "multiplier must be positive, got {}",
                multiplier
            )));
        }
        self.multiplier = Some(multiplier);
        Ok(self)
    }
    pub fn clear_multiplier(&mut self) -> &mut Self {
        self.multiplier = None;
        self
    }
    pub fn set_kind(&mut self, kind: LeafKind) -> &mut Self {
        self.kind = kind;
        self
    }
}
impl TimedEvent for Leaf {
    fn written_duration(&self) -> Rational {
        self.written_duration
    }
    fn multiplier(&self) -> Option<Rational> {
        self.multiplier
    }
    fn with_written_duration(&self, duration: Rational) -> Self {
        Self {
            written_duration: duration,
            ..self.clone()
        }
    }
}

/// Various kinds of leaves with concrete realizations
/// as variant args.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Default)]
pub enum LeafKind {
    #[default]
    Rest,
    Note(Note),
    Chord(Chord),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct Note {
    /// MIDI note number.
    pub pitch: u8,
}
impl Note {
    pub fn new(pitch: u8) -> Self {
        Self { pitch }
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Chord {
    notes: Vec<Note>,
}
impl Chord {
    pub fn new() -> Self {
        Self { notes: Vec::new() }
    }
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }
    pub fn push(mut self, kind: LeafKind) -> TimeResult<Self> {
        match kind {
            LeafKind::Rest => Err(TimeError::InvalidArgument(format!(
                "Cannot push rest to chord! {:?}",
                kind
            ))),
            LeafKind::Note(note) => {
                self.notes.push(note);
                Ok(self)
            }
            LeafKind::Chord(mut chord) => {
                self.notes.append(&mut chord.notes);
                Ok(self)
            }
        }
    }
}
