//! Score markup reader.
//!
//! Turns partwise score markup into the part list plus, for every `<part>`, an
//! ordered stream of [`ScoreEvent`]s. The stream is what the timing parser
//! folds over; nothing here knows about time.
//!
//! Only the elements that affect timing are read:
//!
//! ```text
//! part-list/score-part (@id, part-name, part-abbreviation)
//! part (@id)
//!   measure
//!     attributes (divisions, time/beats)
//!     note (pitch/{step, alter, octave}, duration, chord, tie/@type)
//!     backup (duration)
//!     forward (duration)
//! ```
//!
//! Numeric text that does not parse is treated as absent.

use crate::error::{PianolaError, Result};
use crate::pitch::Pitch;
use crate::score::Part;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreEvent {
    MeasureStart,
    Attributes {
        divisions: Option<i64>,
        beats: Option<i64>,
    },
    Note(NoteEvent),
    Backup(i64),
    Forward(i64),
    MeasureEnd,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteEvent {
    /// `None` for grace notes, which carry no duration
    pub duration: Option<i64>,
    /// `None` for rests and unpitched notes
    pub pitch: Option<PitchSpec>,
    pub chord: bool,
    pub tie: Option<TieMarker>,
}

/// A validated `<pitch>`: step letter `A`..`G`, chromatic alteration and octave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchSpec {
    pub step: char,
    pub alter: f64,
    pub octave: i32,
}

impl PitchSpec {
    pub fn to_pitch(&self) -> Pitch {
        let class = match self.step {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            _ => 11,
        };
        Pitch::new((self.octave + 1) * 12 + class).transpose(self.alter.round() as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieMarker {
    Start,
    Stop,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartEvents {
    pub part_id: String,
    /// Byte offset of the `<part>` element
    pub position: usize,
    pub events: Vec<ScoreEvent>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreDocument {
    /// Parts declared in the part list, in declaration order
    pub declared_parts: Vec<Part>,
    /// Part bodies in document order
    pub parts: Vec<PartEvents>,
}

impl ScoreDocument {
    pub fn declared_part(&self, part_id: &str) -> Option<&Part> {
        self.declared_parts.iter().find(|p| p.part_id == part_id)
    }
}

/// Read score markup into a [`ScoreDocument`].
///
/// Empty input yields an empty document. Mismatched or unclosed elements are a
/// [`PianolaError::MalformedScore`].
pub fn read_score(markup: &str) -> Result<ScoreDocument> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(true);

    let mut builder = DocumentBuilder::default();
    let mut stack: Vec<String> = Vec::new();

    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| malformed(position, e.to_string()))?;

        match event {
            Event::Start(ref e) => {
                let name = local_name(e);
                builder.open(&name, e, position)?;
                stack.push(name);
            }
            Event::Empty(ref e) => {
                let name = local_name(e);
                builder.open(&name, e, position)?;
                builder.close(&name, position)?;
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match stack.pop() {
                    Some(open) if open == name => builder.close(&name, position)?,
                    Some(open) => {
                        return Err(malformed(
                            position,
                            format!("expected </{}>, found </{}>", open, name),
                        ))
                    }
                    None => {
                        return Err(malformed(position, format!("unexpected </{}>", name)));
                    }
                }
            }
            Event::Text(ref t) => {
                let text = t.unescape().map_err(|e| malformed(position, e.to_string()))?;
                if stack.is_empty() {
                    return Err(malformed(position, "text outside of the root element".to_string()));
                }
                builder.text(&stack, text.trim());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(
            reader.buffer_position(),
            format!("unexpected end of document inside <{}>", open),
        ));
    }

    Ok(builder.finish())
}

fn malformed(position: usize, message: String) -> PianolaError {
    PianolaError::MalformedScore { position, message }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &str, position: usize) -> Result<Option<String>> {
    let attr = e
        .try_get_attribute(key)
        .map_err(|err| malformed(position, err.to_string()))?;
    match attr {
        Some(a) => {
            let value = a
                .unescape_value()
                .map_err(|err| malformed(position, err.to_string()))?;
            Ok(Some(value.trim().to_string()))
        }
        None => Ok(None),
    }
}

fn parent_is(stack: &[String], name: &str) -> bool {
    stack.last().map(|s| s == name).unwrap_or(false)
}

fn grandparent_is(stack: &[String], name: &str) -> bool {
    stack.len() >= 2 && stack[stack.len() - 2] == name
}

#[derive(Default)]
struct DocumentBuilder {
    document: ScoreDocument,
    score_part: Option<Part>,
    part: Option<PartEvents>,
    attributes: Option<(Option<i64>, Option<i64>)>,
    note: Option<NoteBuilder>,
    seek: Option<(SeekKind, i64)>,
}

#[derive(Default)]
struct NoteBuilder {
    event: NoteEvent,
    pitch: Option<RawPitch>,
    tie_start: bool,
    tie_stop: bool,
}

const MIN_OCTAVE: i32 = 0;
const MAX_OCTAVE: i32 = 9;
/// Alterations are semitones; an octave either way is the most accepted.
const MAX_ALTER: f64 = 12.0;

#[derive(Default)]
struct RawPitch {
    step: String,
    alter: Option<f64>,
    octave: Option<i32>,
}

impl RawPitch {
    fn validate(self, position: usize) -> Result<PitchSpec> {
        let step = match self.step.as_str() {
            s @ ("A" | "B" | "C" | "D" | "E" | "F" | "G") => s.chars().next().unwrap_or('C'),
            other => return Err(malformed(position, format!("unknown pitch step '{}'", other))),
        };
        let octave = self
            .octave
            .ok_or_else(|| malformed(position, "pitch without an octave".to_string()))?;
        if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
            return Err(malformed(position, format!("octave {} out of range", octave)));
        }
        let alter = self.alter.unwrap_or(0.0);
        if !(-MAX_ALTER..=MAX_ALTER).contains(&alter) {
            return Err(malformed(position, format!("alter {} out of range", alter)));
        }
        Ok(PitchSpec {
            step,
            alter,
            octave,
        })
    }
}

#[derive(Clone, Copy)]
enum SeekKind {
    Backup,
    Forward,
}

impl DocumentBuilder {
    fn open(&mut self, name: &str, e: &BytesStart<'_>, position: usize) -> Result<()> {
        match name {
            "score-part" => {
                let part_id = attribute(e, "id", position)?.unwrap_or_default();
                self.score_part = Some(Part {
                    part_id,
                    part_name: String::new(),
                    part_abbreviation: String::new(),
                    index: self.document.declared_parts.len(),
                });
            }
            "part" => {
                let part_id = attribute(e, "id", position)?
                    .unwrap_or_else(|| format!("P{}", self.document.parts.len() + 1));
                self.part = Some(PartEvents {
                    part_id,
                    position,
                    events: Vec::new(),
                });
            }
            "measure" => self.push(ScoreEvent::MeasureStart),
            "attributes" => self.attributes = Some((None, None)),
            "note" => self.note = Some(NoteBuilder::default()),
            "backup" => self.seek = Some((SeekKind::Backup, 0)),
            "forward" => self.seek = Some((SeekKind::Forward, 0)),
            "pitch" => {
                if let Some(note) = self.note.as_mut() {
                    note.pitch = Some(RawPitch::default());
                }
            }
            "chord" => {
                if let Some(note) = self.note.as_mut() {
                    note.event.chord = true;
                }
            }
            "tie" if self.note.is_some() => {
                let tie_type = attribute(e, "type", position)?;
                if let Some(note) = self.note.as_mut() {
                    match tie_type.as_deref() {
                        Some("start") => note.tie_start = true,
                        Some("stop") => note.tie_stop = true,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str, position: usize) -> Result<()> {
        match name {
            "score-part" => {
                if let Some(part) = self.score_part.take() {
                    self.document.declared_parts.push(part);
                }
            }
            "part" => {
                if let Some(part) = self.part.take() {
                    self.document.parts.push(part);
                }
            }
            "measure" => self.push(ScoreEvent::MeasureEnd),
            "attributes" => {
                if let Some((divisions, beats)) = self.attributes.take() {
                    self.push(ScoreEvent::Attributes { divisions, beats });
                }
            }
            "note" => {
                if let Some(note) = self.note.take() {
                    let mut event = note.event;
                    // A middle fragment carries both stop and start; the tie stays open.
                    event.tie = if note.tie_start {
                        Some(TieMarker::Start)
                    } else if note.tie_stop {
                        Some(TieMarker::Stop)
                    } else {
                        None
                    };
                    self.push(ScoreEvent::Note(event));
                }
            }
            "pitch" => {
                if let Some(note) = self.note.as_mut() {
                    if let Some(raw) = note.pitch.take() {
                        note.event.pitch = Some(raw.validate(position)?);
                    }
                }
            }
            "backup" | "forward" => {
                if let Some((kind, duration)) = self.seek.take() {
                    self.push(match kind {
                        SeekKind::Backup => ScoreEvent::Backup(duration),
                        SeekKind::Forward => ScoreEvent::Forward(duration),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, stack: &[String], text: &str) {
        let Some(element) = stack.last() else {
            return;
        };
        let parents = &stack[..stack.len() - 1];

        match element.as_str() {
            "part-name" if parent_is(parents, "score-part") => {
                if let Some(part) = self.score_part.as_mut() {
                    part.part_name.push_str(text);
                }
            }
            "part-abbreviation" if parent_is(parents, "score-part") => {
                if let Some(part) = self.score_part.as_mut() {
                    part.part_abbreviation.push_str(text);
                }
            }
            "divisions" if parent_is(parents, "attributes") => {
                if let Some(attributes) = self.attributes.as_mut() {
                    attributes.0 = parse_int(text);
                }
            }
            "beats" if parent_is(parents, "time") && grandparent_is(parents, "attributes") => {
                if let Some(attributes) = self.attributes.as_mut() {
                    attributes.1 = parse_int(text);
                }
            }
            "duration" if parent_is(parents, "note") => {
                if let Some(note) = self.note.as_mut() {
                    note.event.duration = parse_int(text);
                }
            }
            "duration" if parent_is(parents, "backup") || parent_is(parents, "forward") => {
                if let Some(seek) = self.seek.as_mut() {
                    seek.1 = parse_int(text).unwrap_or(0);
                }
            }
            "step" | "alter" | "octave" if parent_is(parents, "pitch") => {
                let Some(pitch) = self.note.as_mut().and_then(|note| note.pitch.as_mut()) else {
                    return;
                };
                match element.as_str() {
                    "step" => pitch.step = text.to_string(),
                    "alter" => pitch.alter = text.parse().ok(),
                    _ => pitch.octave = text.parse().ok(),
                }
            }
            _ => {}
        }
    }

    fn push(&mut self, event: ScoreEvent) {
        if let Some(part) = self.part.as_mut() {
            part.events.push(event);
        }
    }

    fn finish(mut self) -> ScoreDocument {
        if let Some(part) = self.part.take() {
            self.document.parts.push(part);
        }
        self.document
    }
}

/// Durations are integral divisions; decimal text is truncated toward zero.
fn parse_int(text: &str) -> Option<i64> {
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_input() {
        let doc = read_score("").unwrap();
        assert!(doc.declared_parts.is_empty());
        assert!(doc.parts.is_empty());
    }

    #[test]
    fn test_part_list() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <part-list>
    <score-part id="P1"><part-name>Violin</part-name><part-abbreviation>Vln.</part-abbreviation></score-part>
    <score-part id="P2"><part-name>Piano</part-name></score-part>
  </part-list>
</score-partwise>"#;
        let doc = read_score(xml).unwrap();
        assert_eq!(doc.declared_parts.len(), 2);
        assert_eq!(doc.declared_parts[0].part_name, "Violin");
        assert_eq!(doc.declared_parts[0].part_abbreviation, "Vln.");
        assert_eq!(doc.declared_parts[1].index, 1);
        assert_eq!(doc.declared_part("P2").unwrap().part_name, "Piano");
    }

    #[test]
    fn test_measure_events() {
        let xml = r#"<score-partwise><part id="P1"><measure number="1">
  <attributes><divisions>4</divisions><time><beats>3</beats><beat-type>4</beat-type></time></attributes>
  <note><pitch><step>C</step><alter>1</alter><octave>4</octave></pitch><duration>4</duration><tie type="start"/></note>
  <note><chord/><pitch><step>E</step><octave>4</octave></pitch><duration>4</duration></note>
  <backup><duration>4</duration></backup>
  <note><rest/><duration>2</duration></note>
  <forward><duration>2</duration></forward>
</measure></part></score-partwise>"#;
        let doc = read_score(xml).unwrap();
        assert_eq!(doc.parts.len(), 1);
        assert_eq!(
            doc.parts[0].events,
            vec![
                ScoreEvent::MeasureStart,
                ScoreEvent::Attributes {
                    divisions: Some(4),
                    beats: Some(3)
                },
                ScoreEvent::Note(NoteEvent {
                    duration: Some(4),
                    pitch: Some(PitchSpec {
                        step: 'C',
                        alter: 1.0,
                        octave: 4,
                    }),
                    chord: false,
                    tie: Some(TieMarker::Start),
                }),
                ScoreEvent::Note(NoteEvent {
                    duration: Some(4),
                    pitch: Some(PitchSpec {
                        step: 'E',
                        alter: 0.0,
                        octave: 4,
                    }),
                    chord: true,
                    tie: None,
                }),
                ScoreEvent::Backup(4),
                ScoreEvent::Note(NoteEvent {
                    duration: Some(2),
                    ..NoteEvent::default()
                }),
                ScoreEvent::Forward(2),
                ScoreEvent::MeasureEnd,
            ]
        );
    }

    #[test]
    fn test_middle_tie_fragment_keeps_tie_open() {
        let xml = r#"<part id="P1"><measure><note><pitch><step>C</step><octave>4</octave></pitch>
<duration>1</duration><tie type="stop"/><tie type="start"/></note></measure></part>"#;
        let doc = read_score(xml).unwrap();
        match &doc.parts[0].events[1] {
            ScoreEvent::Note(note) => assert_eq!(note.tie, Some(TieMarker::Start)),
            other => panic!("expected note, got {:?}", other),
        }
    }

    #[test]
    fn test_grace_note_has_no_duration() {
        let xml = r#"<part id="P1"><measure><note><grace/><pitch><step>D</step><octave>5</octave></pitch></note></measure></part>"#;
        let doc = read_score(xml).unwrap();
        match &doc.parts[0].events[1] {
            ScoreEvent::Note(note) => assert_eq!(note.duration, None),
            other => panic!("expected note, got {:?}", other),
        }
    }

    #[test]
    fn test_pitch_spec_to_pitch() {
        let spec = PitchSpec {
            step: 'B',
            alter: -1.0,
            octave: 3,
        };
        assert_eq!(spec.to_pitch(), Pitch::new(58));
        let spec = PitchSpec {
            step: 'A',
            alter: 0.0,
            octave: 0,
        };
        assert_eq!(spec.to_pitch().to_string(), "A0");
    }

    #[test]
    fn test_unknown_step_is_malformed() {
        let xml = r#"<part id="P1"><measure><note><pitch><step>H</step><octave>4</octave></pitch><duration>1</duration></note></measure></part>"#;
        assert!(matches!(read_score(xml), Err(PianolaError::MalformedScore { .. })));
    }

    #[test]
    fn test_pitch_out_of_range_is_malformed() {
        let pitch = |inner: &str| {
            format!(
                r#"<part id="P1"><measure><note><pitch>{}</pitch><duration>1</duration></note></measure></part>"#,
                inner
            )
        };
        for inner in [
            "<step>C</step><octave>2147483647</octave>",
            "<step>C</step><octave>-1</octave>",
            "<step>C</step><octave>10</octave>",
            "<step>C</step><alter>13</alter><octave>4</octave>",
            "<step>C</step><alter>NaN</alter><octave>4</octave>",
            "<step>C</step><alter>-inf</alter><octave>4</octave>",
        ] {
            assert!(
                matches!(read_score(&pitch(inner)), Err(PianolaError::MalformedScore { .. })),
                "{}",
                inner
            );
        }
        assert!(read_score(&pitch("<step>B</step><alter>1</alter><octave>9</octave>")).is_ok());
    }

    #[test]
    fn test_mismatched_tags_are_malformed() {
        let result = read_score("<score-partwise><part id=\"P1\"><measure></part></score-partwise>");
        assert!(matches!(result, Err(PianolaError::MalformedScore { .. })));
    }

    #[test]
    fn test_unclosed_document_is_malformed() {
        let result = read_score("<score-partwise><part id=\"P1\">");
        assert!(matches!(result, Err(PianolaError::MalformedScore { .. })));
    }

    #[test]
    fn test_bare_text_is_malformed() {
        let result = read_score("not a score");
        assert!(matches!(result, Err(PianolaError::MalformedScore { .. })));
    }
}
