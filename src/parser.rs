//! Score timing parser.
//!
//! Folds each part's [`ScoreEvent`] stream into absolute-time notes and
//! measures. The accumulator is a [`Cursor`]; every event variant maps to one
//! transition on it:
//!
//! | Event | Transition |
//! |---|---|
//! | `MeasureStart` | open a measure at the cursor with the beats in effect |
//! | `Attributes` | update divisions (prospectively) and beats |
//! | `Note` | chord rewind, emit or tie-merge, advance the cursor, open/close tie |
//! | `Backup` / `Forward` | move the cursor back / forward |
//! | `MeasureEnd` | stamp the measure's end with the cursor |
//!
//! Parts are folded independently. Notes from every part are kept; only the
//! last part's measures become the document-level measure list, and any
//! disagreement between parts is reported as a [`ScoreWarning`].

use crate::error::{PianolaError, Result};
use crate::events::{read_score, NoteEvent, ScoreEvent, TieMarker};
use crate::score::{Measure, Note, Part, TimeStamp, Timeline};
use crate::semantic::{validate, PartMeasures};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_DIVISIONS: i64 = 1;
const DEFAULT_BEATS: u32 = 4;

/// Parse score markup into a [`Timeline`].
///
/// # Example
/// ```rust
/// use pianola::parse;
///
/// let xml = r#"<score-partwise>
///   <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
///   <part id="P1"><measure>
///     <attributes><divisions>4</divisions></attributes>
///     <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration></note>
///     <note><pitch><step>D</step><octave>4</octave></pitch><duration>4</duration></note>
///   </measure></part>
/// </score-partwise>"#;
///
/// let timeline = parse(xml).unwrap();
/// assert_eq!(timeline.length, 8);
/// assert_eq!(timeline.notes[1].pitch.to_string(), "D4");
/// assert_eq!(timeline.notes[1].start.ticks, 4);
/// ```
pub fn parse(markup: &str) -> Result<Timeline> {
    let document = read_score(markup)?;

    let mut notes = Vec::new();
    let mut part_measures: Vec<PartMeasures> = Vec::new();
    let mut undeclared = 0;

    for body in &document.parts {
        let part = match document.declared_part(&body.part_id) {
            Some(declared) => declared.clone(),
            None => {
                let index = document.declared_parts.len() + undeclared;
                undeclared += 1;
                debug!(part_id = %body.part_id, "part was not declared in the part list");
                Part {
                    part_id: body.part_id.clone(),
                    part_name: body.part_id.clone(),
                    part_abbreviation: String::new(),
                    index,
                }
            }
        };

        let cursor = body
            .events
            .iter()
            .try_fold(Cursor::new(Arc::new(part), body.position), Cursor::apply)?;

        notes.extend(cursor.notes);
        part_measures.push(PartMeasures {
            part_id: body.part_id.clone(),
            measures: cursor.measures,
        });
    }

    let length = notes.iter().map(Note::end_ticks).max().unwrap_or(0);
    let warnings = validate(&notes, &part_measures);
    for warning in &warnings {
        warn!("{}", warning);
    }

    let measures = part_measures
        .pop()
        .map(|last| last.measures)
        .unwrap_or_default();

    debug!(
        notes = notes.len(),
        measures = measures.len(),
        length,
        "parsed score"
    );

    Ok(Timeline {
        notes,
        measures,
        length,
        warnings,
    })
}

/// Running state threaded through one part's events.
#[derive(Debug, Clone)]
struct Cursor {
    part: Arc<Part>,
    /// Byte offset of the part, reported when its times overflow
    position: usize,
    start: TimeStamp,
    prev_start: TimeStamp,
    tied: bool,
    divisions: i64,
    beats: u32,
    notes: Vec<Note>,
    measures: Vec<Measure>,
}

impl Cursor {
    fn new(part: Arc<Part>, position: usize) -> Self {
        Self {
            part,
            position,
            start: TimeStamp::ZERO,
            prev_start: TimeStamp::ZERO,
            tied: false,
            divisions: DEFAULT_DIVISIONS,
            beats: DEFAULT_BEATS,
            notes: Vec::new(),
            measures: Vec::new(),
        }
    }

    fn apply(self, event: &ScoreEvent) -> Result<Self> {
        match event {
            ScoreEvent::MeasureStart => Ok(self.open_measure()),
            ScoreEvent::Attributes { divisions, beats } => Ok(self.attributes(*divisions, *beats)),
            ScoreEvent::Note(note) => self.note(note),
            ScoreEvent::Backup(duration) => self.backup(*duration),
            ScoreEvent::Forward(duration) => self.forward(*duration),
            ScoreEvent::MeasureEnd => Ok(self.close_measure()),
        }
    }

    fn out_of_range(&self) -> PianolaError {
        PianolaError::MalformedScore {
            position: self.position,
            message: format!("time out of range in part {}", self.part.part_id),
        }
    }

    fn span(&self, ticks: i64) -> Result<TimeStamp> {
        TimeStamp::from_divisions(ticks, self.divisions).ok_or_else(|| self.out_of_range())
    }

    fn advance(&self, from: &TimeStamp, span: &TimeStamp) -> Result<TimeStamp> {
        from.checked_add(span).ok_or_else(|| self.out_of_range())
    }

    fn open_measure(mut self) -> Self {
        self.measures.push(Measure {
            index: self.measures.len(),
            start: self.start,
            end: self.start,
            beats: self.beats,
        });
        self
    }

    fn close_measure(mut self) -> Self {
        let end = self.start;
        if let Some(measure) = self.measures.last_mut() {
            measure.end = end;
        }
        self
    }

    fn attributes(mut self, divisions: Option<i64>, beats: Option<i64>) -> Self {
        if let Some(divisions) = divisions.filter(|d| *d > 0) {
            self.divisions = divisions;
        }
        if let Some(beats) = beats.filter(|b| *b > 0) {
            self.beats = u32::try_from(beats).unwrap_or(u32::MAX);
            let beats = self.beats;
            if let Some(measure) = self.measures.last_mut() {
                measure.beats = beats;
            }
        }
        self
    }

    fn note(mut self, note: &NoteEvent) -> Result<Self> {
        // Grace notes carry no duration and take no time.
        let Some(ticks) = note.duration else {
            return Ok(self);
        };
        let span = self.span(ticks)?;

        if note.chord {
            self.start = self.prev_start;
        }

        if let Some(pitch) = &note.pitch {
            if ticks > 0 {
                let open_tie = if self.tied { self.notes.last() } else { None };
                match open_tie {
                    Some(last) => {
                        let merged = self.advance(&last.duration, &span)?;
                        if let Some(last) = self.notes.last_mut() {
                            last.duration = merged;
                        }
                    }
                    None => {
                        let measure_index = self.measures.len().saturating_sub(1);
                        self.notes.push(Note {
                            pitch: pitch.to_pitch(),
                            start: self.start,
                            duration: span,
                            part: Arc::clone(&self.part),
                            measure_index,
                        });
                    }
                }
            }
        }

        self.prev_start = self.start;
        self.start = self.advance(&self.start, &span)?;

        match note.tie {
            Some(TieMarker::Start) => self.tied = true,
            Some(TieMarker::Stop) => self.tied = false,
            None => {}
        }
        Ok(self)
    }

    fn backup(mut self, ticks: i64) -> Result<Self> {
        let span = self.span(ticks)?;
        self.start = self
            .start
            .checked_sub(&span)
            .ok_or_else(|| self.out_of_range())?;
        Ok(self)
    }

    fn forward(mut self, ticks: i64) -> Result<Self> {
        let span = self.span(ticks)?;
        self.start = self.advance(&self.start, &span)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::Pitch;
    use crate::semantic::ScoreWarning;
    use num_rational::Rational64;
    use pretty_assertions::assert_eq;

    fn pitch(name: &str) -> Pitch {
        name.parse().unwrap()
    }

    /// Wrap measure bodies in a single-part document.
    fn single_part(measures: &[&str]) -> String {
        let body: String = measures
            .iter()
            .map(|m| format!("<measure>{}</measure>", m))
            .collect();
        format!(
            r#"<score-partwise><part-list><score-part id="P1"><part-name>Piano</part-name><part-abbreviation>Pno.</part-abbreviation></score-part></part-list><part id="P1">{}</part></score-partwise>"#,
            body
        )
    }

    fn note(step: &str, octave: i32, duration: i64, extra: &str) -> String {
        format!(
            "<note>{}<pitch><step>{}</step><octave>{}</octave></pitch><duration>{}</duration></note>",
            extra, step, octave, duration
        )
    }

    #[test]
    fn test_two_quarter_notes() {
        let xml = single_part(&[&format!(
            "<attributes><divisions>4</divisions></attributes>{}{}",
            note("C", 4, 4, ""),
            note("D", 4, 4, "")
        )]);
        let timeline = parse(&xml).unwrap();

        assert_eq!(timeline.length, 8);
        assert_eq!(timeline.notes.len(), 2);
        assert_eq!(timeline.notes[0].pitch, pitch("C4"));
        assert_eq!(timeline.notes[0].start.ticks, 0);
        assert_eq!(timeline.notes[0].duration.ticks, 4);
        assert_eq!(timeline.notes[1].pitch, pitch("D4"));
        assert_eq!(timeline.notes[1].start.ticks, 4);
        assert_eq!(timeline.notes[1].duration.ticks, 4);
        assert_eq!(timeline.notes[1].start.whole_notes, Rational64::new(1, 4));
        assert_eq!(timeline.notes[0].part.part_name, "Piano");
        assert!(timeline.warnings.is_empty());
    }

    #[test]
    fn test_empty_document() {
        let timeline = parse("").unwrap();
        assert_eq!(timeline.length, 0);
        assert!(timeline.notes.is_empty());
        assert!(timeline.measures.is_empty());
        assert_eq!(timeline.warnings, vec![ScoreWarning::EmptyTimeline]);
    }

    #[test]
    fn test_rests_only() {
        let xml = single_part(&["<note><rest/><duration>4</duration></note>"]);
        let timeline = parse(&xml).unwrap();
        assert_eq!(timeline.length, 0);
        assert_eq!(timeline.measures.len(), 1);
        assert_eq!(timeline.measures[0].end.ticks, 4);
    }

    #[test]
    fn test_malformed_markup() {
        let result = parse("<score-partwise><part id=\"P1\"><measure></score-partwise>");
        assert!(matches!(result, Err(PianolaError::MalformedScore { .. })));
    }

    #[test]
    fn test_tie_merges_fragments() {
        let xml = single_part(&[
            &format!(
                "{}{}",
                note("E", 4, 2, ""),
                note("G", 4, 2, "<tie type=\"start\"/>")
            ),
            &format!(
                "{}{}",
                note("G", 4, 4, "<tie type=\"stop\"/><tie type=\"start\"/>"),
                note("G", 4, 1, "<tie type=\"stop\"/>")
            ),
        ]);
        let timeline = parse(&xml).unwrap();

        assert_eq!(timeline.notes.len(), 2);
        let tied = &timeline.notes[1];
        assert_eq!(tied.pitch, pitch("G4"));
        assert_eq!(tied.start.ticks, 2);
        assert_eq!(tied.duration.ticks, 2 + 4 + 1);
        assert_eq!(tied.measure_index, 0);
        assert_eq!(timeline.length, 9);
    }

    #[test]
    fn test_tie_stop_without_start_is_noop() {
        let xml = single_part(&[&format!(
            "{}{}",
            note("C", 4, 1, "<tie type=\"stop\"/>"),
            note("C", 4, 1, "")
        )]);
        let timeline = parse(&xml).unwrap();
        assert_eq!(timeline.notes.len(), 2);
    }

    #[test]
    fn test_chord_members_co_start() {
        let xml = single_part(&[&format!(
            "{}{}{}{}",
            note("C", 4, 2, ""),
            note("E", 4, 2, "<chord/>"),
            note("G", 4, 2, "<chord/>"),
            note("D", 4, 2, "")
        )]);
        let timeline = parse(&xml).unwrap();

        let starts: Vec<i64> = timeline.notes.iter().map(|n| n.start.ticks).collect();
        assert_eq!(starts, vec![0, 0, 0, 2]);
        assert!(timeline.notes[..3]
            .iter()
            .all(|n| n.part.part_id == "P1"));
        assert_eq!(timeline.length, 4);
    }

    #[test]
    fn test_backup_overlays_second_voice() {
        let xml = single_part(&[&format!(
            "{}{}<backup><duration>4</duration></backup>{}<forward><duration>2</duration></forward>{}",
            note("C", 5, 2, ""),
            note("D", 5, 2, ""),
            note("C", 3, 2, ""),
            note("G", 3, 0, "")
        )]);
        let timeline = parse(&xml).unwrap();

        assert_eq!(timeline.notes.len(), 3);
        assert_eq!(timeline.notes[2].pitch, pitch("C3"));
        assert_eq!(timeline.notes[2].start.ticks, 0);
        assert_eq!(timeline.measures[0].end.ticks, 4);
    }

    #[test]
    fn test_zero_duration_note_is_filtered() {
        let xml = single_part(&[&format!(
            "{}{}{}",
            note("C", 4, 0, ""),
            "<note><grace/><pitch><step>E</step><octave>4</octave></pitch></note>",
            note("D", 4, 1, "")
        )]);
        let timeline = parse(&xml).unwrap();
        assert_eq!(timeline.notes.len(), 1);
        assert_eq!(timeline.notes[0].pitch, pitch("D4"));
        assert_eq!(timeline.notes[0].start.ticks, 0);
    }

    #[test]
    fn test_alter_transposes_pitch() {
        let xml = single_part(&[
            "<note><pitch><step>B</step><alter>-1</alter><octave>3</octave></pitch><duration>1</duration></note>",
        ]);
        let timeline = parse(&xml).unwrap();
        assert_eq!(timeline.notes[0].pitch, pitch("A#3"));
    }

    #[test]
    fn test_divisions_change_applies_prospectively() {
        let xml = single_part(&[
            &format!(
                "<attributes><divisions>1</divisions></attributes>{}",
                note("C", 4, 1, "")
            ),
            &format!(
                "<attributes><divisions>4</divisions></attributes>{}",
                note("D", 4, 4, "")
            ),
        ]);
        let timeline = parse(&xml).unwrap();

        assert_eq!(timeline.notes[0].duration.whole_notes, Rational64::new(1, 4));
        assert_eq!(timeline.notes[1].start.ticks, 1);
        assert_eq!(timeline.notes[1].start.whole_notes, Rational64::new(1, 4));
        assert_eq!(timeline.notes[1].duration.whole_notes, Rational64::new(1, 4));
        assert_eq!(timeline.measures[1].end.whole_notes, Rational64::new(1, 2));
    }

    #[test]
    fn test_measures_are_contiguous() {
        let xml = single_part(&[
            &format!(
                "<attributes><divisions>2</divisions><time><beats>3</beats><beat-type>4</beat-type></time></attributes>{}",
                note("C", 4, 6, "")
            ),
            &note("D", 4, 6, ""),
            &format!(
                "<attributes><time><beats>2</beats><beat-type>4</beat-type></time></attributes>{}",
                note("E", 4, 4, "")
            ),
        ]);
        let timeline = parse(&xml).unwrap();

        assert_eq!(timeline.measures.len(), 3);
        for pair in timeline.measures.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let beats: Vec<u32> = timeline.measures.iter().map(|m| m.beats).collect();
        assert_eq!(beats, vec![3, 3, 2]);
        assert_eq!(timeline.notes[2].measure_index, 2);
        assert_eq!(timeline.measures[2].end.ticks, 16);
    }

    #[test]
    fn test_multi_part_keeps_last_part_measures() {
        let xml = r#"<score-partwise>
  <part-list>
    <score-part id="P1"><part-name>Right</part-name></score-part>
    <score-part id="P2"><part-name>Left</part-name></score-part>
  </part-list>
  <part id="P1"><measure><note><pitch><step>E</step><octave>5</octave></pitch><duration>4</duration></note></measure></part>
  <part id="P2"><measure><note><pitch><step>C</step><octave>3</octave></pitch><duration>4</duration></note></measure>
    <measure><note><pitch><step>G</step><octave>2</octave></pitch><duration>4</duration></note></measure></part>
</score-partwise>"#;
        let timeline = parse(xml).unwrap();

        assert_eq!(timeline.notes.len(), 3);
        assert_eq!(timeline.notes[0].part.part_id, "P1");
        assert_eq!(timeline.notes[2].part.part_id, "P2");
        assert_eq!(timeline.notes[2].part.index, 1);
        assert_eq!(timeline.measures.len(), 2);
        assert_eq!(timeline.length, 8);
        assert!(matches!(
            timeline.warnings.as_slice(),
            [ScoreWarning::MeasureMismatch { part_id, .. }] if part_id == "P1"
        ));
    }

    #[test]
    fn test_undeclared_part_is_synthesized() {
        let xml = r#"<part id="X"><measure><note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note></measure></part>"#;
        let timeline = parse(xml).unwrap();
        assert_eq!(timeline.notes[0].part.part_id, "X");
        assert_eq!(timeline.notes[0].part.part_name, "X");
        assert_eq!(timeline.notes[0].part.index, 0);
    }

    #[test]
    fn test_octave_out_of_range_is_malformed() {
        let xml = single_part(&[&note("C", i32::MAX, 1, "")]);
        assert!(matches!(parse(&xml), Err(PianolaError::MalformedScore { .. })));
    }

    #[test]
    fn test_oversized_divisions_are_malformed() {
        let xml = single_part(&[&format!(
            "<attributes><divisions>{}</divisions></attributes>{}",
            i64::MAX / 2,
            note("C", 4, 1, "")
        )]);
        assert!(matches!(parse(&xml), Err(PianolaError::MalformedScore { .. })));
    }

    #[test]
    fn test_overflowing_durations_are_malformed() {
        let xml = single_part(&[&format!(
            "{}{}",
            note("C", 4, i64::MAX, ""),
            note("D", 4, i64::MAX, "")
        )]);
        match parse(&xml) {
            Err(PianolaError::MalformedScore { message, .. }) => {
                assert!(message.contains("P1"), "{}", message)
            }
            other => panic!("expected a malformed score, got {:?}", other),
        }

        let tied = single_part(&[&format!(
            "{}{}",
            note("C", 4, i64::MAX, r#"<tie type="start"/>"#),
            note("C", 4, i64::MAX, r#"<tie type="stop"/>"#)
        )]);
        assert!(matches!(parse(&tied), Err(PianolaError::MalformedScore { .. })));
    }

    #[test]
    fn test_backup_underflow_is_malformed() {
        let backup = format!("<backup><duration>{}</duration></backup>", i64::MAX);
        let xml = single_part(&[&format!("{}{}{}", backup, backup, note("C", 4, 1, ""))]);
        assert!(matches!(parse(&xml), Err(PianolaError::MalformedScore { .. })));
    }
}
