//! Target positions for keyboard navigation jumps.

use super::query::is_active;
use super::types::Navigation;
use crate::score::{Note, Timeline};
use crate::tracks::Track;

/// Where a navigation jump from `position` should land, or `None` when there is
/// nothing to jump to (including any jump on an empty timeline).
///
/// Page jumps move by `length / page_divisor`, rounded to the nearest tick, and
/// are not clamped to the timeline; the queries treat out-of-range positions as
/// empty.
pub fn navigation_target(
    navigation: Navigation,
    timeline: &Timeline,
    tracks: &[Track],
    position: i64,
    page_divisor: i64,
) -> Option<i64> {
    if timeline.is_empty() {
        return None;
    }

    let note_starts = || {
        timeline
            .notes
            .iter()
            .filter(|note| is_active(tracks, note))
            .map(Note::start_ticks)
    };
    let measure_starts = || timeline.measures.iter().map(|m| m.start.ticks);
    let page = (timeline.length as f64 / page_divisor.max(1) as f64).round() as i64;

    match navigation {
        Navigation::NextNote => note_starts().filter(|t| *t > position).min(),
        Navigation::PreviousNote => note_starts().filter(|t| *t < position).max(),
        Navigation::NextMeasure => measure_starts().filter(|t| *t > position).min(),
        Navigation::PreviousMeasure => measure_starts().filter(|t| *t < position).max(),
        Navigation::Home => Some(0),
        Navigation::End => Some(timeline.length),
        Navigation::PageUp => Some(position.saturating_sub(page)),
        Navigation::PageDown => Some(position.saturating_add(page)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use crate::tracks::derive_tracks;

    const SCORE: &str = r#"<score-partwise>
  <part-list>
    <score-part id="P1"><part-name>Right</part-name></score-part>
    <score-part id="P2"><part-name>Left</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure><attributes><divisions>10</divisions></attributes>
      <note><pitch><step>C</step><octave>5</octave></pitch><duration>20</duration></note>
      <note><pitch><step>D</step><octave>5</octave></pitch><duration>20</duration></note>
    </measure>
    <measure><note><pitch><step>E</step><octave>5</octave></pitch><duration>40</duration></note></measure>
  </part>
  <part id="P2">
    <measure><attributes><divisions>10</divisions></attributes>
      <note><rest/><duration>10</duration></note>
      <note><pitch><step>C</step><octave>3</octave></pitch><duration>30</duration></note>
    </measure>
    <measure><note><pitch><step>G</step><octave>2</octave></pitch><duration>40</duration></note></measure>
  </part>
</score-partwise>"#;

    fn target(navigation: Navigation, position: i64, tracks: &[Track]) -> Option<i64> {
        let timeline = parse(SCORE).unwrap();
        navigation_target(navigation, &timeline, tracks, position, 20)
    }

    #[test]
    fn test_note_navigation() {
        let timeline = parse(SCORE).unwrap();
        let tracks = derive_tracks(&timeline);
        assert_eq!(target(Navigation::NextNote, 0, &tracks), Some(10));
        assert_eq!(target(Navigation::NextNote, 10, &tracks), Some(20));
        assert_eq!(target(Navigation::PreviousNote, 20, &tracks), Some(10));
        assert_eq!(target(Navigation::PreviousNote, 0, &tracks), None);
        assert_eq!(target(Navigation::NextNote, 40, &tracks), None);
    }

    #[test]
    fn test_note_navigation_skips_inactive_tracks() {
        let timeline = parse(SCORE).unwrap();
        let mut tracks = derive_tracks(&timeline);
        tracks[1].active = false;
        assert_eq!(target(Navigation::NextNote, 0, &tracks), Some(20));
    }

    #[test]
    fn test_measure_navigation() {
        let timeline = parse(SCORE).unwrap();
        let tracks = derive_tracks(&timeline);
        assert_eq!(target(Navigation::NextMeasure, 5, &tracks), Some(40));
        assert_eq!(target(Navigation::NextMeasure, 40, &tracks), None);
        assert_eq!(target(Navigation::PreviousMeasure, 40, &tracks), Some(0));
        assert_eq!(target(Navigation::PreviousMeasure, 41, &tracks), Some(40));
    }

    #[test]
    fn test_home_end_and_pages() {
        let timeline = parse(SCORE).unwrap();
        let tracks = derive_tracks(&timeline);
        assert_eq!(target(Navigation::Home, 33, &tracks), Some(0));
        assert_eq!(target(Navigation::End, 33, &tracks), Some(80));
        assert_eq!(target(Navigation::PageDown, 33, &tracks), Some(37));
        assert_eq!(target(Navigation::PageUp, 2, &tracks), Some(-2));
    }

    #[test]
    fn test_page_step_rounds_on_short_scores() {
        let short = |length: i64| {
            parse(&format!(
                r#"<part id="P1"><measure><note><pitch><step>C</step><octave>4</octave></pitch><duration>{}</duration></note></measure></part>"#,
                length
            ))
            .unwrap()
        };

        // 10 / 20 rounds up to a one-tick page instead of a zero-length jump
        let timeline = short(10);
        let tracks = derive_tracks(&timeline);
        assert_eq!(navigation_target(Navigation::PageDown, &timeline, &tracks, 0, 20), Some(1));
        assert_eq!(navigation_target(Navigation::PageUp, &timeline, &tracks, 5, 20), Some(4));

        let timeline = short(30);
        assert_eq!(navigation_target(Navigation::PageDown, &timeline, &tracks, 0, 20), Some(2));

        let timeline = short(7);
        assert_eq!(navigation_target(Navigation::PageDown, &timeline, &tracks, 3, 20), Some(3));
    }

    #[test]
    fn test_page_jumps_saturate() {
        let timeline = parse(SCORE).unwrap();
        let tracks = derive_tracks(&timeline);
        assert_eq!(
            navigation_target(Navigation::PageDown, &timeline, &tracks, i64::MAX, 20),
            Some(i64::MAX)
        );
        assert_eq!(
            navigation_target(Navigation::PageUp, &timeline, &tracks, i64::MIN, 20),
            Some(i64::MIN)
        );
    }

    #[test]
    fn test_empty_timeline_has_no_targets() {
        let timeline = Timeline::default();
        assert_eq!(
            navigation_target(Navigation::Home, &timeline, &[], 0, 20),
            None
        );
        assert_eq!(
            navigation_target(Navigation::PageDown, &timeline, &[], 0, 20),
            None
        );
    }
}
