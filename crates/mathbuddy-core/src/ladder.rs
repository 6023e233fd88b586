//! Topic ladders: the ordered curriculum a session climbs.
//!
//! A ladder fixes the sequence of topics, the difficulty band within each
//! topic, and the tuning values that drive promotion. Two built-in ladders
//! cover the supported tutoring modes: a school grade-level progression and
//! a coarser course-topic progression.

use crate::error::{Result, TrackerError};

/// Lowest difficulty within a topic.
pub const MIN_DIFFICULTY: u8 = 1;

/// Highest difficulty within a topic.
pub const MAX_DIFFICULTY: u8 = 10;

// ============================================================================
// TopicEntry
// ============================================================================

/// A single rung of a topic ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicEntry {
    /// Display name of the topic (e.g., "Pre-Algebra").
    pub name: String,

    /// Skills covered at this rung. The next rung treats them as
    /// prerequisites.
    pub subtopics: Vec<String>,
}

impl TopicEntry {
    /// Creates a new entry with the given name and subtopics.
    #[must_use]
    pub fn new(name: impl Into<String>, subtopics: &[&str]) -> Self {
        Self {
            name: name.into(),
            subtopics: subtopics.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

// ============================================================================
// Ladder
// ============================================================================

/// An ordered topic progression with its difficulty tuning.
///
/// Difficulty within a topic ranges over `[MIN_DIFFICULTY, MAX_DIFFICULTY]`.
/// When a session's difficulty reaches `promote_at`, the session moves to
/// the next entry and difficulty restarts at `reset_to`; at the final entry
/// the topic stays put and difficulty merely clamps.
///
/// Entries are guaranteed non-empty with unique names; both guarantees are
/// enforced at construction.
#[derive(Debug, Clone)]
pub struct Ladder {
    entries: Vec<TopicEntry>,
    promote_at: u8,
    reset_to: u8,
    initial_difficulty: u8,
}

impl Ladder {
    /// Builds a custom ladder from entries and tuning values.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::InvalidLadder` when `entries` is empty, a
    /// topic name repeats (case-insensitive), a tuning value falls outside
    /// `[MIN_DIFFICULTY, MAX_DIFFICULTY]`, or `reset_to` is not below
    /// `promote_at` (which would promote again on the next correct answer).
    pub fn new(
        entries: Vec<TopicEntry>,
        promote_at: u8,
        reset_to: u8,
        initial_difficulty: u8,
    ) -> Result<Self> {
        if entries.is_empty() {
            return Err(TrackerError::invalid_ladder(
                "ladder has no entries",
                "Provide at least one topic entry",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.to_lowercase()) {
                return Err(TrackerError::invalid_ladder(
                    format!("duplicate topic '{}'", entry.name),
                    "Topic names must be unique within a ladder",
                ));
            }
        }

        for (label, value) in [
            ("promotion threshold", promote_at),
            ("difficulty reset value", reset_to),
            ("initial difficulty", initial_difficulty),
        ] {
            if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&value) {
                return Err(TrackerError::invalid_ladder(
                    format!("{label} {value} is outside [{MIN_DIFFICULTY}, {MAX_DIFFICULTY}]"),
                    "Keep all tuning values within the difficulty range",
                ));
            }
        }

        if reset_to >= promote_at {
            return Err(TrackerError::invalid_ladder(
                format!("difficulty reset value {reset_to} is not below promotion threshold {promote_at}"),
                "A promoted session must re-earn the threshold; lower the reset value",
            ));
        }

        Ok(Self {
            entries,
            promote_at,
            reset_to,
            initial_difficulty,
        })
    }

    /// The school grade-level ladder, from 3rd grade through first-semester
    /// calculus.
    ///
    /// Promotes at difficulty 8 and restarts each new grade at difficulty 1.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathbuddy_core::Ladder;
    ///
    /// let ladder = Ladder::grade_levels();
    /// assert_eq!(ladder.first().name, "3rd Grade");
    /// assert_eq!(ladder.last().name, "Calculus 1");
    /// assert_eq!(ladder.promote_at(), 8);
    /// ```
    #[must_use]
    pub fn grade_levels() -> Self {
        Self {
            entries: vec![
                TopicEntry::new("3rd Grade", &["multiplication", "division", "fractions"]),
                TopicEntry::new(
                    "4th Grade",
                    &["multi-digit multiplication", "long division", "decimals"],
                ),
                TopicEntry::new(
                    "5th Grade",
                    &["fraction arithmetic", "decimal operations", "volume"],
                ),
                TopicEntry::new("6th Grade", &["ratios", "percentages", "negative numbers"]),
                TopicEntry::new("Pre-Algebra", &["integers", "one-step equations", "exponents"]),
                TopicEntry::new(
                    "Algebra 1",
                    &["linear equations", "inequalities", "polynomials"],
                ),
                TopicEntry::new("Geometry", &["angles", "triangles", "circles"]),
                TopicEntry::new("Algebra 2", &["quadratics", "logarithms", "functions"]),
                TopicEntry::new(
                    "Pre-Calculus",
                    &["trigonometry", "complex numbers", "sequences"],
                ),
                TopicEntry::new("Calculus 1", &["limits", "derivatives", "integrals"]),
            ],
            promote_at: 8,
            reset_to: 1,
            initial_difficulty: 1,
        }
    }

    /// The course-topic ladder, from arithmetic through calculus.
    ///
    /// A coarser progression for general practice: promotes only at
    /// difficulty 10, restarts each new course at difficulty 8, and starts
    /// sessions mid-band at difficulty 5.
    #[must_use]
    pub fn course_topics() -> Self {
        Self {
            entries: vec![
                TopicEntry::new(
                    "Arithmetic",
                    &["addition", "subtraction", "multiplication", "division", "fractions"],
                ),
                TopicEntry::new(
                    "Algebra",
                    &["variables", "linear equations", "polynomials", "factoring"],
                ),
                TopicEntry::new(
                    "Geometry",
                    &["angles", "triangles", "circles", "area and volume"],
                ),
                TopicEntry::new(
                    "Trigonometry",
                    &["sine and cosine", "the unit circle", "identities"],
                ),
                TopicEntry::new("Calculus", &["limits", "derivatives", "integrals"]),
            ],
            promote_at: 10,
            reset_to: 8,
            initial_difficulty: 5,
        }
    }

    /// Position of `topic` in the ladder, or `None` for unknown names.
    ///
    /// Lookup is exact; use [`Ladder::resolve`] for forgiving matching.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathbuddy_core::Ladder;
    ///
    /// let ladder = Ladder::grade_levels();
    /// assert_eq!(ladder.position("3rd Grade"), Some(0));
    /// assert_eq!(ladder.position("Calculus 1"), Some(9));
    /// assert_eq!(ladder.position("Underwater Basket Weaving"), None);
    /// ```
    #[must_use]
    pub fn position(&self, topic: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == topic)
    }

    /// Resolves a loosely written topic name to its canonical entry.
    ///
    /// Trims whitespace and ignores case, so `"  algebra 1 "` resolves to
    /// the `"Algebra 1"` entry. Returns `None` when nothing matches.
    #[must_use]
    pub fn resolve(&self, topic: &str) -> Option<&TopicEntry> {
        let wanted = topic.trim();
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(wanted))
    }

    /// The entry following `topic`, or `None` at the final entry (and for
    /// unknown names).
    #[must_use]
    pub fn next_after(&self, topic: &str) -> Option<&TopicEntry> {
        let index = self.position(topic)?;
        self.entries.get(index + 1)
    }

    /// Subtopics of the entry preceding `topic`.
    ///
    /// These are the skills a student is assumed to have before starting
    /// `topic`. Empty for the first entry and for unknown names.
    #[must_use]
    pub fn prerequisites(&self, topic: &str) -> &[String] {
        match self.position(topic) {
            Some(index) if index > 0 => self
                .entries
                .get(index - 1)
                .map_or(&[], |entry| entry.subtopics.as_slice()),
            _ => &[],
        }
    }

    /// Returns `true` if `topic` names an entry of this ladder.
    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        self.position(topic).is_some()
    }

    /// The first (easiest) entry. Sessions start here.
    #[must_use]
    pub fn first(&self) -> &TopicEntry {
        &self.entries[0]
    }

    /// The final (terminal) entry.
    #[must_use]
    pub fn last(&self) -> &TopicEntry {
        &self.entries[self.entries.len() - 1]
    }

    /// All entries in ladder order.
    #[must_use]
    pub fn entries(&self) -> &[TopicEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`: construction rejects empty ladders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The difficulty at which a session promotes to the next entry.
    #[must_use]
    pub const fn promote_at(&self) -> u8 {
        self.promote_at
    }

    /// The difficulty a session restarts at after promotion.
    #[must_use]
    pub const fn reset_to(&self) -> u8 {
        self.reset_to
    }

    /// The difficulty a fresh session starts at.
    #[must_use]
    pub const fn initial_difficulty(&self) -> u8 {
        self.initial_difficulty
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tiny_ladder() -> Ladder {
        Ladder::new(
            vec![
                TopicEntry::new("Counting", &["numbers"]),
                TopicEntry::new("Addition", &["sums"]),
            ],
            8,
            1,
            1,
        )
        .unwrap()
    }

    // ------------------------------------------------------------------------
    // Built-in variants
    // ------------------------------------------------------------------------

    #[test]
    fn test_grade_levels_shape() {
        let ladder = Ladder::grade_levels();
        assert_eq!(ladder.len(), 10);
        assert_eq!(ladder.first().name, "3rd Grade");
        assert_eq!(ladder.last().name, "Calculus 1");
        assert_eq!(ladder.promote_at(), 8);
        assert_eq!(ladder.reset_to(), 1);
        assert_eq!(ladder.initial_difficulty(), 1);
    }

    #[test]
    fn test_course_topics_shape() {
        let ladder = Ladder::course_topics();
        assert_eq!(ladder.len(), 5);
        assert_eq!(ladder.first().name, "Arithmetic");
        assert_eq!(ladder.last().name, "Calculus");
        assert_eq!(ladder.promote_at(), 10);
        assert_eq!(ladder.reset_to(), 8);
        assert_eq!(ladder.initial_difficulty(), 5);
    }

    #[test]
    fn test_builtins_pass_their_own_validation() {
        for ladder in [Ladder::grade_levels(), Ladder::course_topics()] {
            let rebuilt = Ladder::new(
                ladder.entries().to_vec(),
                ladder.promote_at(),
                ladder.reset_to(),
                ladder.initial_difficulty(),
            );
            assert!(rebuilt.is_ok());
        }
    }

    // ------------------------------------------------------------------------
    // Lookup operations
    // ------------------------------------------------------------------------

    #[test]
    fn test_position() {
        let ladder = Ladder::grade_levels();
        assert_eq!(ladder.position("3rd Grade"), Some(0));
        assert_eq!(ladder.position("Pre-Algebra"), Some(4));
        assert_eq!(ladder.position("Calculus 1"), Some(9));
        assert_eq!(ladder.position("calculus 1"), None); // exact match only
        assert_eq!(ladder.position("Kindergarten"), None);
    }

    #[test]
    fn test_resolve_is_forgiving() {
        let ladder = Ladder::grade_levels();
        assert_eq!(ladder.resolve("  algebra 1 ").unwrap().name, "Algebra 1");
        assert_eq!(ladder.resolve("GEOMETRY").unwrap().name, "Geometry");
        assert!(ladder.resolve("algebra 3").is_none());
    }

    #[test]
    fn test_next_after() {
        let ladder = Ladder::grade_levels();
        assert_eq!(ladder.next_after("3rd Grade").unwrap().name, "4th Grade");
        assert_eq!(
            ladder.next_after("Pre-Calculus").unwrap().name,
            "Calculus 1"
        );
        // Terminal entry has no successor.
        assert!(ladder.next_after("Calculus 1").is_none());
        assert!(ladder.next_after("nope").is_none());
    }

    #[test]
    fn test_prerequisites() {
        let ladder = Ladder::course_topics();
        // First entry has no prerequisites.
        assert!(ladder.prerequisites("Arithmetic").is_empty());
        // Later entries inherit the previous entry's subtopics.
        assert_eq!(
            ladder.prerequisites("Algebra"),
            &["addition", "subtraction", "multiplication", "division", "fractions"]
        );
        assert_eq!(
            ladder.prerequisites("Calculus"),
            &["sine and cosine", "the unit circle", "identities"]
        );
        assert!(ladder.prerequisites("nope").is_empty());
    }

    #[test]
    fn test_contains() {
        let ladder = tiny_ladder();
        assert!(ladder.contains("Counting"));
        assert!(ladder.contains("Addition"));
        assert!(!ladder.contains("Division"));
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    #[test]
    fn test_new_rejects_empty_entries() {
        let result = Ladder::new(vec![], 8, 1, 1);
        assert!(matches!(result, Err(TrackerError::InvalidLadder { .. })));
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let result = Ladder::new(
            vec![
                TopicEntry::new("Algebra", &[]),
                TopicEntry::new("algebra", &[]),
            ],
            8,
            1,
            1,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("duplicate topic"));
    }

    #[test]
    fn test_new_rejects_out_of_range_tuning() {
        let entries = vec![TopicEntry::new("Algebra", &[])];
        assert!(Ladder::new(entries.clone(), 11, 1, 1).is_err());
        assert!(Ladder::new(entries.clone(), 8, 0, 1).is_err());
        assert!(Ladder::new(entries, 8, 1, 12).is_err());
    }

    #[test]
    fn test_new_rejects_reset_at_or_above_threshold() {
        let entries = vec![
            TopicEntry::new("Algebra", &[]),
            TopicEntry::new("Geometry", &[]),
        ];
        let err = Ladder::new(entries, 8, 8, 1).unwrap_err();
        assert!(err.to_string().contains("not below promotion threshold"));
    }
}
