// ********* Core data structures ***********

use chrono::NaiveDate;
use std::error::Error;
use std::fmt::Display;

/// The sentinel used for polls whose collection method was not recorded.
///
/// Substitution happens exactly once, when the store is loaded. Downstream
/// code can rely on `methodology` never being empty.
pub const UNKNOWN_METHOD: &str = "Unknown Method";

/// One row of the poll dataset.
///
/// `margin_diff` and `year` are derived at load time and are part of the
/// record from then on. Invariant: `margin_diff == margin_poll - margin_actual`
/// for the same record, including after filtering.
#[derive(PartialEq, Debug, Clone)]
pub struct PollRecord {
    pub poll_id: u64,
    pub question_id: u64,
    pub pollster: String,
    pub cycle: i32,
    pub race: String,
    pub location: String,
    pub methodology: String,
    pub margin_poll: f64,
    pub margin_actual: f64,
    pub samplesize: u32,
    pub polldate: NaiveDate,
    pub margin_diff: f64,
    pub year: i32,
}

/// One row of the pollster ratings table. `pollster` is the unique key.
#[derive(PartialEq, Debug, Clone)]
pub struct RatingRecord {
    pub pollster: String,
    pub rank: u32,
    pub numeric_grade: f64,
    pub pollscore: f64,
    pub wtd_avg_transparency: f64,
    pub number_polls_pollster_total: u64,
    pub error_ppm: f64,
    pub bias_ppm: f64,
}

/// The optional filter dimensions, in cascade priority order.
///
/// The pollster is not listed here: it is mandatory and always applied
/// before any of these.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Dimension {
    Cycle,
    Race,
    Location,
    Methodology,
}

impl Dimension {
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Cycle => "cycle",
            Dimension::Race => "race",
            Dimension::Location => "location",
            Dimension::Methodology => "methodology",
        }
    }

    /// Parses the string form used by the selection-event interface.
    ///
    /// An unknown name is a caller bug, not a user-input case.
    pub fn from_name(name: &str) -> Result<Dimension, InvalidDimensionError> {
        match name {
            "cycle" => Ok(Dimension::Cycle),
            "race" => Ok(Dimension::Race),
            "location" => Ok(Dimension::Location),
            "methodology" => Ok(Dimension::Methodology),
            _ => Err(InvalidDimensionError {
                name: name.to_string(),
            }),
        }
    }
}

/// One user interaction: pick a pollster, or set/unset one dimension.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Selection {
    Pollster(String),
    Set(Dimension, String),
    Unset(Dimension),
}

impl Selection {
    /// Builds a selection from a `(dimension, value-or-unset)` event.
    pub fn from_event(
        dimension: &str,
        value: Option<&str>,
    ) -> Result<Selection, InvalidDimensionError> {
        if dimension == "pollster" {
            return Ok(Selection::Pollster(value.unwrap_or_default().to_string()));
        }
        let dim = Dimension::from_name(dimension)?;
        Ok(match value {
            Some(v) if !v.is_empty() => Selection::Set(dim, v.to_string()),
            _ => Selection::Unset(dim),
        })
    }
}

/// The active constraints of one interaction session.
///
/// Replaced wholesale on every selection event; never mutated field by field
/// without going back through the resolver.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FilterState {
    pub pollster: String,
    pub cycle: Option<i32>,
    pub race: Option<String>,
    pub location: Option<String>,
    pub methodology: Option<String>,
}

impl FilterState {
    pub fn new(pollster: String) -> FilterState {
        FilterState {
            pollster,
            cycle: None,
            race: None,
            location: None,
            methodology: None,
        }
    }

    /// Returns the state after one selection event.
    ///
    /// Picking a pollster resets every downstream dimension. A cycle value
    /// that does not parse as a number can match no record and is treated
    /// as unset, the same way a stale value would be.
    pub fn apply(&self, selection: &Selection) -> FilterState {
        match selection {
            Selection::Pollster(name) => FilterState::new(name.clone()),
            Selection::Set(dim, value) => {
                let mut next = self.clone();
                match dim {
                    Dimension::Cycle => next.cycle = value.trim().parse::<i32>().ok(),
                    Dimension::Race => next.race = Some(value.clone()),
                    Dimension::Location => next.location = Some(value.clone()),
                    Dimension::Methodology => next.methodology = Some(value.clone()),
                }
                next
            }
            Selection::Unset(dim) => {
                let mut next = self.clone();
                match dim {
                    Dimension::Cycle => next.cycle = None,
                    Dimension::Race => next.race = None,
                    Dimension::Location => next.location = None,
                    Dimension::Methodology => next.methodology = None,
                }
                next
            }
        }
    }
}

// ******** Output data structures *********

/// The valid options for every dimension, given the upstream constraints.
///
/// Cycles are in ascending numeric order; the string dimensions keep the
/// stable first-occurrence order of the underlying records.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct DimensionOptions {
    pub cycles: Vec<i32>,
    pub races: Vec<String>,
    pub locations: Vec<String>,
    pub methodologies: Vec<String>,
}

/// Distinct-entity counts over the filtered subset.
///
/// One poll may carry several questions, so these are distinct counts of
/// `poll_id` and `question_id`, not row counts.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Summary {
    pub poll_count: usize,
    pub question_count: usize,
}

impl Summary {
    /// The one-line text form shown above the series plot.
    pub fn headline(&self) -> String {
        format!(
            "Number of Polls: {}.   Number of Questions: {}",
            self.poll_count, self.question_count
        )
    }
}

/// The rating row of the selected pollster, projected into the
/// presentation-facing field set.
#[derive(PartialEq, Debug, Clone)]
pub struct RatingSummary {
    pub rank: u32,
    pub pollster: String,
    /// Sourced from `numeric_grade`.
    pub rating: f64,
    pub pollscore: f64,
    /// Sourced from `wtd_avg_transparency`.
    pub transparency: f64,
    pub number_polls: u64,
    /// Sourced from `error_ppm`.
    pub error: f64,
    /// Sourced from `bias_ppm`. The key must match the ratings schema
    /// exactly; a near-miss here silently drops the bias column.
    pub bias: f64,
}

/// The two series of the margin-over-time comparison.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SeriesName {
    MarginPoll,
    MarginActual,
}

impl SeriesName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesName::MarginPoll => "margin_poll",
            SeriesName::MarginActual => "margin_actual",
        }
    }
}

/// One observation of the long-form plot dataset: two of these are emitted
/// per filtered record, one per series.
#[derive(PartialEq, Debug, Clone)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub series: SeriesName,
    pub value: f64,
    /// The poll sample size, used as the point weight.
    pub weight: u32,
}

// ******** Errors *********

/// Structural problems with the source tables. Fatal at startup: the
/// process should not continue with a partially loaded store.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum DataLoadError {
    /// A required column is absent from a source table header.
    MissingColumn { table: String, column: String },
    /// The ratings table has no rows; there is no pollster to select.
    EmptyRatings,
}

impl Error for DataLoadError {}

impl Display for DataLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataLoadError::MissingColumn { table, column } => {
                write!(f, "required column {:?} is missing from {}", column, table)
            }
            DataLoadError::EmptyRatings => write!(f, "the ratings table has no rows"),
        }
    }
}

/// A dimension name outside the schema was requested. This is a
/// programming-contract violation by the caller, never a user-input case.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct InvalidDimensionError {
    pub name: String,
}

impl Error for InvalidDimensionError {}

impl Display for InvalidDimensionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown filter dimension {:?}", self.name)
    }
}

/// The selected pollster has no row in the ratings table. Recoverable: the
/// caller should present a placeholder rating summary and keep going.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NotFoundError {
    pub pollster: String,
}

impl Error for NotFoundError {}

impl Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pollster {:?} is not in the ratings table", self.pollster)
    }
}
