use chrono::{Datelike, NaiveDate};
use log::{debug, warn};

use crate::records::*;

/// One raw row of the poll table, as handed over by the I/O collaborator.
///
/// Numeric fields that failed to parse upstream arrive as `None` and the
/// row is excluded here, with the exclusion tallied in the [`LoadReport`].
/// Dates stay in string form: the store owns date semantics.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct PollSource {
    pub poll_id: Option<u64>,
    pub question_id: Option<u64>,
    pub pollster: String,
    pub cycle: Option<i32>,
    pub race: String,
    pub location: String,
    pub methodology: Option<String>,
    pub margin_poll: Option<f64>,
    pub margin_actual: Option<f64>,
    pub samplesize: Option<i64>,
    pub polldate: String,
}

/// One raw row of the ratings table.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RatingSource {
    pub pollster: String,
    pub rank: Option<u32>,
    pub numeric_grade: Option<f64>,
    pub pollscore: Option<f64>,
    pub wtd_avg_transparency: Option<f64>,
    pub number_polls_pollster_total: Option<u64>,
    pub error_ppm: Option<f64>,
    pub bias_ppm: Option<f64>,
}

/// Row-level diagnostics from one load. Malformed rows are excluded from
/// the working set and counted here, never thrown.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct LoadReport {
    pub polls_seen: usize,
    pub polls_kept: usize,
    pub excluded_bad_date: usize,
    pub excluded_bad_samplesize: usize,
    pub excluded_missing_field: usize,
    pub ratings_seen: usize,
    pub ratings_kept: usize,
}

impl LoadReport {
    pub fn polls_excluded(&self) -> usize {
        self.polls_seen - self.polls_kept
    }
}

/// The two immutable tables, with derived columns pre-computed and the
/// full-domain distinct value sets ready for option seeding.
///
/// Built once at startup and read-only afterwards, so it can be shared
/// across concurrent interaction sessions without locking.
#[derive(PartialEq, Debug, Clone)]
pub struct DatasetStore {
    polls: Vec<PollRecord>,
    ratings: Vec<RatingRecord>,
    pollsters: Vec<String>,
    cycles: Vec<i32>,
    races: Vec<String>,
    locations: Vec<String>,
    methodologies: Vec<String>,
}

impl DatasetStore {
    /// Builds the store from the two raw tables.
    ///
    /// Dates are parsed once here; missing methodology is normalized to
    /// [`UNKNOWN_METHOD`] once here; `margin_diff` and `year` are computed
    /// once here. Polls are kept in ascending date order so every filtered
    /// subset is already plot-ready.
    pub fn load(
        ratings_src: Vec<RatingSource>,
        polls_src: Vec<PollSource>,
    ) -> Result<(DatasetStore, LoadReport), DataLoadError> {
        if ratings_src.is_empty() {
            return Err(DataLoadError::EmptyRatings);
        }

        let mut report = LoadReport {
            polls_seen: polls_src.len(),
            ratings_seen: ratings_src.len(),
            ..LoadReport::default()
        };

        let mut ratings: Vec<RatingRecord> = Vec::new();
        for r in ratings_src {
            match rating_record(r) {
                Some(rec) => ratings.push(rec),
                None => {
                    report.excluded_missing_field += 1;
                }
            }
        }
        report.ratings_kept = ratings.len();
        if ratings.is_empty() {
            return Err(DataLoadError::EmptyRatings);
        }

        let mut polls: Vec<PollRecord> = Vec::new();
        for (lineno, p) in polls_src.into_iter().enumerate() {
            match poll_record(p, &mut report) {
                Some(rec) => polls.push(rec),
                None => {
                    debug!("load: excluding poll row {}", lineno + 1);
                }
            }
        }
        report.polls_kept = polls.len();
        if report.polls_excluded() > 0 {
            warn!(
                "load: excluded {} of {} poll rows (bad date: {}, bad sample size: {}, missing field: {})",
                report.polls_excluded(),
                report.polls_seen,
                report.excluded_bad_date,
                report.excluded_bad_samplesize,
                report.excluded_missing_field,
            );
        }

        polls.sort_by(|a, b| {
            (a.polldate, a.poll_id, a.question_id).cmp(&(b.polldate, b.poll_id, b.question_id))
        });

        // The pollster list seeds the first selection widget and comes from
        // the ratings table, like the original dashboard.
        let pollsters = distinct_owned(ratings.iter().map(|r| r.pollster.as_str()));
        let cycles = crate::distinct_cycles(polls.iter());
        let races = crate::distinct_strings(polls.iter(), |p| &p.race);
        let locations = crate::distinct_strings(polls.iter(), |p| &p.location);
        let methodologies = crate::distinct_strings(polls.iter(), |p| &p.methodology);

        let store = DatasetStore {
            polls,
            ratings,
            pollsters,
            cycles,
            races,
            locations,
            methodologies,
        };
        Ok((store, report))
    }

    pub fn polls(&self) -> &[PollRecord] {
        &self.polls
    }

    pub fn ratings(&self) -> &[RatingRecord] {
        &self.ratings
    }

    /// Distinct pollsters of the ratings table, in table order.
    pub fn pollsters(&self) -> &[String] {
        &self.pollsters
    }

    /// Every cycle present in the poll table, ascending.
    pub fn cycles(&self) -> &[i32] {
        &self.cycles
    }

    pub fn races(&self) -> &[String] {
        &self.races
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn methodologies(&self) -> &[String] {
        &self.methodologies
    }
}

fn distinct_owned<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for v in values {
        if !res.iter().any(|s| s == v) {
            res.push(v.to_string());
        }
    }
    res
}

fn rating_record(src: RatingSource) -> Option<RatingRecord> {
    Some(RatingRecord {
        pollster: src.pollster,
        rank: src.rank?,
        numeric_grade: src.numeric_grade?,
        pollscore: src.pollscore?,
        wtd_avg_transparency: src.wtd_avg_transparency?,
        number_polls_pollster_total: src.number_polls_pollster_total?,
        error_ppm: src.error_ppm?,
        bias_ppm: src.bias_ppm?,
    })
}

fn poll_record(src: PollSource, report: &mut LoadReport) -> Option<PollRecord> {
    let polldate = match parse_polldate(&src.polldate) {
        Some(d) => d,
        None => {
            report.excluded_bad_date += 1;
            return None;
        }
    };
    let samplesize = match src.samplesize {
        Some(n) if n >= 0 => n as u32,
        _ => {
            report.excluded_bad_samplesize += 1;
            return None;
        }
    };
    let (poll_id, question_id, cycle, margin_poll, margin_actual) = match (
        src.poll_id,
        src.question_id,
        src.cycle,
        src.margin_poll,
        src.margin_actual,
    ) {
        (Some(p), Some(q), Some(c), Some(mp), Some(ma)) => (p, q, c, mp, ma),
        _ => {
            report.excluded_missing_field += 1;
            return None;
        }
    };

    let methodology = match src.methodology {
        Some(m) if !m.trim().is_empty() => m,
        _ => UNKNOWN_METHOD.to_string(),
    };

    Some(PollRecord {
        poll_id,
        question_id,
        pollster: src.pollster,
        cycle,
        race: src.race,
        location: src.location,
        methodology,
        margin_poll,
        margin_actual,
        samplesize,
        polldate,
        margin_diff: margin_poll - margin_actual,
        year: polldate.year(),
    })
}

// The published poll archive writes dates as `11/3/20`; ISO dates are
// accepted as well for synthetic and re-exported tables.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];

fn parse_polldate(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}
