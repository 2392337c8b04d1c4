use crate::records::DataLoadError;
use crate::store::{DatasetStore, LoadReport, PollSource, RatingSource};

/// A builder for assembling a synthetic dataset store row by row.
///
/// This is the easiest way to construct a store in tests and examples
/// without going through the tabular I/O layer.
///
/// ```
/// use poll_explorer::{resolve, FilterState, StoreBuilder};
///
/// let (store, _report) = StoreBuilder::new()
///     .rating("Acme Polls")
///     .poll("Acme Polls", 2020, "Pres-G", "US", "IVR", "2020-10-01")
///     .build()?;
///
/// let res = resolve(&store, &FilterState::new("Acme Polls".to_string()));
/// assert_eq!(res.filtered.len(), 1);
/// # Ok::<(), poll_explorer::DataLoadError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct StoreBuilder {
    ratings: Vec<RatingSource>,
    polls: Vec<PollSource>,
}

impl StoreBuilder {
    pub fn new() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Adds a ratings row with plausible default figures.
    pub fn rating(mut self, pollster: &str) -> StoreBuilder {
        let rank = self.ratings.len() as u32 + 1;
        self.ratings.push(RatingSource {
            pollster: pollster.to_string(),
            rank: Some(rank),
            numeric_grade: Some(2.9),
            pollscore: Some(-1.1),
            wtd_avg_transparency: Some(8.0),
            number_polls_pollster_total: Some(450),
            error_ppm: Some(4.2),
            bias_ppm: Some(0.7),
        });
        self
    }

    /// Adds a poll row. Identity defaults to fresh ids, measures to a
    /// fixed margin pair and sample size; use the modifiers below to
    /// override the last added row.
    pub fn poll(
        mut self,
        pollster: &str,
        cycle: i32,
        race: &str,
        location: &str,
        methodology: &str,
        polldate: &str,
    ) -> StoreBuilder {
        let next_id = self.polls.len() as u64 + 1;
        self.polls.push(PollSource {
            poll_id: Some(next_id),
            question_id: Some(next_id * 10),
            pollster: pollster.to_string(),
            cycle: Some(cycle),
            race: race.to_string(),
            location: location.to_string(),
            methodology: Some(methodology.to_string()),
            margin_poll: Some(2.0),
            margin_actual: Some(1.0),
            samplesize: Some(600),
            polldate: polldate.to_string(),
        });
        self
    }

    /// Overrides the identity of the last added poll row.
    pub fn ids(mut self, poll_id: u64, question_id: u64) -> StoreBuilder {
        if let Some(p) = self.polls.last_mut() {
            p.poll_id = Some(poll_id);
            p.question_id = Some(question_id);
        }
        self
    }

    /// Overrides the margin pair of the last added poll row.
    pub fn margins(mut self, margin_poll: f64, margin_actual: f64) -> StoreBuilder {
        if let Some(p) = self.polls.last_mut() {
            p.margin_poll = Some(margin_poll);
            p.margin_actual = Some(margin_actual);
        }
        self
    }

    /// Overrides the sample size of the last added poll row.
    pub fn samplesize(mut self, samplesize: i64) -> StoreBuilder {
        if let Some(p) = self.polls.last_mut() {
            p.samplesize = Some(samplesize);
        }
        self
    }

    pub fn build(self) -> Result<(DatasetStore, LoadReport), DataLoadError> {
        DatasetStore::load(self.ratings, self.polls)
    }
}
