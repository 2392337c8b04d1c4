mod builder;
pub mod manual;
mod records;
mod store;

use log::{debug, info, warn};

use std::collections::HashSet;

pub use crate::builder::*;
pub use crate::records::*;
pub use crate::store::*;

/// The outcome of one resolution pass.
#[derive(PartialEq, Debug, Clone)]
pub struct Resolution {
    /// The records matching every applied constraint, in store (date) order.
    pub filtered: Vec<PollRecord>,
    /// The valid option sets for every dimension, each computed against the
    /// subset available before that dimension's own filter narrows it.
    pub options: DimensionOptions,
    /// The constraints that were actually applied. Stale selections are
    /// dropped here rather than reported as set.
    pub effective: FilterState,
}

/// Recomputes the filtered subset and every dimension option set for the
/// given filter state.
///
/// The pollster constraint is applied first, unconditionally. The remaining
/// dimensions are applied in the fixed order cycle, race, location,
/// methodology, each only if set. The option set for a dimension is taken
/// from the subset narrowed by everything upstream of it but not by its own
/// selection, so the value a user already picked stays visible and
/// revertible.
///
/// A selection whose value is no longer present after an upstream change is
/// treated as unset. An empty result is not an error: every output is a
/// well-formed empty structure.
pub fn resolve(store: &DatasetStore, state: &FilterState) -> Resolution {
    debug!("resolve: state: {:?}", state);
    let base: Vec<&PollRecord> = store
        .polls()
        .iter()
        .filter(|r| r.pollster == state.pollster)
        .collect();
    info!(
        "resolve: pollster {:?}: {} base records",
        state.pollster,
        base.len()
    );

    let mut effective = FilterState::new(state.pollster.clone());
    let mut options = DimensionOptions::default();

    options.cycles = distinct_cycles(base.iter().copied());
    let cur = match state.cycle {
        Some(c) if options.cycles.contains(&c) => {
            effective.cycle = Some(c);
            base.into_iter().filter(|r| r.cycle == c).collect()
        }
        Some(c) => {
            warn!("resolve: stale cycle selection {:?}, treating as unset", c);
            base
        }
        None => base,
    };

    options.races = distinct_strings(cur.iter().copied(), |r| &r.race);
    let cur = narrow_str(
        cur,
        Dimension::Race,
        &state.race,
        &options.races,
        |r| &r.race,
        &mut effective.race,
    );

    options.locations = distinct_strings(cur.iter().copied(), |r| &r.location);
    let cur = narrow_str(
        cur,
        Dimension::Location,
        &state.location,
        &options.locations,
        |r| &r.location,
        &mut effective.location,
    );

    options.methodologies = distinct_strings(cur.iter().copied(), |r| &r.methodology);
    let cur = narrow_str(
        cur,
        Dimension::Methodology,
        &state.methodology,
        &options.methodologies,
        |r| &r.methodology,
        &mut effective.methodology,
    );

    // The derived margin is recomputed on the outgoing clones; it must
    // agree with the load-time value.
    let filtered: Vec<PollRecord> = cur
        .into_iter()
        .map(|r| {
            let mut rec = r.clone();
            rec.margin_diff = rec.margin_poll - rec.margin_actual;
            rec
        })
        .collect();
    debug!("resolve: {} records after all constraints", filtered.len());

    Resolution {
        filtered,
        options,
        effective,
    }
}

fn narrow_str<'a>(
    subset: Vec<&'a PollRecord>,
    dim: Dimension,
    selected: &Option<String>,
    valid: &[String],
    key: fn(&PollRecord) -> &str,
    effective: &mut Option<String>,
) -> Vec<&'a PollRecord> {
    match selected {
        Some(v) if valid.iter().any(|s| s == v) => {
            *effective = Some(v.clone());
            subset.into_iter().filter(|r| key(r) == v).collect()
        }
        Some(v) => {
            warn!(
                "resolve: stale {} selection {:?}, treating as unset",
                dim.name(),
                v
            );
            subset
        }
        None => subset,
    }
}

/// Distinct values of a string dimension, in stable first-occurrence order.
/// Pure function of its input: identical input yields identical output.
pub fn distinct_strings<'a>(
    records: impl IntoIterator<Item = &'a PollRecord>,
    key: impl Fn(&'a PollRecord) -> &'a str,
) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for r in records {
        let v = key(r);
        if !res.iter().any(|s| s == v) {
            res.push(v.to_string());
        }
    }
    res
}

/// Distinct cycles in ascending numeric order.
pub fn distinct_cycles<'a>(records: impl IntoIterator<Item = &'a PollRecord>) -> Vec<i32> {
    let mut res: Vec<i32> = Vec::new();
    for r in records {
        if !res.contains(&r.cycle) {
            res.push(r.cycle);
        }
    }
    res.sort_unstable();
    res
}

/// Counts the distinct polls and distinct questions of the filtered subset.
pub fn summarize(filtered: &[PollRecord]) -> Summary {
    let polls: HashSet<u64> = filtered.iter().map(|r| r.poll_id).collect();
    let questions: HashSet<u64> = filtered.iter().map(|r| r.question_id).collect();
    Summary {
        poll_count: polls.len(),
        question_count: questions.len(),
    }
}

/// Projects the rating row of the selected pollster into the
/// presentation-facing field set.
///
/// Every pollster appearing in the poll table should have a ratings row,
/// but a missing one is handled, not assumed: the caller gets a
/// [`NotFoundError`] and should degrade to a placeholder summary.
pub fn summarize_ratings(
    ratings: &[RatingRecord],
    pollster: &str,
) -> Result<RatingSummary, NotFoundError> {
    let row = ratings
        .iter()
        .find(|r| r.pollster == pollster)
        .ok_or_else(|| NotFoundError {
            pollster: pollster.to_string(),
        })?;
    Ok(RatingSummary {
        rank: row.rank,
        pollster: row.pollster.clone(),
        rating: row.numeric_grade,
        pollscore: row.pollscore,
        transparency: row.wtd_avg_transparency,
        number_polls: row.number_polls_pollster_total,
        error: row.error_ppm,
        bias: row.bias_ppm,
    })
}

/// Reshapes the filtered subset into the long-form series of the
/// margin-over-time plot: two points per record, one per margin series,
/// with the sample size as point weight.
///
/// The iterator is lazy and restartable. Input order is preserved; sorting
/// is a presentation concern and does not happen here.
pub fn project_series(filtered: &[PollRecord]) -> impl Iterator<Item = SeriesPoint> + '_ {
    filtered.iter().flat_map(|r| {
        [
            SeriesPoint {
                date: r.polldate,
                series: SeriesName::MarginPoll,
                value: r.margin_poll,
                weight: r.samplesize,
            },
            SeriesPoint {
                date: r.polldate,
                series: SeriesName::MarginActual,
                value: r.margin_actual,
                weight: r.samplesize,
            },
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two pollsters, two cycles, races and methods that differ per cycle.
    fn acme_store() -> DatasetStore {
        let (store, _) = StoreBuilder::new()
            .rating("Acme Polls")
            .rating("Bravo Research")
            .poll("Acme Polls", 2020, "Pres-G", "US", "IVR", "2020-09-01")
            .poll("Acme Polls", 2020, "Pres-G", "PA", "Live Phone", "2020-10-01")
            .poll("Acme Polls", 2020, "Sen-G", "PA", "IVR", "2020-10-15")
            .poll("Acme Polls", 2022, "Gov-G", "WI", "Online Panel", "2022-10-01")
            .poll("Bravo Research", 2022, "Sen-G", "GA", "Live Phone", "2022-09-15")
            .build()
            .unwrap();
        store
    }

    #[test]
    fn cycle_options_restrict_downstream_races() {
        // Scenario: two cycles for the pollster, races present in one only.
        let store = acme_store();
        let state = FilterState::new("Acme Polls".to_string())
            .apply(&Selection::Set(Dimension::Cycle, "2020".to_string()));
        let res = resolve(&store, &state);
        assert_eq!(res.options.races, ["Pres-G".to_string(), "Sen-G".to_string()]);
        assert!(res.filtered.iter().all(|r| r.cycle == 2020));
    }

    #[test]
    fn own_selection_does_not_narrow_own_options() {
        let store = acme_store();
        let state = FilterState::new("Acme Polls".to_string())
            .apply(&Selection::Set(Dimension::Cycle, "2020".to_string()));
        let res = resolve(&store, &state);
        // Both cycles stay on offer so the user can revert.
        assert_eq!(res.options.cycles, [2020, 2022]);
    }

    #[test]
    fn pollster_switch_resets_downstream_selections() {
        let store = acme_store();
        let state = FilterState::new("Acme Polls".to_string())
            .apply(&Selection::Set(Dimension::Cycle, "2020".to_string()))
            .apply(&Selection::Set(Dimension::Race, "Pres-G".to_string()));
        let switched = state.apply(&Selection::Pollster("Bravo Research".to_string()));
        assert_eq!(switched, FilterState::new("Bravo Research".to_string()));
        let res = resolve(&store, &switched);
        assert_eq!(res.options.cycles, [2022]);
        assert_eq!(res.options.races, ["Sen-G".to_string()]);
        assert_eq!(res.filtered.len(), 1);
    }

    #[test]
    fn stale_selection_treated_as_unset() {
        let store = acme_store();
        // A cycle carried over from another pollster, no longer valid.
        let mut state = FilterState::new("Bravo Research".to_string());
        state.cycle = Some(2020);
        let res = resolve(&store, &state);
        assert_eq!(res.effective.cycle, None);
        assert_eq!(res.filtered.len(), 1);
    }

    #[test]
    fn zero_match_returns_wellformed_empties() {
        let store = acme_store();
        let state = FilterState::new("Zenith Surveys".to_string());
        let res = resolve(&store, &state);
        assert!(res.filtered.is_empty());
        assert_eq!(res.options, DimensionOptions::default());
        let summary = summarize(&res.filtered);
        assert_eq!(summary.poll_count, 0);
        assert_eq!(summary.question_count, 0);
        assert_eq!(project_series(&res.filtered).count(), 0);
    }

    #[test]
    fn filtered_is_subset_of_base_pollster_subset() {
        let store = acme_store();
        let state = FilterState::new("Acme Polls".to_string())
            .apply(&Selection::Set(Dimension::Location, "PA".to_string()));
        let res = resolve(&store, &state);
        assert!(!res.filtered.is_empty());
        assert!(res.filtered.iter().all(|r| r.pollster == "Acme Polls"));
        assert!(res.filtered.iter().all(|r| r.location == "PA"));
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        let store = acme_store();
        let state = FilterState::new("Acme Polls".to_string())
            .apply(&Selection::Set(Dimension::Cycle, "2020".to_string()))
            .apply(&Selection::Set(Dimension::Methodology, "IVR".to_string()));
        assert_eq!(resolve(&store, &state), resolve(&store, &state));
    }

    #[test]
    fn no_dead_end_option_is_ever_offered() {
        let store = acme_store();
        let state = FilterState::new("Acme Polls".to_string())
            .apply(&Selection::Set(Dimension::Cycle, "2020".to_string()));
        let res = resolve(&store, &state);
        for race in res.options.races.iter() {
            let narrowed = state.apply(&Selection::Set(Dimension::Race, race.clone()));
            assert!(
                !resolve(&store, &narrowed).filtered.is_empty(),
                "race option {:?} produced an empty result",
                race
            );
        }
        for method in res.options.methodologies.iter() {
            let narrowed = state.apply(&Selection::Set(Dimension::Methodology, method.clone()));
            assert!(
                !resolve(&store, &narrowed).filtered.is_empty(),
                "methodology option {:?} produced an empty result",
                method
            );
        }
    }

    #[test]
    fn option_sets_are_subsets_of_the_full_domain() {
        let store = acme_store();
        let state = FilterState::new("Acme Polls".to_string())
            .apply(&Selection::Set(Dimension::Cycle, "2020".to_string()));
        let res = resolve(&store, &state);
        assert!(res.options.cycles.iter().all(|c| store.cycles().contains(c)));
        assert!(res.options.races.iter().all(|r| store.races().contains(r)));
        assert!(res
            .options
            .locations
            .iter()
            .all(|l| store.locations().contains(l)));
        assert!(res
            .options
            .methodologies
            .iter()
            .all(|m| store.methodologies().contains(m)));
    }

    #[test]
    fn counts_are_distinct_entities_not_rows() {
        // One poll asking two questions: three rows, two polls, three questions.
        let (store, _) = StoreBuilder::new()
            .rating("Acme Polls")
            .poll("Acme Polls", 2020, "Pres-G", "US", "IVR", "2020-09-01")
            .ids(1, 11)
            .poll("Acme Polls", 2020, "Pres-G", "US", "IVR", "2020-09-01")
            .ids(1, 12)
            .poll("Acme Polls", 2020, "Sen-G", "US", "IVR", "2020-09-02")
            .ids(2, 21)
            .build()
            .unwrap();
        let res = resolve(&store, &FilterState::new("Acme Polls".to_string()));
        let summary = summarize(&res.filtered);
        assert_eq!(res.filtered.len(), 3);
        assert_eq!(summary.poll_count, 2);
        assert_eq!(summary.question_count, 3);
        assert!(summary.poll_count <= res.filtered.len());
        assert!(summary.question_count <= res.filtered.len());
    }

    #[test]
    fn series_roundtrip_is_two_rows_per_record() {
        let store = acme_store();
        let res = resolve(&store, &FilterState::new("Acme Polls".to_string()));
        let points: Vec<SeriesPoint> = project_series(&res.filtered).collect();
        assert_eq!(points.len(), 2 * res.filtered.len());
        // Restartable: a second pass yields the same sequence.
        let again: Vec<SeriesPoint> = project_series(&res.filtered).collect();
        assert_eq!(points, again);
    }

    #[test]
    fn series_preserves_order_and_carries_weight() {
        let (store, _) = StoreBuilder::new()
            .rating("Acme Polls")
            .poll("Acme Polls", 2020, "Pres-G", "US", "IVR", "2020-09-01")
            .margins(3.5, 1.0)
            .samplesize(800)
            .poll("Acme Polls", 2020, "Pres-G", "US", "IVR", "2020-10-01")
            .margins(-2.0, 0.5)
            .samplesize(450)
            .build()
            .unwrap();
        let res = resolve(&store, &FilterState::new("Acme Polls".to_string()));
        let points: Vec<SeriesPoint> = project_series(&res.filtered).collect();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].series, SeriesName::MarginPoll);
        assert_eq!(points[0].value, 3.5);
        assert_eq!(points[0].weight, 800);
        assert_eq!(points[1].series, SeriesName::MarginActual);
        assert_eq!(points[1].value, 1.0);
        assert!(points[0].date <= points[2].date);
        assert_eq!(points[3].value, 0.5);
        assert_eq!(points[3].weight, 450);
    }

    #[test]
    fn margin_diff_never_diverges_after_resolve() {
        let (store, _) = StoreBuilder::new()
            .rating("Acme Polls")
            .poll("Acme Polls", 2020, "Pres-G", "US", "IVR", "2020-09-01")
            .margins(4.25, -1.5)
            .build()
            .unwrap();
        let loaded = store.polls()[0].margin_diff;
        let res = resolve(&store, &FilterState::new("Acme Polls".to_string()));
        assert_eq!(res.filtered[0].margin_diff, loaded);
        assert_eq!(res.filtered[0].margin_diff, 4.25 - (-1.5));
    }

    #[test]
    fn rating_summary_projects_and_sources_bias_correctly() {
        let (store, _) = StoreBuilder::new()
            .rating("Acme Polls")
            .build()
            .unwrap();
        let summary = summarize_ratings(store.ratings(), "Acme Polls").unwrap();
        assert_eq!(summary.pollster, "Acme Polls");
        assert_eq!(summary.rating, store.ratings()[0].numeric_grade);
        // The bias column must come from bias_ppm, and must be populated.
        assert_eq!(summary.bias, store.ratings()[0].bias_ppm);
        assert!(summary.bias != 0.0);
    }

    #[test]
    fn missing_rating_row_is_a_recoverable_not_found() {
        let store = acme_store();
        let res = summarize_ratings(store.ratings(), "Zenith Surveys");
        assert_eq!(
            res.unwrap_err(),
            NotFoundError {
                pollster: "Zenith Surveys".to_string()
            }
        );
    }

    #[test]
    fn headline_text_form() {
        let summary = Summary {
            poll_count: 4,
            question_count: 7,
        };
        assert_eq!(
            summary.headline(),
            "Number of Polls: 4.   Number of Questions: 7"
        );
    }

    #[test]
    fn selection_events_parse_and_reject_unknown_dimensions() {
        assert_eq!(
            Selection::from_event("cycle", Some("2020")).unwrap(),
            Selection::Set(Dimension::Cycle, "2020".to_string())
        );
        assert_eq!(
            Selection::from_event("race", None).unwrap(),
            Selection::Unset(Dimension::Race)
        );
        assert_eq!(
            Selection::from_event("pollster", Some("Acme Polls")).unwrap(),
            Selection::Pollster("Acme Polls".to_string())
        );
        let err = Selection::from_event("altitude", Some("high")).unwrap_err();
        assert_eq!(err.name, "altitude");
    }

    #[test]
    fn unparseable_cycle_value_behaves_as_unset() {
        let store = acme_store();
        let state = FilterState::new("Acme Polls".to_string())
            .apply(&Selection::Set(Dimension::Cycle, "twenty-twenty".to_string()));
        assert_eq!(state.cycle, None);
        let res = resolve(&store, &state);
        assert_eq!(res.filtered.len(), 4);
    }
}
