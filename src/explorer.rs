use log::{info, warn};

use poll_explorer::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;

pub mod io_csv;
pub mod io_xlsx;

#[derive(Debug, Snafu)]
pub enum ExplorerError {
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },

    #[snafu(display("Error reading a row of {path}"))]
    CsvRead { source: csv::Error, path: String },

    #[snafu(display("Error opening workbook {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },

    #[snafu(display("Workbook {path} has no worksheet"))]
    EmptyExcel { path: String },

    #[snafu(display("Could not load the dataset"))]
    Load { source: DataLoadError },

    #[snafu(display("Invalid selection {selection:?}"))]
    BadSelection {
        source: InvalidDimensionError,
        selection: String,
    },

    #[snafu(display(""))]
    OpeningJson { source: std::io::Error },

    #[snafu(display(""))]
    ParsingJson { source: serde_json::Error },

    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ExplorerResult<T> = Result<T, ExplorerError>;

/// The rating summary row under its presentation labels.
///
/// Optional fields stay `null` in the placeholder row used when the
/// selected pollster has no ratings entry.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RatingRow {
    #[serde(rename = "Rank")]
    pub rank: Option<u32>,
    #[serde(rename = "Pollster")]
    pub pollster: String,
    #[serde(rename = "Rating")]
    pub rating: Option<f64>,
    #[serde(rename = "Pollscore")]
    pub pollscore: Option<f64>,
    #[serde(rename = "Transparency")]
    pub transparency: Option<f64>,
    #[serde(rename = "Number Polls")]
    pub number_polls: Option<u64>,
    #[serde(rename = "+/- Error")]
    pub error: Option<f64>,
    #[serde(rename = "+/- Bias")]
    pub bias: Option<f64>,
}

impl RatingRow {
    fn from_summary(s: RatingSummary) -> RatingRow {
        RatingRow {
            rank: Some(s.rank),
            pollster: s.pollster,
            rating: Some(s.rating),
            pollscore: Some(s.pollscore),
            transparency: Some(s.transparency),
            number_polls: Some(s.number_polls),
            error: Some(s.error),
            bias: Some(s.bias),
        }
    }

    fn placeholder(pollster: &str) -> RatingRow {
        RatingRow {
            rank: None,
            pollster: pollster.to_string(),
            rating: None,
            pollscore: None,
            transparency: None,
            number_polls: None,
            error: None,
            bias: None,
        }
    }
}

pub fn run_explorer(args: &Args) -> ExplorerResult<()> {
    let ratings_src = read_ratings_table(&args.ratings)?;
    let polls_src = read_polls_table(&args.polls)?;
    let (store, report) = DatasetStore::load(ratings_src, polls_src).context(LoadSnafu {})?;
    info!(
        "run_explorer: {} rating rows, {} poll rows kept ({} excluded)",
        store.ratings().len(),
        report.polls_kept,
        report.polls_excluded()
    );

    if args.list_pollsters {
        for p in store.pollsters() {
            println!("{}", p);
        }
        return Ok(());
    }

    let pollster = match args.pollster.clone() {
        Some(p) => p,
        // The load guarantees at least one ratings row.
        None => store
            .pollsters()
            .first()
            .cloned()
            .whatever_context("No pollster available in the ratings table")?,
    };

    let mut state = FilterState::new(pollster);
    for raw in args.select.iter() {
        let selection = parse_selection(raw)?;
        state = state.apply(&selection);
    }
    info!("run_explorer: state: {:?}", state);

    let resolution = resolve(&store, &state);
    let summary = summarize(&resolution.filtered);
    let rating_row = match summarize_ratings(store.ratings(), &state.pollster) {
        Ok(s) => RatingRow::from_summary(s),
        Err(e) => {
            warn!("run_explorer: {}; showing a placeholder rating summary", e);
            RatingRow::placeholder(&state.pollster)
        }
    };
    let series: Vec<SeriesPoint> = project_series(&resolution.filtered).collect();

    render_text(&resolution, &summary, &rating_row);

    let summary_js = build_summary_js(&resolution, &summary, &rating_row, &series, &report);
    let pretty_js = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;

    match args.out.as_deref() {
        Some("stdout") => println!("{}", pretty_js),
        Some(path) => fs::write(path, &pretty_js).context(WritingSummarySnafu { path })?,
        None => {}
    }

    // The reference summary, if provided for comparison
    if let Some(reference_path) = args.reference.clone() {
        let reference = read_summary(reference_path)?;
        let pretty_js_ref = serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_js_ref != pretty_js {
            warn!("Found differences with the reference summary");
            print_diff(pretty_js_ref.as_str(), pretty_js.as_str(), "\n");
            whatever!("Difference detected between the session summary and the reference summary");
        }
    }

    Ok(())
}

fn parse_selection(raw: &str) -> ExplorerResult<Selection> {
    let (dimension, value) = match raw.split_once('=') {
        Some((d, v)) => (d.trim(), v.trim()),
        None => {
            whatever!("Selection {:?} is not in dimension=value form", raw)
        }
    };
    let value = if value.is_empty() { None } else { Some(value) };
    Selection::from_event(dimension, value).context(BadSelectionSnafu { selection: raw })
}

fn read_ratings_table(path: &str) -> ExplorerResult<Vec<RatingSource>> {
    info!("Attempting to read ratings table {:?}", path);
    if is_xlsx(path) {
        io_xlsx::read_ratings_xlsx(path)
    } else {
        io_csv::read_ratings_csv(path)
    }
}

fn read_polls_table(path: &str) -> ExplorerResult<Vec<PollSource>> {
    info!("Attempting to read poll table {:?}", path);
    if is_xlsx(path) {
        io_xlsx::read_polls_xlsx(path)
    } else {
        io_csv::read_polls_csv(path)
    }
}

fn is_xlsx(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map(|e| e.eq_ignore_ascii_case("xlsx"))
        .unwrap_or(false)
}

fn render_text(resolution: &Resolution, summary: &Summary, rating_row: &RatingRow) {
    println!("Pollster: {}", rating_row.pollster);
    println!("  Rank:         {}", fmt_opt(&rating_row.rank));
    println!("  Rating:       {}", fmt_opt(&rating_row.rating));
    println!("  Pollscore:    {}", fmt_opt(&rating_row.pollscore));
    println!("  Transparency: {}", fmt_opt(&rating_row.transparency));
    println!("  Number Polls: {}", fmt_opt(&rating_row.number_polls));
    println!("  +/- Error:    {}", fmt_opt(&rating_row.error));
    println!("  +/- Bias:     {}", fmt_opt(&rating_row.bias));
    println!();
    println!("{}", summary.headline());
    println!();
    let cycles: Vec<String> = resolution
        .options
        .cycles
        .iter()
        .map(|c| c.to_string())
        .collect();
    println!("Cycle options:       {}", cycles.join(", "));
    println!("Race options:        {}", resolution.options.races.join(", "));
    println!("Location options:    {}", resolution.options.locations.join(", "));
    println!(
        "Methodology options: {}",
        resolution.options.methodologies.join(", ")
    );
}

fn fmt_opt<T: std::fmt::Display>(v: &Option<T>) -> String {
    match v {
        Some(x) => x.to_string(),
        None => "-".to_string(),
    }
}

fn build_summary_js(
    resolution: &Resolution,
    summary: &Summary,
    rating_row: &RatingRow,
    series: &[SeriesPoint],
    report: &LoadReport,
) -> JSValue {
    let effective = &resolution.effective;
    let series_js: Vec<JSValue> = series
        .iter()
        .map(|p| {
            json!({
                "date": p.date.to_string(),
                "seriesName": p.series.as_str(),
                "value": p.value,
                "weight": p.weight,
            })
        })
        .collect();
    json!({
        "selection": {
            "pollster": effective.pollster,
            "cycle": effective.cycle,
            "race": effective.race,
            "location": effective.location,
            "methodology": effective.methodology,
        },
        "rating": rating_row,
        "counts": {
            "polls": summary.poll_count,
            "questions": summary.question_count,
        },
        "headline": summary.headline(),
        "options": {
            "cycle": resolution.options.cycles,
            "race": resolution.options.races,
            "location": resolution.options.locations,
            "methodology": resolution.options.methodologies,
        },
        "series": series_js,
        "load": {
            "pollsSeen": report.polls_seen,
            "pollsKept": report.polls_kept,
            "excludedBadDate": report.excluded_bad_date,
            "excludedBadSamplesize": report.excluded_bad_samplesize,
            "excludedMissingField": report.excluded_missing_field,
            "ratingsSeen": report.ratings_seen,
            "ratingsKept": report.ratings_kept,
        },
    })
}

pub fn read_summary(path: String) -> ExplorerResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATINGS_CSV: &str = "\
pollster,rank,numeric_grade,POLLSCORE,wtd_avg_transparency,number_polls_pollster_total,error_ppm,bias_ppm
Acme Polls,1,2.9,-1.1,8.0,450,4.2,0.7
Bravo Research,2,2.1,-0.4,6.5,120,5.0,1.3
";

    const POLLS_CSV: &str = "\
poll_id,question_id,pollster,cycle,race,location,methodology,margin_poll,margin_actual,samplesize,polldate
1,10,Acme Polls,2020,Pres-G,US,IVR,3.5,1.0,800,2020-09-01
2,20,Acme Polls,2020,Pres-G,PA,,0.5,1.5,600,10/1/20
3,30,Acme Polls,2022,Gov-G,WI,Online Panel,-2.0,-4.0,500,2022-10-01
4,40,Orphan Org,2022,Sen-G,GA,Live Phone,1.0,2.0,450,2022-09-15
";

    fn load_fixture() -> (DatasetStore, LoadReport) {
        let ratings = io_csv::read_ratings(
            csv::ReaderBuilder::new().from_reader(RATINGS_CSV.as_bytes()),
            "ratings.csv",
        )
        .unwrap();
        let polls = io_csv::read_polls(
            csv::ReaderBuilder::new().from_reader(POLLS_CSV.as_bytes()),
            "polls.csv",
        )
        .unwrap();
        DatasetStore::load(ratings, polls).unwrap()
    }

    #[test]
    fn csv_tables_load_and_normalize() {
        let (store, report) = load_fixture();
        assert_eq!(report.polls_kept, 4);
        assert_eq!(store.ratings().len(), 2);
        // Row 2 has an empty methodology cell and a short-form date.
        let row = store.polls().iter().find(|r| r.poll_id == 2).unwrap();
        assert_eq!(row.methodology, UNKNOWN_METHOD);
        assert_eq!(row.year, 2020);
    }

    #[test]
    fn missing_column_is_a_load_error() {
        let truncated = "\
poll_id,question_id,pollster,cycle,race,location,margin_poll,margin_actual,samplesize,polldate
1,10,Acme Polls,2020,Pres-G,US,3.5,1.0,800,2020-09-01
";
        let res = io_csv::read_polls(
            csv::ReaderBuilder::new().from_reader(truncated.as_bytes()),
            "polls.csv",
        );
        match res {
            Err(ExplorerError::Load {
                source: DataLoadError::MissingColumn { column, .. },
            }) => assert_eq!(column, "methodology"),
            x => panic!("expected a missing-column error, got {:?}", x),
        }
    }

    #[test]
    fn rating_row_serializes_under_presentation_labels() {
        let (store, _) = load_fixture();
        let row =
            RatingRow::from_summary(summarize_ratings(store.ratings(), "Acme Polls").unwrap());
        let js = serde_json::to_value(&row).unwrap();
        assert_eq!(js["Rank"], json!(1));
        assert_eq!(js["Rating"], json!(2.9));
        assert_eq!(js["Number Polls"], json!(450));
        // Regression: the bias column must be populated from bias_ppm.
        assert_eq!(js["+/- Bias"], json!(0.7));
    }

    #[test]
    fn unrated_pollster_degrades_to_placeholder_and_still_projects() {
        let (store, report) = load_fixture();
        let state = FilterState::new("Orphan Org".to_string());
        let resolution = resolve(&store, &state);
        let summary = summarize(&resolution.filtered);
        let rating_row = match summarize_ratings(store.ratings(), &state.pollster) {
            Ok(s) => RatingRow::from_summary(s),
            Err(_) => RatingRow::placeholder(&state.pollster),
        };
        assert_eq!(rating_row.bias, None);
        let series: Vec<SeriesPoint> = project_series(&resolution.filtered).collect();
        assert_eq!(series.len(), 2);
        let js = build_summary_js(&resolution, &summary, &rating_row, &series, &report);
        assert_eq!(js["rating"]["+/- Bias"], JSValue::Null);
        assert_eq!(js["counts"]["polls"], json!(1));
    }

    #[test]
    fn selection_parsing_rejects_malformed_events() {
        assert!(matches!(
            parse_selection("cycle=2020").unwrap(),
            Selection::Set(Dimension::Cycle, _)
        ));
        assert_eq!(
            parse_selection("race=").unwrap(),
            Selection::Unset(Dimension::Race)
        );
        assert!(matches!(
            parse_selection("cycle2020"),
            Err(ExplorerError::Whatever { .. })
        ));
        assert!(matches!(
            parse_selection("altitude=high"),
            Err(ExplorerError::BadSelection { .. })
        ));
    }

    #[test]
    fn summary_json_carries_the_session_outputs() {
        let (store, report) = load_fixture();
        let state = FilterState::new("Acme Polls".to_string())
            .apply(&Selection::Set(Dimension::Cycle, "2020".to_string()));
        let resolution = resolve(&store, &state);
        let summary = summarize(&resolution.filtered);
        let rating_row =
            RatingRow::from_summary(summarize_ratings(store.ratings(), "Acme Polls").unwrap());
        let series: Vec<SeriesPoint> = project_series(&resolution.filtered).collect();
        let js = build_summary_js(&resolution, &summary, &rating_row, &series, &report);

        assert_eq!(js["selection"]["pollster"], json!("Acme Polls"));
        assert_eq!(js["selection"]["cycle"], json!(2020));
        assert_eq!(js["counts"]["polls"], json!(2));
        assert_eq!(js["counts"]["questions"], json!(2));
        assert_eq!(js["options"]["cycle"], json!([2020, 2022]));
        assert_eq!(js["series"].as_array().unwrap().len(), 4);
        assert_eq!(js["series"][0]["seriesName"], json!("margin_poll"));
        assert_eq!(js["series"][0]["date"], json!("2020-09-01"));
        assert_eq!(js["load"]["pollsKept"], json!(4));
    }
}
