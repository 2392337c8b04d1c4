// Primitives for reading the two CSV tables.

use std::io::Read;

use log::debug;
use snafu::prelude::*;

use poll_explorer::{DataLoadError, PollSource, RatingSource};

use crate::explorer::{CsvOpenSnafu, CsvReadSnafu, ExplorerResult, LoadSnafu};

pub fn read_polls_csv(path: &str) -> ExplorerResult<Vec<PollSource>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    read_polls(rdr, path)
}

pub fn read_ratings_csv(path: &str) -> ExplorerResult<Vec<RatingSource>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    read_ratings(rdr, path)
}

pub(crate) fn read_polls<R: Read>(
    mut rdr: csv::Reader<R>,
    path: &str,
) -> ExplorerResult<Vec<PollSource>> {
    let headers = rdr.headers().context(CsvReadSnafu { path })?.clone();
    let c_poll_id = column(&headers, path, "poll_id")?;
    let c_question_id = column(&headers, path, "question_id")?;
    let c_pollster = column(&headers, path, "pollster")?;
    let c_cycle = column(&headers, path, "cycle")?;
    let c_race = column(&headers, path, "race")?;
    let c_location = column(&headers, path, "location")?;
    let c_methodology = column(&headers, path, "methodology")?;
    let c_margin_poll = column(&headers, path, "margin_poll")?;
    let c_margin_actual = column(&headers, path, "margin_actual")?;
    let c_samplesize = column(&headers, path, "samplesize")?;
    let c_polldate = column(&headers, path, "polldate")?;

    let mut res: Vec<PollSource> = Vec::new();
    for record in rdr.records() {
        let record = record.context(CsvReadSnafu { path })?;
        res.push(PollSource {
            poll_id: num(cell(&record, c_poll_id)),
            question_id: num(cell(&record, c_question_id)),
            pollster: cell(&record, c_pollster).to_string(),
            cycle: num(cell(&record, c_cycle)),
            race: cell(&record, c_race).to_string(),
            location: cell(&record, c_location).to_string(),
            methodology: opt_str(cell(&record, c_methodology)),
            margin_poll: num(cell(&record, c_margin_poll)),
            margin_actual: num(cell(&record, c_margin_actual)),
            samplesize: num(cell(&record, c_samplesize)),
            polldate: cell(&record, c_polldate).to_string(),
        });
    }
    debug!("read_polls: {} rows read from {}", res.len(), path);
    Ok(res)
}

pub(crate) fn read_ratings<R: Read>(
    mut rdr: csv::Reader<R>,
    path: &str,
) -> ExplorerResult<Vec<RatingSource>> {
    let headers = rdr.headers().context(CsvReadSnafu { path })?.clone();
    let c_pollster = column(&headers, path, "pollster")?;
    let c_rank = column(&headers, path, "rank")?;
    let c_numeric_grade = column(&headers, path, "numeric_grade")?;
    // The published export spells the pollscore column in upper case.
    let c_pollscore = column(&headers, path, "POLLSCORE")?;
    let c_transparency = column(&headers, path, "wtd_avg_transparency")?;
    let c_number_polls = column(&headers, path, "number_polls_pollster_total")?;
    let c_error_ppm = column(&headers, path, "error_ppm")?;
    let c_bias_ppm = column(&headers, path, "bias_ppm")?;

    let mut res: Vec<RatingSource> = Vec::new();
    for record in rdr.records() {
        let record = record.context(CsvReadSnafu { path })?;
        res.push(RatingSource {
            pollster: cell(&record, c_pollster).to_string(),
            rank: num(cell(&record, c_rank)),
            numeric_grade: num(cell(&record, c_numeric_grade)),
            pollscore: num(cell(&record, c_pollscore)),
            wtd_avg_transparency: num(cell(&record, c_transparency)),
            number_polls_pollster_total: num(cell(&record, c_number_polls)),
            error_ppm: num(cell(&record, c_error_ppm)),
            bias_ppm: num(cell(&record, c_bias_ppm)),
        });
    }
    debug!("read_ratings: {} rows read from {}", res.len(), path);
    Ok(res)
}

fn column(headers: &csv::StringRecord, table: &str, name: &str) -> ExplorerResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| DataLoadError::MissingColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
        .context(LoadSnafu {})
}

fn cell<'a>(record: &'a csv::StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

fn opt_str(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn num<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() {
        None
    } else {
        s.parse::<T>().ok()
    }
}
