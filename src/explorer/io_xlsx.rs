// Reading the same two tables from Excel workbooks. The first worksheet is
// used; the first row must carry the column names.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::debug;
use snafu::prelude::*;

use poll_explorer::{DataLoadError, PollSource, RatingSource};

use crate::explorer::{EmptyExcelSnafu, ExplorerResult, LoadSnafu, OpeningExcelSnafu};

pub fn read_polls_xlsx(path: &str) -> ExplorerResult<Vec<PollSource>> {
    let wrange = get_range(path)?;
    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyExcelSnafu { path })?;
    debug!("read_polls_xlsx: header: {:?}", header);

    let c_poll_id = column(header, path, "poll_id")?;
    let c_question_id = column(header, path, "question_id")?;
    let c_pollster = column(header, path, "pollster")?;
    let c_cycle = column(header, path, "cycle")?;
    let c_race = column(header, path, "race")?;
    let c_location = column(header, path, "location")?;
    let c_methodology = column(header, path, "methodology")?;
    let c_margin_poll = column(header, path, "margin_poll")?;
    let c_margin_actual = column(header, path, "margin_actual")?;
    let c_samplesize = column(header, path, "samplesize")?;
    let c_polldate = column(header, path, "polldate")?;

    let mut res: Vec<PollSource> = Vec::new();
    for row in rows {
        res.push(PollSource {
            poll_id: cell_u64(row.get(c_poll_id)),
            question_id: cell_u64(row.get(c_question_id)),
            pollster: cell_str(row.get(c_pollster)),
            cycle: cell_i32(row.get(c_cycle)),
            race: cell_str(row.get(c_race)),
            location: cell_str(row.get(c_location)),
            methodology: cell_opt_str(row.get(c_methodology)),
            margin_poll: cell_f64(row.get(c_margin_poll)),
            margin_actual: cell_f64(row.get(c_margin_actual)),
            samplesize: cell_i64(row.get(c_samplesize)),
            polldate: cell_str(row.get(c_polldate)),
        });
    }
    debug!("read_polls_xlsx: {} rows read from {}", res.len(), path);
    Ok(res)
}

pub fn read_ratings_xlsx(path: &str) -> ExplorerResult<Vec<RatingSource>> {
    let wrange = get_range(path)?;
    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyExcelSnafu { path })?;
    debug!("read_ratings_xlsx: header: {:?}", header);

    let c_pollster = column(header, path, "pollster")?;
    let c_rank = column(header, path, "rank")?;
    let c_numeric_grade = column(header, path, "numeric_grade")?;
    let c_pollscore = column(header, path, "POLLSCORE")?;
    let c_transparency = column(header, path, "wtd_avg_transparency")?;
    let c_number_polls = column(header, path, "number_polls_pollster_total")?;
    let c_error_ppm = column(header, path, "error_ppm")?;
    let c_bias_ppm = column(header, path, "bias_ppm")?;

    let mut res: Vec<RatingSource> = Vec::new();
    for row in rows {
        res.push(RatingSource {
            pollster: cell_str(row.get(c_pollster)),
            rank: cell_u64(row.get(c_rank)).map(|v| v as u32),
            numeric_grade: cell_f64(row.get(c_numeric_grade)),
            pollscore: cell_f64(row.get(c_pollscore)),
            wtd_avg_transparency: cell_f64(row.get(c_transparency)),
            number_polls_pollster_total: cell_u64(row.get(c_number_polls)),
            error_ppm: cell_f64(row.get(c_error_ppm)),
            bias_ppm: cell_f64(row.get(c_bias_ppm)),
        });
    }
    debug!("read_ratings_xlsx: {} rows read from {}", res.len(), path);
    Ok(res)
}

fn get_range(path: &str) -> ExplorerResult<calamine::Range<DataType>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path })?
        .context(OpeningExcelSnafu { path })?;
    Ok(wrange)
}

fn column(header: &[DataType], table: &str, name: &str) -> ExplorerResult<usize> {
    header
        .iter()
        .position(|c| matches!(c, DataType::String(s) if s.trim() == name))
        .ok_or_else(|| DataLoadError::MissingColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
        .context(LoadSnafu {})
}

fn cell_str(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(s)) => s.trim().to_string(),
        Some(DataType::Int(i)) => i.to_string(),
        _ => String::new(),
    }
}

fn cell_opt_str(cell: Option<&DataType>) -> Option<String> {
    let s = cell_str(cell);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn cell_f64(cell: Option<&DataType>) -> Option<f64> {
    match cell {
        Some(DataType::Float(f)) => Some(*f),
        Some(DataType::Int(i)) => Some(*i as f64),
        Some(DataType::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn cell_i64(cell: Option<&DataType>) -> Option<i64> {
    match cell {
        Some(DataType::Int(i)) => Some(*i),
        Some(DataType::Float(f)) => Some(*f as i64),
        Some(DataType::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn cell_i32(cell: Option<&DataType>) -> Option<i32> {
    cell_i64(cell).map(|v| v as i32)
}

fn cell_u64(cell: Option<&DataType>) -> Option<u64> {
    match cell_i64(cell) {
        Some(v) if v >= 0 => Some(v as u64),
        _ => None,
    }
}
