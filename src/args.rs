use clap::Parser;

/// This is an exploration program for historical election polls and pollster ratings.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The CSV or Excel file containing the pollster ratings table.
    #[clap(short, long, value_parser)]
    pub ratings: String,

    /// (file path) The CSV or Excel file containing the individual poll records.
    #[clap(short, long, value_parser)]
    pub polls: String,

    /// The pollster to explore. If not specified, the first pollster of the ratings
    /// table is selected, like the dashboard this tool descends from.
    #[clap(long, value_parser)]
    pub pollster: Option<String>,

    /// (repeatable) A selection event in `dimension=value` form. Dimensions are
    /// `cycle`, `race`, `location` and `methodology`; `dimension=` clears one.
    /// Events are applied in the order given, after the pollster selection.
    #[clap(short, long, value_parser)]
    pub select: Vec<String>,

    /// List the pollsters available in the ratings table and exit.
    #[clap(long, takes_value = false)]
    pub list_pollsters: bool,

    /// (file path, 'stdout' or empty) If specified, the summary of the session will be
    /// written in JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference session summary in JSON format. If provided, pollscope
    /// will check that the produced summary matches the reference.
    #[clap(long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
