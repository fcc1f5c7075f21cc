pub mod date;
pub mod fuzzy;

pub use date::{format_date, format_datetime, parse_date_expr};
pub use fuzzy::{did_you_mean, levenshtein_distance};
