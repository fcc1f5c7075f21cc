pub mod evaluator;
pub mod parser;

pub use evaluator::{filter_items, sort_items, FilterExpr, Filterable, SortKey};
pub use parser::{parse_filter, ComparisonOp, FilterTerm};
