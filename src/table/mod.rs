pub mod convert;
pub mod raw_table;
pub mod reader;
pub mod utils;

pub use convert::coerce_cell;
pub use raw_table::{Cell, RawTable};
pub use reader::{CsvWorkbookReader, TabularReader};
