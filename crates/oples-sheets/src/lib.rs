pub mod errors;
pub mod model;
mod reader;

pub use errors::SheetError;
pub use model::{Cell, Table};
pub use reader::{read_table_from_bytes, read_table_from_path};
