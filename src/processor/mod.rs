pub mod date_normalizer;
pub mod duration_parser;
pub mod genre_encoder;
pub mod record_flattener;
pub mod text_cleaner;

pub use date_normalizer::*;
pub use duration_parser::*;
pub use genre_encoder::*;
pub use record_flattener::*;
pub use text_cleaner::*;
