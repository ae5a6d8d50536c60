pub mod when;

pub use when::{WhenError, format_local, parse_when};
