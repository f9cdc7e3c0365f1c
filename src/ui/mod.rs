pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    banner, error, header, info, label, muted, record_line, relation_map, section, success, warn,
};
pub use progress::Spinner;
pub use table::{records_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
