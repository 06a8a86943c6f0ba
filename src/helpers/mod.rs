mod load_dotenv;
mod time;

pub mod json_path;

pub use load_dotenv::load_dotenv;
pub use time::{now_iso, parse_date, parse_ts, parse_ts_or_now, to_iso};
