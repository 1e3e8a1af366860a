pub mod export;
pub mod health;
pub mod import;
pub mod search;

pub use export::run_export;
pub use health::run_health;
pub use import::run_import;
pub use search::run_search;
