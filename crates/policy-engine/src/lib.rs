pub mod engine;
pub mod table;

pub use engine::PolicyEngine;
pub use table::PolicyTable;
