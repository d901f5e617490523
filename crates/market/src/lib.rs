pub mod aggregate;
pub mod analyzer;
pub mod calendar;
pub mod indicator;
pub mod merge;
pub mod scope;
pub mod slot;
pub mod ticker;
