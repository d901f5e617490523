pub mod calendar;
pub mod menu;
pub mod summary;
pub mod today;
