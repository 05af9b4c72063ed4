pub mod catalog;
pub mod core;
pub mod grades;
pub mod schedules;
