pub mod control;
pub mod health;
pub mod reminders;
pub mod ui;
