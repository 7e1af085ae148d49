pub mod format;
pub mod scanner;
pub mod tags;
