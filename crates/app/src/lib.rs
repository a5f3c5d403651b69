#![deny(unsafe_code)]

pub mod cli;
pub mod command;
pub mod error;
pub mod settings;
pub mod shell;
pub mod terminal;

pub use error::{AppError, AppResult};
