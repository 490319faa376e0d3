#![forbid(unsafe_code)]

pub mod cache;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod doctor;
pub mod error;
pub mod extract;
pub mod files;
pub mod init;
pub mod locale;
pub mod locations;
pub mod msgmerge;
pub mod process;
pub mod util;
pub mod xgettext;

pub use cli::run_from_env;
pub use error::{GettextError, Result};
