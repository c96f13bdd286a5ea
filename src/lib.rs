//! Reader and writer for OpenWrt's UCI configuration files.
//!
//! A UCI file is a list of typed sections holding single-valued options and list options:
//!
//! ```text
//! config interface 'lan'
//!     option proto 'static'
//!     list dns '1.1.1.1'
//!     list dns '9.9.9.9'
//!
//! config zone
//!     option name 'wan'
//! ```
//!
//! Sections without a name are addressed by `@type[index]` selectors; `@zone[0]` above, or
//! `@zone[-1]` for the last one.
//!
//! [`parse`] turns text into a [`Config`]. [`Tree`] manages a directory of such files, loading
//! them on demand and writing changes back atomically on [`Tree::commit`]:
//!
//! ```no_run
//! let tree = uci::Tree::default();
//! tree.set("network", "lan", "ipaddr", ["10.0.0.1"])?;
//! tree.commit()?;
//! # Ok::<(), uci::Error>(())
//! ```

#![warn(
    clippy::correctness,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::style,
    clippy::pedantic
)]

mod config;
mod error;
mod json;
pub mod lexer;
mod parser;
pub mod scanner;
mod section;
mod storage;
mod tree;
mod util;

pub use config::Config;
pub use error::{Error, LexError, ParseError, Phase};
pub use parser::{Parser, parse};
pub use section::{ConfigOption, OptionKind, Section};
pub use storage::{DEFAULT_MODE, DirStorage, Storage};
pub use tree::{DEFAULT_TREE_PATH, Tree};
pub use util::{SelectorError, parse_bool, parse_selector};
