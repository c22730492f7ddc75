pub mod application;
pub mod process;
pub mod token;

pub use application::{ApplicationDefinition, Exec};
pub use process::{ApplicationView, LiveProcess, ProcessTreeNode};
pub use token::{Account, Token};
