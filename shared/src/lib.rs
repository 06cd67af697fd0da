mod humanize;
mod item;

#[cfg(feature = "github")]
pub mod github;

pub use humanize::*;
pub use item::*;

pub type GithubHandle = String;
pub type LabelName = String;
