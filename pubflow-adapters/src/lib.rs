//! External collaborators for pubflow: the GitHub forge client, the yarn
//! workspace adapter, and the npm package tool.

pub mod github;
pub mod npm;
mod process;
pub mod yarn;

pub use github::GithubClient;
pub use npm::NpmTool;
pub use yarn::YarnWorkspaces;
