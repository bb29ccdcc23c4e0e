mod assemble;
mod repo;
mod trace;

pub use assemble::{AssembleArgs, cmd_assemble};
pub use repo::{cmd_repo_list, cmd_repo_search, cmd_repo_update};
pub use trace::cmd_trace;
