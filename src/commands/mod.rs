pub(crate) mod completions;
pub(crate) mod config;
pub(crate) mod install;
pub(crate) mod serve;
