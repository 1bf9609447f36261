//! CLI command implementations

pub(crate) mod alerts;
pub(crate) mod common;
pub(crate) mod config;
pub(crate) mod deadtuples;
pub(crate) mod gaps;
pub(crate) mod health;
pub(crate) mod identity;
pub(crate) mod init;
pub(crate) mod jobs;
pub(crate) mod meta;
pub(crate) mod quality;
pub(crate) mod run;
pub(crate) mod serve;
