//! Strongly-typed data source name.

use crate::newtype_string::define_identifier;

define_identifier! {
    /// Name of an external collection source, e.g. `sbd` or `action_network`.
    pub struct SourceName("source");
}

#[cfg(test)]
#[path = "source_name_test.rs"]
mod tests;
