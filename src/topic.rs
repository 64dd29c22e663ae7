//! Topic handling module
//!
//! MQTT topic validation and filter matching, used by the live connection,
//! the mock connection and
//! [`BrokerConnection::is_topic_sub`](crate::BrokerConnection::is_topic_sub).

pub mod topic_matcher;

#[cfg(test)]
mod topic_matcher_tests;

pub use topic_matcher::{
	is_valid_topic_filter, is_valid_topic_name, matches, MAX_TOPIC_LEN,
	MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD,
};
