use super::topic_matcher::{is_valid_topic_filter, is_valid_topic_name, matches};

// Helper asserting a whole table of (topic, filter, expected) cases
fn check(cases: &[(&str, &str, bool)]) {
	for (topic, filter, expected) in cases {
		assert_eq!(
			matches(topic, filter),
			*expected,
			"matches({:?}, {:?}) should be {}",
			topic,
			filter,
			expected
		);
	}
}

#[test]
fn test_exact_matches() {
	check(&[
		("sensors/temperature", "sensors/temperature", true),
		("sensors/temperature", "sensors/humidity", false),
		("sensors", "sensors/temperature", false),
		("sensors/temperature", "sensors", false),
		("a", "a", true),
		("", "", true),
	]);
}

#[test]
fn test_matching_is_case_sensitive() {
	check(&[
		("Sensors/Temp", "sensors/temp", false),
		("sensors/temp", "sensors/TEMP", false),
	]);
}

#[test]
fn test_single_level_wildcard() {
	check(&[
		("a/b", "a/+", true),
		("a/b/c", "a/+", false),
		("sport", "sport/+", false),
		("sport/a/b", "sport/+", false),
		("sport/", "sport/+", true),
		("a/x/c", "a/+/c", true),
		("a/x/d", "a/+/c", false),
		("x", "+", true),
		("x/y", "+/+", true),
		("x/y", "+", false),
	]);
}

#[test]
fn test_multi_level_wildcard() {
	check(&[
		("sport", "sport/#", true),
		("sport/a", "sport/#", true),
		("sport/a/b/c", "sport/#", true),
		("sports", "sport/#", false),
		("other/a", "sport/#", false),
		("a/b/c", "a/+/#", true),
		("a", "a/+/#", false),
	]);
}

#[test]
fn test_hash_alone_matches_everything() {
	check(&[
		("a", "#", true),
		("a/b/c", "#", true),
		("", "#", true),
		("/leading", "#", true),
	]);
}

#[test]
fn test_hash_not_last_never_matches() {
	check(&[
		("a/b", "#/b", false),
		("a/b/c", "a/#/c", false),
		("a", "#/#", false),
	]);
}

#[test]
fn test_topic_matches_itself() {
	for topic in ["a", "a/b", "a/b/c", "home/kitchen/light", "/x", "x/"] {
		assert!(matches(topic, topic), "{topic} should match itself");
	}
}

#[test]
fn test_topic_names_reject_wildcards() {
	for topic in ["a", "a/b", "/x", "x/", "home/kitchen light"] {
		assert!(is_valid_topic_name(topic), "{topic} should be valid");
	}
	for topic in ["", "a/+", "a/#", "a+b", "nul\0"] {
		assert!(!is_valid_topic_name(topic), "{topic:?} should be invalid");
	}
	assert!(!is_valid_topic_name(&"x".repeat(70_000)));
}

#[test]
fn test_filters_need_whole_level_wildcards() {
	for filter in ["#", "+", "a/+/c", "a/#", "+/+/#", "a/b"] {
		assert!(is_valid_topic_filter(filter), "{filter} should be valid");
	}
	for filter in ["", "a/#/c", "a+/b", "a/b#", "#/a", "a/\0"] {
		assert!(!is_valid_topic_filter(filter), "{filter:?} should be invalid");
	}
}
