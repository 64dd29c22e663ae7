//! MQTT topic filter matching

/// Filter segment matching exactly one topic level
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Filter segment matching the remaining topic levels, including none
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Level separator shared by topics and filters
const SEPARATOR: char = '/';

/// Returns true if `topic` matches the subscription `filter`.
///
/// `+` matches any single level (empty levels included) and `#` matches
/// every remaining level, so `sport/#` matches `sport` as well as
/// `sport/a/b`. A filter with `#` anywhere but the last level is malformed
/// and matches nothing. Literal levels compare byte-wise.
///
/// Pure and allocation free; safe to call from any thread.
pub fn matches(topic: &str, filter: &str) -> bool {
	let mut topic_levels = topic.split(SEPARATOR);
	let mut filter_levels = filter.split(SEPARATOR).peekable();

	while let Some(filter_level) = filter_levels.next() {
		if filter_level == MULTI_LEVEL_WILDCARD {
			return filter_levels.peek().is_none();
		}
		let Some(topic_level) = topic_levels.next() else {
			return false;
		};
		if filter_level != SINGLE_LEVEL_WILDCARD && filter_level != topic_level
		{
			return false;
		}
	}

	topic_levels.next().is_none()
}

/// Longest topic the MQTT wire format can carry
pub const MAX_TOPIC_LEN: usize = u16::MAX as usize;

/// Returns true if `topic` may be published to.
///
/// A topic name is non-empty, fits the wire length limit, and contains
/// neither wildcard nor NUL characters.
pub fn is_valid_topic_name(topic: &str) -> bool {
	!topic.is_empty()
		&& topic.len() <= MAX_TOPIC_LEN
		&& !topic.contains(['+', '#', '\0'])
}

/// Returns true if `filter` may be subscribed to.
///
/// Wildcards must take up a whole level, and `#` may only be the last
/// level.
pub fn is_valid_topic_filter(filter: &str) -> bool {
	if filter.is_empty() || filter.len() > MAX_TOPIC_LEN || filter.contains('\0')
	{
		return false;
	}
	let mut levels = filter.split(SEPARATOR).peekable();
	while let Some(level) = levels.next() {
		let is_last = levels.peek().is_none();
		match level {
			| SINGLE_LEVEL_WILDCARD => {}
			| MULTI_LEVEL_WILDCARD if is_last => {}
			| _ if level.contains(['+', '#']) => return false,
			| _ => {}
		}
	}
	true
}
