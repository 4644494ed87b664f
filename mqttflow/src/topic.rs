//! Topic name/filter validation and wildcard subscription matching.

use crate::error::MqttError;
use crate::Result;

/// Longest topic name or filter accepted, in UTF-8 bytes.
pub const MAX_TOPIC_LEN: usize = 65_536;

const SINGLE_WILDCARD: &str = "+";
const MULTI_WILDCARD: &str = "#";

/// Validates topic names/filters and evaluates wildcard subscription matches.
///
/// `$`-prefixed first levels denote system topics and are never matched by a
/// leading wildcard level.
#[derive(Debug, Clone, Copy)]
pub struct TopicEvaluator {
    support_wildcards: bool,
}

impl Default for TopicEvaluator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TopicEvaluator {
    pub fn new(support_wildcards: bool) -> Self {
        Self { support_wildcards }
    }

    /// A topic name is non-empty, within the length limit and wildcard-free.
    #[inline]
    pub fn is_valid_topic_name(&self, name: &str) -> bool {
        !name.is_empty() && name.len() <= MAX_TOPIC_LEN && !name.contains(['#', '+'])
    }

    /// A topic filter is non-empty and within the length limit; `#` may only
    /// terminate the filter as a whole level, `+` must occupy an entire level.
    /// With wildcards administratively disabled, any `+`/`#` invalidates the
    /// filter.
    pub fn is_valid_topic_filter(&self, filter: &str) -> bool {
        if filter.is_empty() || filter.len() > MAX_TOPIC_LEN {
            return false;
        }
        if !self.support_wildcards && filter.contains(['#', '+']) {
            return false;
        }
        let levels: Vec<&str> = filter.split('/').collect();
        let last = levels.len() - 1;
        for (pos, level) in levels.iter().enumerate() {
            if level.contains('#') && (*level != MULTI_WILDCARD || pos != last) {
                return false;
            }
            if level.contains('+') && *level != SINGLE_WILDCARD {
                return false;
            }
        }
        true
    }

    /// Whether `name` is matched by the subscription `filter`.
    ///
    /// Both inputs are validated first; an invalid one fails the call rather
    /// than producing a non-match.
    pub fn matches(&self, name: &str, filter: &str) -> Result<bool> {
        if !self.is_valid_topic_name(name) {
            return Err(MqttError::InvalidTopicName(name.into()).into());
        }
        if !self.is_valid_topic_filter(filter) {
            return Err(MqttError::InvalidTopicFilter(filter.into()).into());
        }

        let name_levels: Vec<&str> = name.split('/').collect();
        let filter_levels: Vec<&str> = filter.split('/').collect();
        let filter_last = filter_levels[filter_levels.len() - 1];

        // a filter may exceed the name by a single trailing '#' only
        if filter_levels.len() > name_levels.len() + 1 {
            return Ok(false);
        }
        if filter_levels.len() == name_levels.len() + 1 && filter_last != MULTI_WILDCARD {
            return Ok(false);
        }
        if name_levels.len() > filter_levels.len() && filter_last != MULTI_WILDCARD {
            return Ok(false);
        }
        // system topics are never matched by a leading wildcard
        if (filter_levels[0] == MULTI_WILDCARD || filter_levels[0] == SINGLE_WILDCARD)
            && name_levels[0].starts_with('$')
        {
            return Ok(false);
        }

        for (pos, filter_level) in filter_levels.iter().enumerate() {
            match *filter_level {
                MULTI_WILDCARD => return Ok(true),
                SINGLE_WILDCARD => {
                    if pos >= name_levels.len() {
                        return Ok(false);
                    }
                }
                _ => {
                    if pos >= name_levels.len() || *filter_level != name_levels[pos] {
                        return Ok(false);
                    }
                }
            }
        }

        Ok(name_levels.len() == filter_levels.len())
    }
}
