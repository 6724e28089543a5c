use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Global options that apply to every query.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub regex: bool,
}

/// Predicate over a single cell value.
#[derive(Debug, Clone)]
pub enum Matcher {
    Always,
    Never,
    Substring { needle: String, case_sensitive: bool },
    Pattern(Regex),
}

impl Matcher {
    pub fn matches(&self, value: Option<&str>) -> bool {
        let value = value.unwrap_or("");
        match self {
            Matcher::Always => true,
            Matcher::Never => false,
            Matcher::Substring {
                needle,
                case_sensitive: true,
            } => value.contains(needle.as_str()),
            Matcher::Substring {
                needle,
                case_sensitive: false,
            } => value.to_lowercase().contains(needle.as_str()),
            Matcher::Pattern(re) => re.is_match(value),
        }
    }
}

/// Build the predicate for `query`.
///
/// An empty query matches everything. A regex that does not compile matches
/// nothing; the compile error is only logged since there is nowhere to show
/// it while the user is still typing.
pub fn build_matcher(query: &str, options: MatchOptions) -> Matcher {
    if query.is_empty() {
        return Matcher::Always;
    }
    if options.regex {
        match RegexBuilder::new(query)
            .case_insensitive(!options.case_sensitive)
            .build()
        {
            Ok(re) => Matcher::Pattern(re),
            Err(e) => {
                debug!("Invalid pattern {query:?}: {e}");
                Matcher::Never
            }
        }
    } else if options.case_sensitive {
        Matcher::Substring {
            needle: query.to_string(),
            case_sensitive: true,
        }
    } else {
        Matcher::Substring {
            needle: query.to_lowercase(),
            case_sensitive: false,
        }
    }
}
