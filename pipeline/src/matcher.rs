use regex::Regex;

use crate::error::ConfigError;

struct CompiledPattern {
    raw: String,
    regex: Regex,
}

impl CompiledPattern {
    fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Compiled include/exclude predicate over meter or event-type names.
///
/// Grammar: a literal name, a glob (`*` matches any run of characters), or
/// either of those negated with a `!` prefix. Compilation happens once at
/// load time and rejects contradictory configuration; matching is pure.
///
/// A name matches iff no exclusion matches it and an inclusion does, where a
/// bare `*` inclusion (or an inclusion list that is empty because every entry
/// is an exclusion) accepts everything not excluded. Exclusion always wins.
pub struct SourceMatcher {
    included: Vec<CompiledPattern>,
    excluded: Vec<CompiledPattern>,
}

impl SourceMatcher {
    /// `owner` names the source in load-time errors.
    pub fn compile(owner: &str, patterns: &[String]) -> Result<SourceMatcher, ConfigError> {
        let mut included_raw: Vec<&str> = Vec::new();
        let mut excluded_raw: Vec<&str> = Vec::new();
        for pattern in patterns {
            match pattern.strip_prefix('!') {
                Some(negated) => excluded_raw.push(negated),
                None => included_raw.push(pattern),
            }
        }

        // The same literal on both sides can never be satisfied.
        for pattern in &included_raw {
            if excluded_raw.contains(pattern) {
                return Err(ConfigError::ContradictoryPattern {
                    owner: owner.to_string(),
                    pattern: (*pattern).to_string(),
                });
            }
        }
        // A bare wildcard beside any other positive entry is redundant at
        // best and usually a typo for an exclusion.
        if included_raw.contains(&"*") && included_raw.len() > 1 {
            let other = included_raw
                .iter()
                .find(|p| **p != "*")
                .expect("len > 1 guarantees a non-wildcard entry");
            return Err(ConfigError::AmbiguousWildcard {
                owner: owner.to_string(),
                pattern: (*other).to_string(),
            });
        }

        Ok(SourceMatcher {
            included: compile_all(owner, &included_raw)?,
            excluded: compile_all(owner, &excluded_raw)?,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        if self.excluded.iter().any(|p| p.matches(name)) {
            return false;
        }
        if self.included.is_empty() {
            // Only exclusions configured: accept the rest.
            return true;
        }
        self.included.iter().any(|p| p.matches(name))
    }

    /// True when the matcher accepts everything that is not excluded, i.e.
    /// there is no positive pattern narrowing the set.
    pub fn is_catch_all(&self) -> bool {
        self.included.is_empty() || self.included.iter().any(|p| p.raw == "*")
    }
}

fn compile_all(owner: &str, raw: &[&str]) -> Result<Vec<CompiledPattern>, ConfigError> {
    raw.iter()
        .map(|pattern| {
            let regex = glob_to_regex(pattern).map_err(|source| ConfigError::Pattern {
                owner: owner.to_string(),
                pattern: (*pattern).to_string(),
                source,
            })?;
            Ok(CompiledPattern {
                raw: (*pattern).to_string(),
                regex,
            })
        })
        .collect()
}

/// Anchored translation: `*` becomes `.*`, everything else is literal.
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for part in pattern.split('*') {
        if !part.is_empty() {
            translated.push_str(&regex::escape(part));
        }
        translated.push_str(".*");
    }
    // split() emits one trailing part, so one ".*" too many was appended.
    translated.truncate(translated.len() - 2);
    translated.push('$');
    Regex::new(&translated)
}
