//! Template micro-language.
//!
//! Rendering runs two strictly ordered phases:
//!
//! 1. Path expressions `$(a.b.c)` are replaced by the value reached by walking attribute
//!    accesses from the rendered instance. Replacement text has its `$` characters doubled
//!    so data never turns into a placeholder.
//! 2. Named slots (`$name`, `${name}`) are substituted from a context map; `$$` is a literal
//!    dollar sign.

use crate::error::{Error, Result};
use regex::Regex;

/// Finds `$(path)` expressions.
#[derive(Debug, Clone)]
pub struct PathExpressions {
    pattern: Regex,
}

impl PathExpressions {
    /// Compile the expression scanner.
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"\$\((.*?)\)").map_err(|e| Error::InvalidTemplate {
            offset: 0,
            message: e.to_string(),
        })?;
        Ok(Self { pattern })
    }

    /// Paths referenced by a template, in order of appearance.
    pub fn paths<'t>(&self, template: &'t str) -> Vec<&'t str> {
        self.pattern
            .captures_iter(template)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect()
    }

    /// Replace every path expression with the escaped text `resolve` returns for it.
    pub fn expand<F>(&self, template: &str, mut resolve: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<String>,
    {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in self.pattern.captures_iter(template) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&template[last..whole.start()]);
            out.push_str(&escape_dollars(&resolve(path.as_str())?));
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }
}

/// Double every `$` so the text survives slot substitution unchanged.
pub fn escape_dollars(text: &str) -> String {
    text.replace('$', "$$")
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// Substitute `$name` and `${name}` slots.
///
/// A slot `lookup` does not know is [`Error::UndefinedSlot`]; a `$` that starts neither a
/// slot nor `$$` is [`Error::InvalidTemplate`].
pub fn substitute<F>(template: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let at = offset + pos;
        let after = &rest[pos + 1..];

        let (name, consumed) = if after.starts_with('$') {
            out.push('$');
            (None, 1)
        } else if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}').ok_or_else(|| Error::InvalidTemplate {
                offset: at,
                message: "unterminated ${ placeholder".to_string(),
            })?;
            let name = &braced[..end];
            let valid = name.chars().next().is_some_and(is_ident_start) && name.chars().all(is_ident_char);
            if !valid {
                return Err(Error::InvalidTemplate {
                    offset: at,
                    message: format!("invalid placeholder name \"{}\"", name),
                });
            }
            (Some(name), end + 2)
        } else {
            let len = match after.chars().next() {
                Some(c) if is_ident_start(c) => after
                    .char_indices()
                    .find(|(_, c)| !is_ident_char(*c))
                    .map_or(after.len(), |(i, _)| i),
                _ => {
                    return Err(Error::InvalidTemplate {
                        offset: at,
                        message: "invalid placeholder".to_string(),
                    });
                }
            };
            (Some(&after[..len]), len)
        };

        if let Some(name) = name {
            let value = lookup(name).ok_or_else(|| Error::UndefinedSlot(name.to_string()))?;
            out.push_str(&value);
        }

        rest = &after[consumed..];
        offset = at + 1 + consumed;
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn context() -> HashMap<&'static str, &'static str> {
        HashMap::from([("name", "Rex"), ("class", "Pet"), ("owner", "Ana")])
    }

    fn sub(template: &str) -> Result<String> {
        let ctx = context();
        substitute(template, |k| ctx.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn test_substitute_forms() {
        assert_eq!(sub("$class: $name").unwrap(), "Pet: Rex");
        assert_eq!(sub("${name}s").unwrap(), "Rexs");
        assert_eq!(sub("costs $$5").unwrap(), "costs $5");
        assert_eq!(sub("no slots").unwrap(), "no slots");
        assert_eq!(sub("$name.").unwrap(), "Rex.");
    }

    #[test]
    fn test_undefined_slot() {
        assert!(matches!(sub("$color"), Err(Error::UndefinedSlot(name)) if name == "color"));
        assert!(matches!(sub("${age}"), Err(Error::UndefinedSlot(_))));
    }

    #[test]
    fn test_invalid_placeholders() {
        assert!(matches!(sub("50$"), Err(Error::InvalidTemplate { offset: 2, .. })));
        assert!(matches!(sub("$ 5"), Err(Error::InvalidTemplate { .. })));
        assert!(matches!(sub("${1x}"), Err(Error::InvalidTemplate { .. })));
        assert!(matches!(sub("${name"), Err(Error::InvalidTemplate { .. })));
    }

    #[test]
    fn test_paths_in_order() {
        let paths = PathExpressions::new().unwrap();
        assert_eq!(
            paths.paths("$(owner.name) owns $(name) and $(owner.name)"),
            vec!["owner.name", "name", "owner.name"]
        );
    }

    #[test]
    fn test_expand_replaces_each_expression() {
        let paths = PathExpressions::new().unwrap();
        let out = paths
            .expand("$(owner.name) owns $(name)", |p| {
                Ok(match p {
                    "owner.name" => "Ana".to_string(),
                    "name" => "Rex".to_string(),
                    _ => String::new(),
                })
            })
            .unwrap();
        assert_eq!(out, "Ana owns Rex");
    }

    #[test]
    fn test_expanded_text_is_escaped() {
        let paths = PathExpressions::new().unwrap();
        let expanded = paths.expand("price: $(price)", |_| Ok("$name".to_string())).unwrap();

        assert_eq!(expanded, "price: $$name");
        assert_eq!(sub(&expanded).unwrap(), "price: $name");
    }

    #[test]
    fn test_expand_propagates_errors() {
        let paths = PathExpressions::new().unwrap();
        let result = paths.expand("$(bad)", |p| Err(Error::unknown_attribute("Pet", p)));
        assert!(matches!(result, Err(Error::UnknownAttribute { .. })));
    }
}
