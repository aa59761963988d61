use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

/// Replace {{variable}} placeholders with values from the variable map.
/// Unknown variables render as empty strings.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    TEMPLATE_RE
        .replace_all(template, |caps: &regex::Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_variables() {
        let v = vars(&[("name", "Ada"), ("property_address", "12 High St")]);
        assert_eq!(
            render("Hi {{name}}, about {{property_address}}", &v),
            "Hi Ada, about 12 High St"
        );
    }

    #[test]
    fn unknown_variables_render_empty() {
        let v = vars(&[("name", "Ada")]);
        assert_eq!(render("Hi {{name}}{{missing}}!", &v), "Hi Ada!");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(render("no placeholders here", &vars(&[])), "no placeholders here");
    }
}
