//! `{{ name }}` substitution for bootstrap scripts and host definitions.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{DeployError, Result};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Substitute every placeholder; an undefined name is a configuration error.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let mut missing = Vec::new();
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        match vars.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });
    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(DeployError::Config(format!(
            "template references undefined variable(s): {}",
            missing.join(", ")
        )));
    }
    Ok(rendered.into_owned())
}

pub fn render_file(path: &Path, vars: &BTreeMap<String, String>) -> Result<String> {
    let template = std::fs::read_to_string(path).map_err(|source| DeployError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    render(&template, vars).map_err(|e| match e {
        DeployError::Config(msg) => DeployError::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("project".to_string(), "shop".to_string()),
            ("environment".to_string(), "stage".to_string()),
        ])
    }

    #[test]
    fn substitutes_with_or_without_spaces() {
        let out = render("{{project}}-{{ environment }}", &vars()).unwrap();
        assert_eq!(out, "shop-stage");
    }

    #[test]
    fn leaves_other_braces_alone() {
        let out = render("echo ${HOME} {not a var}", &vars()).unwrap();
        assert_eq!(out, "echo ${HOME} {not a var}");
    }

    #[test]
    fn undefined_variables_are_reported_once() {
        let err = render("{{ missing }} {{missing}} {{ other }}", &vars()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: template references undefined variable(s): missing, other"
        );
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = render_file(Path::new("/nonexistent/user-data.sh"), &vars()).unwrap_err();
        assert!(matches!(err, DeployError::ReadFile { .. }));
    }
}
