// src/project/template.rs

//! `{placeholder}` substitution for command lines, paths and working
//! directories declared in the project file.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Placeholders a template may reference.
pub const KNOWN_PLACEHOLDERS: &[&str] = &["project", "root", "build_dir", "task"];

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
});

/// Names referenced by `template` that are not in [`KNOWN_PLACEHOLDERS`].
pub fn unknown_placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| {
            let name = &caps[1];
            (!KNOWN_PLACEHOLDERS.contains(&name)).then(|| name.to_string())
        })
        .collect()
}

/// Values substituted into templates for one project (and optionally task).
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: HashMap<&'static str, String>,
}

impl TemplateVars {
    pub fn new(project: &str, root: &str, build_dir: &str) -> Self {
        let mut values = HashMap::new();
        values.insert("project", project.to_string());
        values.insert("root", root.to_string());
        values.insert("build_dir", build_dir.to_string());
        Self { values }
    }

    pub fn with_task(mut self, task: &str) -> Self {
        self.values.insert("task", task.to_string());
        self
    }

    /// Substitute every known placeholder. Unset placeholders are left as-is.
    pub fn render(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures<'_>| {
                self.values
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}
