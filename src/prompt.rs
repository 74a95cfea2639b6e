//! Layered system-prompt assembly from context files discovered on disk.
//!
//! Three file names carry special meaning when found anywhere between a
//! workspace directory and the user's home:
//!
//! - `SYSTEM.md` — replaces the default system prompt. The most specific
//!   file wins (closest to the workspace), not the first one found.
//! - `AGENTS.md` — every instance found is concatenated, most general first,
//!   and appended under a "Project Context" heading.
//! - `APPEND_SYSTEM.md` — every instance found is concatenated and appended
//!   last, after `AGENTS.md`.
//!
//! A discovered skill set contributes one final "Available Skills" appendix.
//! The result of [`PromptAssembler::build_system_prompt`] is meant to be the
//! sole system-role message an agent loop starts with.

use std::fs;
use std::path::{Path, PathBuf};

/// Discovers and assembles the layered system prompt for a workspace.
pub struct PromptAssembler {
    workspace: PathBuf,
}

impl PromptAssembler {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self { workspace: workspace.into() }
    }

    /// Find every `filename` from the workspace up to the user's home, plus
    /// the global `~/.agents/<filename>` config location.
    ///
    /// Returned order: global config first, then ancestors of the workspace
    /// from most general (home-ward) to most specific (the workspace itself
    /// last).
    fn find_context_files(&self, filename: &str) -> Vec<PathBuf> {
        let mut found = Vec::new();

        if let Some(home) = dirs_home() {
            let global = home.join(".agents").join(filename);
            if global.is_file() {
                found.push(global);
            }
        }

        let mut chain = Vec::new();
        let mut current = self.workspace.as_path();
        loop {
            chain.push(current.to_path_buf());
            match current.parent() {
                Some(parent) if parent != current => current = parent,
                _ => break,
            }
        }

        for dir in chain.into_iter().rev() {
            let candidate = dir.join(filename);
            if candidate.is_file() && !found.contains(&candidate) {
                found.push(candidate);
            }
        }

        found
    }

    fn load_system_md(&self) -> Option<String> {
        let files = self.find_context_files("SYSTEM.md");
        let most_specific = files.last()?;
        match fs::read_to_string(most_specific) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(path = %most_specific.display(), error = %e, "failed to read SYSTEM.md");
                None
            }
        }
    }

    fn load_agents_md(&self) -> Option<String> {
        let files = self.find_context_files("AGENTS.md");
        if files.is_empty() {
            return None;
        }

        let parts: Vec<String> = files
            .iter()
            .filter_map(|path| match fs::read_to_string(path) {
                Ok(content) => Some(format!("# From: {}\n\n{content}", path.display())),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read AGENTS.md");
                    None
                }
            })
            .collect();

        if parts.is_empty() { None } else { Some(parts.join("\n\n---\n\n")) }
    }

    fn load_append_system_md(&self) -> Option<String> {
        let files = self.find_context_files("APPEND_SYSTEM.md");
        if files.is_empty() {
            return None;
        }

        let parts: Vec<String> = files
            .iter()
            .filter_map(|path| match fs::read_to_string(path) {
                Ok(content) => Some(content),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read APPEND_SYSTEM.md");
                    None
                }
            })
            .collect();

        if parts.is_empty() { None } else { Some(parts.join("\n\n")) }
    }

    /// Build the final system prompt: `SYSTEM.md` override (or `default_prompt`),
    /// plus `AGENTS.md` under "Project Context", plus `APPEND_SYSTEM.md`, plus
    /// a skills appendix if `skills` is non-empty.
    pub fn build_system_prompt(&self, default_prompt: &str, skills: &[Skill]) -> String {
        let mut prompt = self.load_system_md().unwrap_or_else(|| default_prompt.to_string());

        if let Some(agents_md) = self.load_agents_md() {
            prompt.push_str(&format!("\n\n# Project Context\n\n{agents_md}"));
        }

        if let Some(append_md) = self.load_append_system_md() {
            prompt.push_str(&format!("\n\n{append_md}"));
        }

        if !skills.is_empty() {
            prompt.push_str(&format!("\n\n{}", skills_appendix(skills)));
        }

        prompt
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// A discovered skill: a `SKILL.md` describing one capability the agent can
/// be told about.
#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub title: String,
    pub description: String,
    pub steps: Vec<String>,
}

impl Skill {
    /// Load a skill from its `SKILL.md` path, using the parent directory
    /// name as the skill's identity.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = fs::read_to_string(path)?;
        let name = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "skill".to_string());

        Ok(Self::parse(name, &content))
    }

    fn parse(name: String, content: &str) -> Self {
        let title = content
            .lines()
            .find_map(|line| line.strip_prefix("# ").map(|t| t.trim().to_string()))
            .unwrap_or_else(|| name.clone());

        let description = extract_description(content);
        let steps = extract_steps(content);

        Self { name, title, description, steps }
    }

    /// Render this skill as prompt text: a heading, the description, and a
    /// numbered step list if any were found.
    pub fn to_prompt(&self) -> String {
        let mut out = format!("# Skill: {} — {}\n\n{}\n\n", self.name, self.title, self.description);
        if !self.steps.is_empty() {
            out.push_str("## Steps:\n");
            for (i, step) in self.steps.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, step));
            }
        }
        out
    }
}

fn extract_description(content: &str) -> String {
    let mut in_description = false;
    let mut lines = Vec::new();

    for line in content.lines() {
        if line.starts_with("# ") {
            in_description = true;
            continue;
        }
        if in_description {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with('#') {
                break;
            }
            lines.push(line.trim());
        }
    }

    lines.join(" ")
}

fn extract_steps(content: &str) -> Vec<String> {
    let mut in_steps = false;
    let mut steps = Vec::new();

    for line in content.lines() {
        if line.contains("## Steps") || line.contains("## Instructions") {
            in_steps = true;
            continue;
        }
        if in_steps {
            if line.starts_with('#') {
                break;
            }
            let trimmed = line.trim();
            let is_list_item = trimmed.starts_with('-')
                || trimmed.starts_with('*')
                || trimmed.chars().next().is_some_and(|c| c.is_ascii_digit());
            if is_list_item {
                let step = trimmed.trim_start_matches(['-', '*', '.', ' ']).trim_start_matches(char::is_numeric).trim_start_matches(['.', ' ']);
                if !step.is_empty() {
                    steps.push(step.to_string());
                }
            }
        }
    }

    steps
}

/// Discover all skills under the given directories (one level deep, each
/// subdirectory's `SKILL.md`).
pub fn discover_skills(directories: &[PathBuf]) -> Vec<Skill> {
    let mut skills = Vec::new();

    for directory in directories {
        let Ok(entries) = fs::read_dir(directory) else { continue };
        for entry in entries.flatten() {
            let skill_file = entry.path().join("SKILL.md");
            if !skill_file.is_file() {
                continue;
            }
            match Skill::load(&skill_file) {
                Ok(skill) => skills.push(skill),
                Err(e) => tracing::warn!(path = %skill_file.display(), error = %e, "failed to load skill"),
            }
        }
    }

    skills.sort_by(|a, b| a.name.cmp(&b.name));
    skills
}

fn skills_appendix(skills: &[Skill]) -> String {
    let mut out = String::from("# Available Skills\n\nYou have access to the following skills:\n\n");
    for skill in skills {
        out.push_str(&format!("- **{}**: {}\n", skill.name, skill.description));
    }
    out.push_str("\nUse `/skill:{name}` to invoke a skill.\n");
    out
}
