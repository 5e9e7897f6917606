// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Personas: named system instructions
//!
//! A persona is a YAML file in `~/.otto/personas/` carrying a name, a short
//! description, and the system instruction it stands for. `--persona NAME`
//! selects one for a chat session; without it the built-in default applies.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{OttoError, Result};

/// Instruction the default persona carries
const DEFAULT_INSTRUCTION: &str = "You are Otto, a capable terminal assistant. \
You answer precisely and act through the tools offered to you. Prefer doing \
over describing: when a tool can answer the question, call it. Keep responses \
short; this is a terminal, not a chat room.";

/// A named system instruction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Persona {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub instruction: String,
}

impl Persona {
    /// The built-in persona used when none is selected.
    pub fn built_in() -> Self {
        Self {
            name: "otto".to_string(),
            description: "Default terminal assistant".to_string(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }

    /// Parse a persona from YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        let persona: Persona = serde_yaml::from_str(content)
            .map_err(|e| OttoError::Persona(format!("invalid persona file: {}", e)))?;
        if persona.instruction.trim().is_empty() {
            return Err(OttoError::Persona(
                "persona has an empty instruction".to_string(),
            ));
        }
        Ok(persona)
    }

    /// Load a persona by name from `dir`, trying `.yaml` then `.yml`.
    pub fn load(name: &str, dir: &Path) -> Result<Self> {
        for extension in ["yaml", "yml"] {
            let path = dir.join(format!("{}.{}", name, extension));
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                return Self::parse(&content);
            }
        }
        Err(OttoError::Persona(format!(
            "Persona '{}' not found in {}",
            name,
            dir.display()
        )))
    }
}

/// List every loadable persona in `dir`, built-in first.
///
/// Unreadable or malformed files are skipped with a warning so one broken
/// persona cannot take the listing down.
pub fn list_personas(dir: &Path) -> Vec<Persona> {
    let mut personas = vec![Persona::built_in()];

    let Ok(entries) = std::fs::read_dir(dir) else {
        return personas;
    };

    let mut from_disk = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if !is_yaml {
            continue;
        }

        match std::fs::read_to_string(&path).map_err(OttoError::from).and_then(|c| Persona::parse(&c)) {
            Ok(persona) => from_disk.push(persona),
            Err(e) => {
                tracing::warn!(
                    target: "otto.personas",
                    path = %path.display(),
                    error = %e,
                    "skipping unloadable persona"
                );
            }
        }
    }

    from_disk.sort_by(|a, b| a.name.cmp(&b.name));
    personas.extend(from_disk);
    personas
}

/// Resolve the persona for a session: named from `dir`, or the built-in.
pub fn resolve_persona(name: Option<&str>, dir: &PathBuf) -> Result<Persona> {
    match name {
        Some(name) => Persona::load(name, dir),
        None => Ok(Persona::built_in()),
    }
}
