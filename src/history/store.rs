// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! History store implementation
//!
//! Session metadata lives in a JSON index file; full transcripts are
//! written one JSON file per session next to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::Result;
use crate::llm::Turn;

/// Information about a session stored in the history index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session ID
    pub id: Uuid,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// When the session was last active
    pub last_active: DateTime<Utc>,
    /// Working directory when the session started
    pub working_directory: PathBuf,
    /// Model the session ran against
    pub model: String,
    /// Number of turns in the transcript
    pub message_count: usize,
    /// Brief summary, usually the first user message
    pub summary: Option<String>,
}

impl SessionInfo {
    /// Create a new session info
    pub fn new(id: Uuid, working_directory: PathBuf, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            started_at: now,
            last_active: now,
            working_directory,
            model: model.into(),
            message_count: 0,
            summary: None,
        }
    }

    /// Update the last active timestamp
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// Set the summary (usually first user message)
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        let s: String = summary.into();
        // Truncate to first 100 chars
        self.summary = Some(if s.chars().count() > 100 {
            let kept: String = s.chars().take(97).collect();
            format!("{}...", kept)
        } else {
            s
        });
    }
}

/// Full transcript of one session, one file per session on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTranscript {
    pub id: Uuid,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
}

impl SessionTranscript {
    pub fn new(id: Uuid, model: impl Into<String>) -> Self {
        Self {
            id,
            model: model.into(),
            started_at: Utc::now(),
            turns: Vec::new(),
        }
    }
}

/// History store managing the session index and transcript files
pub struct HistoryStore {
    /// Directory holding the index and transcript files
    dir: PathBuf,
    /// Path to the history index file
    index_path: PathBuf,
    /// Cached sessions
    sessions: Vec<SessionInfo>,
}

impl HistoryStore {
    /// Open or create the history store in the default location
    pub fn open() -> Result<Self> {
        Self::open_at(Settings::history_dir())
    }

    /// Open or create a history store rooted at `dir`
    pub fn open_at(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        let index_path = dir.join("index.json");

        let sessions = if index_path.exists() {
            let content = std::fs::read_to_string(&index_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            dir,
            index_path,
            sessions,
        })
    }

    /// Save the history index
    fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.sessions)?;
        std::fs::write(&self.index_path, content)?;
        Ok(())
    }

    /// Add or update a session
    pub fn upsert(&mut self, session: SessionInfo) -> Result<()> {
        if let Some(existing) = self.sessions.iter_mut().find(|s| s.id == session.id) {
            *existing = session;
        } else {
            self.sessions.push(session);
        }
        self.save()
    }

    /// Get a session by ID
    pub fn get(&self, id: Uuid) -> Option<&SessionInfo> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Resolve a session by ID prefix (short 8-char form or longer)
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&SessionInfo> {
        self.sessions
            .iter()
            .find(|s| s.id.to_string().starts_with(prefix))
    }

    /// List recent sessions, most recently active first
    pub fn list_recent(&self, limit: usize) -> Vec<&SessionInfo> {
        let mut sorted: Vec<_> = self.sessions.iter().collect();
        sorted.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        sorted.into_iter().take(limit).collect()
    }

    /// Delete a session and its transcript file
    pub fn delete(&mut self, id: Uuid) -> Result<bool> {
        let initial_len = self.sessions.len();
        self.sessions.retain(|s| s.id != id);

        if self.sessions.len() < initial_len {
            let transcript = self.transcript_path(id);
            if transcript.exists() {
                std::fs::remove_file(transcript)?;
            }
            self.save()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Delete every session and transcript, returning how many were removed
    pub fn clear(&mut self) -> Result<usize> {
        let removed = self.sessions.len();
        for session in std::mem::take(&mut self.sessions) {
            let transcript = self.transcript_path(session.id);
            if transcript.exists() {
                std::fs::remove_file(transcript)?;
            }
        }
        self.save()?;
        Ok(removed)
    }

    /// Path of the transcript file for a session
    pub fn transcript_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Write a transcript file
    pub fn save_transcript(&self, transcript: &SessionTranscript) -> Result<()> {
        let content = serde_json::to_string_pretty(transcript)?;
        std::fs::write(self.transcript_path(transcript.id), content)?;
        Ok(())
    }

    /// Load a transcript file
    pub fn load_transcript(&self, id: Uuid) -> Result<SessionTranscript> {
        let content = std::fs::read_to_string(self.transcript_path(id))?;
        Ok(serde_json::from_str(&content)?)
    }
}
