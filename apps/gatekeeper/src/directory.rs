// [[GATEKEEPER]]/apps/gatekeeper/src/directory.rs
// Purpose: Ownership projections for addressable resources, resolved across the relation graph.
// Architecture: Data Access Layer
// Dependencies: DashMap, Models

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

use crate::error::ConfigError;
use crate::models::{FileRef, MilestoneRef, ProjectRef, TaskRef};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MilestoneRecord {
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub milestone_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub uploader_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// On-disk shape of the directory snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub projects: HashMap<String, ProjectRef>,
    #[serde(default)]
    pub milestones: HashMap<String, MilestoneRecord>,
    #[serde(default)]
    pub tasks: HashMap<String, TaskRecord>,
    #[serde(default)]
    pub files: HashMap<String, FileRecord>,
}

pub struct ResourceDirectory {
    projects: DashMap<String, ProjectRef>,
    milestones: DashMap<String, MilestoneRecord>,
    tasks: DashMap<String, TaskRecord>,
    files: DashMap<String, FileRecord>,
    settings: DashMap<String, serde_json::Value>,
}

impl ResourceDirectory {
    pub fn new() -> Self {
        Self {
            projects: DashMap::new(),
            milestones: DashMap::new(),
            tasks: DashMap::new(),
            files: DashMap::new(),
            settings: DashMap::new(),
        }
    }

    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        let mut directory = Self::new();
        directory.projects.extend(snapshot.projects);
        directory.milestones.extend(snapshot.milestones);
        directory.tasks.extend(snapshot.tasks);
        directory.files.extend(snapshot.files);
        directory
    }

    pub fn load_from_disk(path: &str) -> Result<Self, ConfigError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Resource file not found at '{}'. Starting with an empty directory.", path);
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_string(),
                    source,
                })
            }
        };

        let snapshot: DirectorySnapshot = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;

        tracing::info!(
            "Loaded directory: {} projects, {} milestones, {} tasks, {} files",
            snapshot.projects.len(),
            snapshot.milestones.len(),
            snapshot.tasks.len(),
            snapshot.files.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn insert_project(&self, id: &str, project: ProjectRef) {
        self.projects.insert(id.to_string(), project);
    }

    pub fn insert_milestone(&self, id: &str, project_id: &str) {
        self.milestones.insert(
            id.to_string(),
            MilestoneRecord {
                project_id: project_id.to_string(),
            },
        );
    }

    pub fn insert_task(&self, id: &str, milestone_id: &str) {
        self.tasks.insert(
            id.to_string(),
            TaskRecord {
                milestone_id: milestone_id.to_string(),
            },
        );
    }

    pub fn insert_file(&self, id: &str, uploader_id: &str, project_id: Option<&str>) {
        self.files.insert(
            id.to_string(),
            FileRecord {
                uploader_id: uploader_id.to_string(),
                project_id: project_id.map(String::from),
            },
        );
    }

    pub fn project(&self, id: &str) -> Option<ProjectRef> {
        self.projects.get(id).map(|p| p.value().clone())
    }

    /// task -> milestone -> project. A broken link anywhere reads as missing.
    pub fn task(&self, id: &str) -> Option<TaskRef> {
        let milestone_id = self.tasks.get(id)?.milestone_id.clone();
        let project_id = self.milestones.get(&milestone_id)?.project_id.clone();
        let project = self.project(&project_id)?;

        Some(TaskRef {
            milestone: MilestoneRef { project },
        })
    }

    pub fn file(&self, id: &str) -> Option<FileRef> {
        let record = self.files.get(id)?.value().clone();
        let project = match record.project_id.as_deref() {
            Some(project_id) => {
                let project = self.project(project_id);
                if project.is_none() {
                    tracing::warn!("File {} links to missing project {}; treating as orphaned", id, project_id);
                }
                project
            }
            None => None,
        };

        Some(FileRef {
            uploader_id: record.uploader_id,
            project,
        })
    }

    pub fn settings(&self, user_id: &str) -> serde_json::Value {
        self.settings
            .get(user_id)
            .map(|s| s.value().clone())
            .unwrap_or_else(|| serde_json::json!({}))
    }

    pub fn set_settings(&self, user_id: &str, settings: serde_json::Value) {
        self.settings.insert(user_id.to_string(), settings);
    }
}
