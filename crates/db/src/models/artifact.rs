//! Job artifacts: named, typed, immutable outputs of a successful run.

use std::fmt;
use std::str::FromStr;

use litessay_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// The kinds of artifact a run may produce. At most one of each per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactType {
    ThemesJson,
    EvidenceJson,
    EssayMd,
    SummaryMd,
}

impl ArtifactType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThemesJson => "themes_json",
            Self::EvidenceJson => "evidence_json",
            Self::EssayMd => "essay_md",
            Self::SummaryMd => "summary_md",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "themes_json" => Ok(Self::ThemesJson),
            "evidence_json" => Ok(Self::EvidenceJson),
            "essay_md" => Ok(Self::EssayMd),
            "summary_md" => Ok(Self::SummaryMd),
            other => Err(format!("unknown artifact type: {other}")),
        }
    }
}

/// Artifact body: JSON artifacts go to `blob_json`, text to `blob_text`.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactPayload {
    Json(serde_json::Value),
    Text(String),
}

/// DTO for inserting an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArtifact {
    pub artifact_type: ArtifactType,
    pub payload: ArtifactPayload,
}

impl NewArtifact {
    pub fn json(artifact_type: ArtifactType, value: serde_json::Value) -> Self {
        Self {
            artifact_type,
            payload: ArtifactPayload::Json(value),
        }
    }

    pub fn text(artifact_type: ArtifactType, text: impl Into<String>) -> Self {
        Self {
            artifact_type,
            payload: ArtifactPayload::Text(text.into()),
        }
    }
}

/// A row from the `job_artifacts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobArtifact {
    pub id: DbId,
    pub job_id: DbId,
    pub artifact_type: String,
    pub blob_json: Option<serde_json::Value>,
    pub blob_text: Option<String>,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_type_parses_its_own_name() {
        for t in [
            ArtifactType::ThemesJson,
            ArtifactType::EvidenceJson,
            ArtifactType::EssayMd,
            ArtifactType::SummaryMd,
        ] {
            assert_eq!(t.as_str().parse::<ArtifactType>(), Ok(t));
        }
        assert!("essay_pdf".parse::<ArtifactType>().is_err());
    }
}
