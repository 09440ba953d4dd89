//! Composite identifiers.
//!
//! Projects, repositories and groups are only unique inside their
//! workspace, so their external ids carry the ancestor chain joined by `:`.
//! Bitbucket ids are UUIDs in braces or slugs, neither of which contains
//! the separator. Parsing is the exact inverse of formatting and rejects
//! any other segment count.

use std::fmt;
use std::str::FromStr;

use xavyo_connector::error::ConnectorError;
use xavyo_connector::resource::ID_SEPARATOR;

fn split_exact<'a>(
    kind: &str,
    s: &'a str,
    expected: usize,
) -> Result<Vec<&'a str>, ConnectorError> {
    let parts: Vec<&str> = s.split(ID_SEPARATOR).collect();
    if parts.len() != expected || parts.iter().any(|p| p.is_empty()) {
        return Err(ConnectorError::invalid_argument(format!(
            "invalid {kind} id '{s}': expected {expected} non-empty segments, found {}",
            parts.len()
        )));
    }
    Ok(parts)
}

/// `workspaceId:projectId:projectKey`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId {
    pub workspace_id: String,
    pub project_id: String,
    pub project_key: String,
}

impl ProjectId {
    pub fn new(
        workspace_id: impl Into<String>,
        project_id: impl Into<String>,
        project_key: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            project_id: project_id.into(),
            project_key: project_key.into(),
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.workspace_id,
            self.project_id,
            self.project_key,
            sep = ID_SEPARATOR
        )
    }
}

impl FromStr for ProjectId {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact("project", s, 3)?;
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

/// `projectCompositeId:repoId`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId {
    pub project: ProjectId,
    pub repo_id: String,
}

impl RepositoryId {
    pub fn new(project: ProjectId, repo_id: impl Into<String>) -> Self {
        Self {
            project,
            repo_id: repo_id.into(),
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.project.workspace_id
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.project, ID_SEPARATOR, self.repo_id)
    }
}

impl FromStr for RepositoryId {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact("repository", s, 4)?;
        Ok(Self::new(
            ProjectId::new(parts[0], parts[1], parts[2]),
            parts[3],
        ))
    }
}

/// `workspaceId:groupSlug`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId {
    pub workspace_id: String,
    pub slug: String,
}

impl GroupId {
    pub fn new(workspace_id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            slug: slug.into(),
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.workspace_id, ID_SEPARATOR, self.slug)
    }
}

impl FromStr for GroupId {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_exact("user group", s, 2)?;
        Ok(Self::new(parts[0], parts[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_id_inverse() {
        let samples = [
            ("{3f1c}", "{9a0b}", "PROJ"),
            ("{w}", "{p}", "a-b_c"),
            ("acme", "{0000-1111}", "K"),
        ];
        for (ws, p, key) in samples {
            let id = ProjectId::new(ws, p, key);
            let parsed: ProjectId = id.to_string().parse().unwrap();
            assert_eq!(parsed, id);
            assert_eq!(parsed.workspace_id, ws);
            assert_eq!(parsed.project_id, p);
            assert_eq!(parsed.project_key, key);
        }
    }

    #[test]
    fn test_repository_id_inverse() {
        let id = RepositoryId::new(ProjectId::new("{w}", "{p}", "KEY"), "{r}");
        assert_eq!(id.to_string(), "{w}:{p}:KEY:{r}");
        assert_eq!(id.to_string().parse::<RepositoryId>().unwrap(), id);
        assert_eq!(id.workspace_id(), "{w}");
    }

    #[test]
    fn test_group_id_inverse() {
        let id = GroupId::new("{w}", "developers");
        assert_eq!(id.to_string(), "{w}:developers");
        assert_eq!("{w}:developers".parse::<GroupId>().unwrap(), id);
    }

    #[test]
    fn test_wrong_segment_count_is_rejected() {
        let err = "{w}:{p}".parse::<ProjectId>().unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("expected 3"));

        assert!("{w}:{p}:KEY:{r}".parse::<ProjectId>().is_err());
        assert!("{w}:{p}:KEY".parse::<RepositoryId>().is_err());
        assert!("{w}:{p}:KEY:{r}:extra".parse::<RepositoryId>().is_err());
        assert!("developers".parse::<GroupId>().is_err());
        assert!("{w}:".parse::<GroupId>().is_err());
    }
}
