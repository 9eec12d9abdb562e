//! Normalization of GitHub API payloads into snapshot records.

use crate::snapshot::{Record, Visibility};

use super::types::GitHubRepo;

/// Determine visibility from a GitHub repository.
///
/// Uses the explicit `visibility` field when GitHub sends a known value and
/// falls back to the `private` flag otherwise.
fn github_visibility(repo: &GitHubRepo) -> Visibility {
    match repo.visibility.as_deref() {
        Some("public") => Visibility::Public,
        Some("private") => Visibility::Private,
        Some("internal") => Visibility::Internal,
        _ if repo.private.unwrap_or(false) => Visibility::Private,
        _ => Visibility::Public,
    }
}

/// Convert a GitHub repository to a normalized record.
pub fn to_record(repo: &GitHubRepo) -> Record {
    let mut topics: Vec<String> = Vec::new();
    for topic in repo.topics.iter().flatten() {
        if !topics.contains(topic) {
            topics.push(topic.clone());
        }
    }

    Record {
        id: repo.id,
        name: repo.name.clone(),
        full_name: repo.full_name.clone(),
        description: repo.description.clone(),
        language: repo.language.clone(),
        stargazers_count: repo.stargazers_count.unwrap_or(0),
        forks_count: repo.forks_count.unwrap_or(0),
        updated_at: repo.updated_at.clone(),
        pushed_at: repo.pushed_at.clone(),
        size: repo.size.unwrap_or(0),
        private: repo.private.unwrap_or(false),
        fork: repo.fork.unwrap_or(false),
        html_url: repo.html_url.clone().unwrap_or_default(),
        clone_url: repo.clone_url.clone().unwrap_or_default(),
        topics,
        archived: repo.archived.unwrap_or(false),
        disabled: repo.disabled.unwrap_or(false),
        visibility: Some(github_visibility(repo)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> GitHubRepo {
        serde_json::from_value(serde_json::json!({
            "id": 101,
            "name": "tool",
            "full_name": "octo/tool",
            "description": "A tool",
            "language": "Rust",
            "stargazers_count": 12,
            "forks_count": 3,
            "updated_at": "2024-02-01T00:00:00Z",
            "pushed_at": "2024-01-31T00:00:00Z",
            "size": 2048,
            "private": false,
            "fork": true,
            "html_url": "https://github.com/octo/tool",
            "clone_url": "https://github.com/octo/tool.git",
            "topics": ["cli", "rust", "cli"],
            "archived": false,
            "disabled": false
        }))
        .expect("fixture")
    }

    #[test]
    fn copies_all_snapshot_fields() {
        let record = to_record(&repo());
        assert_eq!(record.id, 101);
        assert_eq!(record.full_name, "octo/tool");
        assert_eq!(record.language.as_deref(), Some("Rust"));
        assert_eq!(record.stargazers_count, 12);
        assert_eq!(record.forks_count, 3);
        assert_eq!(record.size, 2048);
        assert!(record.fork);
        assert_eq!(record.clone_url, "https://github.com/octo/tool.git");
        assert_eq!(record.updated_at.as_deref(), Some("2024-02-01T00:00:00Z"));
    }

    #[test]
    fn topics_become_a_set() {
        assert_eq!(to_record(&repo()).topics, vec!["cli", "rust"]);
    }

    #[test]
    fn visibility_prefers_explicit_field() {
        let mut r = repo();
        r.visibility = Some("internal".into());
        assert_eq!(to_record(&r).visibility, Some(Visibility::Internal));
    }

    #[test]
    fn visibility_falls_back_to_private_flag() {
        let mut r = repo();
        r.visibility = None;
        r.private = Some(true);
        assert_eq!(to_record(&r).visibility, Some(Visibility::Private));

        r.private = None;
        assert_eq!(to_record(&r).visibility, Some(Visibility::Public));
    }
}
