use serde::{Deserialize, Serialize};

/// A repository origin URL pulled from the archive, paired with its dense
/// row number so the work source can persist a resumable cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Origin {
    pub row_id: u64,
    pub url: String,
}

impl Origin {
    #[must_use]
    pub fn new(row_id: u64, url: impl Into<String>) -> Self {
        Self {
            row_id,
            url: url.into(),
        }
    }

    /// Derives `(owner, repo)` by matching `github.com/<owner>/<repo>` and
    /// stripping a trailing `.git`.
    #[must_use]
    pub fn owner_repo(&self) -> Option<(String, String)> {
        let idx = self.url.find("github.com/")?;
        let rest = &self.url[idx + "github.com/".len()..];
        let rest = rest.trim_end_matches('/');
        let mut parts = rest.splitn(3, '/');
        let owner = parts.next()?;
        let mut repo = parts.next()?;
        repo = repo.strip_suffix(".git").unwrap_or(repo);
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some((owner.to_string(), repo.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_origin() {
        let o = Origin::new(1, "https://github.com/foo/bar");
        assert_eq!(o.owner_repo(), Some(("foo".into(), "bar".into())));
    }

    #[test]
    fn strips_trailing_git_and_slash() {
        let o = Origin::new(2, "https://github.com/foo/bar.git/");
        assert_eq!(o.owner_repo(), Some(("foo".into(), "bar".into())));
    }

    #[test]
    fn rejects_non_github_origin() {
        let o = Origin::new(3, "https://gitlab.com/foo/bar");
        assert_eq!(o.owner_repo(), None);
    }

    #[test]
    fn rejects_repo_only_url() {
        let o = Origin::new(4, "https://github.com/foo");
        assert_eq!(o.owner_repo(), None);
    }
}
