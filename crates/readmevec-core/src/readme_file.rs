use crate::error::CoreError;

/// Branch tokens the filename parser recognizes, checked in this order.
pub const BRANCH_TOKENS: [&str; 3] = ["main", "master", "default"];

/// Filenames longer than this are rejected at creation to avoid exceeding
/// filesystem limits on the README directory.
pub const MAX_FILENAME_LEN: usize = 200;

/// The on-disk artifact for a successfully fetched README.
///
/// The filename `<owner>_<repo>_<branch>_<filename>` is the sole authority
/// for `(owner, repo, branch, filename)` — it is parsed back out, never
/// stored separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadmeFileName {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub filename: String,
}

impl ReadmeFileName {
    /// Builds a new filename, rejecting names that would exceed
    /// [`MAX_FILENAME_LEN`] once rendered.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        filename: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let this = Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            filename: filename.into(),
        };
        if this.to_string().len() > MAX_FILENAME_LEN {
            return Err(CoreError::MalformedFilename(format!(
                "filename exceeds {MAX_FILENAME_LEN} bytes: {this}"
            )));
        }
        Ok(this)
    }

    /// Parses `owner/repo` back out of an on-disk filename.
    ///
    /// Locates the first underscore-split part that is *exactly* a known
    /// branch token. `owner = parts[0]`; `repo = join(parts[1..branch_idx], "_")`.
    /// If the repo name itself legitimately contains a branch token earlier
    /// than the real branch component, this is an unresolvable ambiguity of
    /// the archive format: the parser returns `None` rather than silently
    /// mis-splitting (see the branch-token heuristic decision in DESIGN.md).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() < 4 {
            return None;
        }
        let owner = parts[0];
        if owner.is_empty() {
            return None;
        }
        let branch_idx = parts
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, p)| BRANCH_TOKENS.contains(p))
            .map(|(i, _)| i)?;
        if branch_idx + 1 >= parts.len() {
            return None;
        }
        let repo = parts[1..branch_idx].join("_");
        if repo.is_empty() {
            return None;
        }
        let branch = parts[branch_idx].to_string();
        let filename = parts[branch_idx + 1..].join("_");
        if filename.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo,
            branch,
            filename,
        })
    }
}

impl std::fmt::Display for ReadmeFileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.owner, self.repo, self.branch, self.filename
        )
    }
}
