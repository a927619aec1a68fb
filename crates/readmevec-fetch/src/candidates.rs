/// README filenames tried for each candidate branch, in this order.
pub const README_NAMES: [&str; 5] = ["README.md", "README.rst", "README", "readme.md", "Readme.md"];

/// Branches tried for each repo, in this order. `master` is listed first
/// because it covers roughly 70% of archived repos; `--default-branch-first`
/// reverses this.
pub const BRANCHES: [&str; 2] = ["master", "main"];

/// Default raw-hosting origin. Configurable per [`crate::engine::FetchEngine`]
/// so tests and self-hosted mirrors can point elsewhere.
pub const DEFAULT_RAW_BASE_URL: &str = "https://raw.githubusercontent.com";

/// Builds the raw-hosting URL for one `(branch, filename)` candidate.
#[must_use]
pub fn raw_url(base_url: &str, owner: &str, repo: &str, branch: &str, filename: &str) -> String {
    format!("{}/{owner}/{repo}/{branch}/{filename}", base_url.trim_end_matches('/'))
}

/// The full, ordered candidate sweep for one repo: `README_NAMES x BRANCHES`,
/// branches outer so the more common branch is exhausted before falling
/// back to the next one.
#[must_use]
pub fn candidate_sweep(default_branch_first: bool) -> Vec<(&'static str, &'static str)> {
    let mut branches = BRANCHES.to_vec();
    if default_branch_first {
        branches.reverse();
    }
    let mut out = Vec::with_capacity(branches.len() * README_NAMES.len());
    for branch in branches {
        for name in README_NAMES {
            out.push((branch, name));
        }
    }
    out
}
