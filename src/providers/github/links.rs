use crate::snapshot::{ItemKind, RepoRef};

/// Builds the web URL of an issue or pull request.
///
/// # Arguments
///
/// * `web_url` - Source-control web base URL (e.g., <https://github.com>)
/// * `repo` - Repository the item lives in
/// * `number` - Issue or pull request number
/// * `kind` - Item kind, selecting `/issues/` or `/pull/`
///
/// # Returns
///
/// Clickable URL (e.g., <https://github.com/acme/api/pull/12>)
pub fn item_url(web_url: &str, repo: &RepoRef, number: u64, kind: ItemKind) -> String {
    let segment = if kind.is_pull_request() {
        "pull"
    } else {
        "issues"
    };
    format!(
        "{}/{}/{}/{segment}/{number}",
        web_url.trim_end_matches('/'),
        repo.owner,
        repo.name
    )
}
