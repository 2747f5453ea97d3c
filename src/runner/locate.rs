//! Action reference resolution
//!
//! Reference grammar:
//! - `./X`, `../X`: local, relative to the calling action's directory, then
//!   to the workspace root
//! - `owner/repo[/path]@ref`: hosted, explicit version
//! - `owner/repo[/path]`: hosted, default branch
//! - `container://IMAGE[:TAG]` or `docker://IMAGE[:TAG]`: container image
//!
//! Local references must stay inside the calling action's directory or the
//! workspace root.

use crate::config::has_action_file;
use crate::error::{LocateError, LocateResult};
use crate::runner::{ActionFetcher, FetchedAction};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Ref used when a hosted reference has no `@ref`
pub const DEFAULT_REF: &str = "main";

/// Scheme prefixes that select a container image
pub const CONTAINER_SCHEMES: &[&str] = &["container://", "docker://"];

/// A parsed action reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionReference {
    /// Local path reference, as written
    Local(String),
    /// Repository reference
    Hosted(HostedReference),
    /// Container image
    Container(String),
}

/// `owner/repo[/path]@ref`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedReference {
    pub owner: String,
    pub repo: String,
    /// Directory inside the repository holding the action
    pub path: Option<String>,
    pub git_ref: String,
}

impl HostedReference {
    /// Stable identity used for cycle detection
    pub fn identity(&self) -> String {
        match &self.path {
            Some(path) => format!("{}/{}/{}@{}", self.owner, self.repo, path, self.git_ref),
            None => format!("{}/{}@{}", self.owner, self.repo, self.git_ref),
        }
    }
}

/// Parse a `uses:` reference
pub fn parse_reference(reference: &str) -> LocateResult<ActionReference> {
    let reference = reference.trim();

    for scheme in CONTAINER_SCHEMES {
        if let Some(image) = reference.strip_prefix(scheme) {
            if image.is_empty() {
                return Err(LocateError::InvalidReference(reference.to_string()));
            }
            return Ok(ActionReference::Container(image.to_string()));
        }
    }

    if is_local_reference(reference) {
        return Ok(ActionReference::Local(reference.to_string()));
    }

    let (location, git_ref) = match reference.split_once('@') {
        Some((location, git_ref)) => (location, git_ref.trim()),
        None => (reference, DEFAULT_REF),
    };

    let parts: Vec<&str> = location.split('/').collect();
    // a leading '-' would be read as an option by git
    if git_ref.is_empty()
        || git_ref.starts_with('-')
        || parts.len() < 2
        || parts.iter().any(|p| p.is_empty() || p.starts_with('-'))
    {
        return Err(LocateError::InvalidReference(reference.to_string()));
    }

    Ok(ActionReference::Hosted(HostedReference {
        owner: parts[0].to_string(),
        repo: parts[1].to_string(),
        path: (parts.len() > 2).then(|| parts[2..].join("/")),
        git_ref: git_ref.to_string(),
    }))
}

fn is_local_reference(reference: &str) -> bool {
    reference == "."
        || reference == ".."
        || reference.starts_with("./")
        || reference.starts_with("../")
}

/// Where a reference resolved to
#[derive(Debug)]
pub enum ActionLocation {
    /// Directory inside the caller's tree; never deleted by the engine
    Local(PathBuf),
    /// Retrieved checkout; removed when this value is cleaned up or dropped
    Hosted {
        checkout: FetchedAction,
        path: PathBuf,
        reference: HostedReference,
    },
    /// Container image, run by the container runner
    Container(String),
}

impl ActionLocation {
    /// Directory holding the action metadata
    pub fn path(&self) -> Option<&Path> {
        match self {
            ActionLocation::Local(path) => Some(path),
            ActionLocation::Hosted { path, .. } => Some(path),
            ActionLocation::Container(_) => None,
        }
    }

    /// Whether the caller must remove this location when done
    pub fn caller_owns_cleanup(&self) -> bool {
        matches!(self, ActionLocation::Hosted { .. })
    }

    /// Stable identity used for cycle detection
    pub fn identity(&self) -> String {
        match self {
            ActionLocation::Local(path) => path.display().to_string(),
            ActionLocation::Hosted { reference, .. } => reference.identity(),
            ActionLocation::Container(image) => format!("container://{}", image),
        }
    }

    /// Release the location; only hosted checkouts are removed
    pub fn cleanup(self) {
        if let ActionLocation::Hosted { checkout, .. } = self {
            checkout.close();
        }
    }
}

/// Resolve a reference from an action in `caller_dir`
pub fn locate(
    reference: &str,
    caller_dir: &Path,
    workspace: &Path,
    fetcher: &dyn ActionFetcher,
) -> LocateResult<ActionLocation> {
    match parse_reference(reference)? {
        ActionReference::Local(local) => {
            locate_local(&local, caller_dir, workspace).map(ActionLocation::Local)
        }
        ActionReference::Container(image) => Ok(ActionLocation::Container(image)),
        ActionReference::Hosted(hosted) => {
            debug!("Retrieving {}", hosted.identity());
            let checkout = fetcher.fetch(&hosted.owner, &hosted.repo, &hosted.git_ref)?;
            let path = match &hosted.path {
                Some(sub) => {
                    let path = normalize_path(&checkout.path().join(sub));
                    if !path.starts_with(checkout.path()) {
                        return Err(LocateError::PathEscapesRepository {
                            reference: reference.to_string(),
                            path,
                        });
                    }
                    check_canonical(reference, &path, checkout.path(), checkout.path())?;
                    path
                }
                None => checkout.path().to_path_buf(),
            };
            Ok(ActionLocation::Hosted {
                checkout,
                path,
                reference: hosted,
            })
        }
    }
}

/// Resolve a local reference to a directory containing action metadata
pub fn locate_local(reference: &str, caller_dir: &Path, workspace: &Path) -> LocateResult<PathBuf> {
    if reference.contains('\\') || reference.contains("//") {
        return Err(LocateError::InvalidReferencePath(reference.to_string()));
    }

    let caller_root = absolute_normalized(caller_dir);
    let workspace_root = absolute_normalized(workspace);
    let within_roots = |path: &Path| path.starts_with(&caller_root) || path.starts_with(&workspace_root);

    let caller_path = normalize_path(&caller_root.join(reference));
    let stripped = reference.strip_prefix("./").unwrap_or(reference);
    let workspace_path = normalize_path(&workspace_root.join(stripped));

    let mut escaped = None;
    for candidate in [&caller_path, &workspace_path] {
        if !within_roots(candidate.as_path()) {
            escaped.get_or_insert_with(|| candidate.clone());
            continue;
        }

        if has_action_file(candidate) {
            check_canonical(reference, candidate, &caller_root, &workspace_root)?;
            debug!("Resolved {} to {}", reference, candidate.display());
            return Ok(candidate.clone());
        }
    }

    match escaped {
        Some(path) => Err(LocateError::PathEscapesRepository {
            reference: reference.to_string(),
            path,
        }),
        None => Err(LocateError::ActionNotFound {
            reference: reference.to_string(),
            caller_path,
            workspace_path,
        }),
    }
}

/// Reject candidates that stay inside the roots lexically but leave them through symlinks
fn check_canonical(
    reference: &str,
    candidate: &Path,
    caller_root: &Path,
    workspace_root: &Path,
) -> LocateResult<()> {
    let Ok(real) = fs::canonicalize(candidate) else {
        return Ok(());
    };
    let canonical_or = |p: &Path| fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());

    if real.starts_with(canonical_or(caller_root)) || real.starts_with(canonical_or(workspace_root)) {
        Ok(())
    } else {
        Err(LocateError::PathEscapesRepository {
            reference: reference.to_string(),
            path: real,
        })
    }
}

/// Absolute, lexically normalized form of a path
pub fn absolute_normalized(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize_path(&absolute)
}

/// Lexically resolve `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(result.components().next_back(), Some(Component::Normal(_))) {
                    result.pop();
                } else if !result.has_root() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn write_action(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("action.yml"), "runs:\n  using: composite\n").unwrap();
    }

    #[test]
    fn test_parse_hosted_with_ref() {
        let parsed = parse_reference("actions/checkout@v4").unwrap();
        assert_eq!(
            parsed,
            ActionReference::Hosted(HostedReference {
                owner: "actions".to_string(),
                repo: "checkout".to_string(),
                path: None,
                git_ref: "v4".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_hosted_default_ref_and_subpath() {
        match parse_reference("octo/tools/setup/node").unwrap() {
            ActionReference::Hosted(hosted) => {
                assert_eq!(hosted.git_ref, DEFAULT_REF);
                assert_eq!(hosted.path.as_deref(), Some("setup/node"));
                assert_eq!(hosted.identity(), "octo/tools/setup/node@main");
            }
            other => panic!("unexpected reference: {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid_references() {
        for reference in [
            "owner",
            "owner/repo@",
            "/abs/path",
            "owner//repo",
            "container://",
            "owner/repo@--orphan=x",
            "owner/-repo@v1",
        ] {
            assert!(
                matches!(parse_reference(reference), Err(LocateError::InvalidReference(_))),
                "accepted {}",
                reference
            );
        }
    }

    #[test]
    fn test_parse_container() {
        assert_eq!(
            parse_reference("container://alpine:3.20").unwrap(),
            ActionReference::Container("alpine:3.20".to_string())
        );
        assert_eq!(
            parse_reference("docker://ghcr.io/o/i").unwrap(),
            ActionReference::Container("ghcr.io/o/i".to_string())
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/repo/a/b/../c/./d")), PathBuf::from("/repo/a/c/d"));
        assert_eq!(normalize_path(Path::new("/repo/../../../x")), PathBuf::from("/x"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_locate_relative_to_caller() {
        let ws = TempDir::new().unwrap();
        let caller = ws.path().join("actions/parent");
        write_action(&caller.join("child"));

        let found = locate_local("./child", &caller, ws.path()).unwrap();
        assert_eq!(found, normalize_path(&caller.join("child")));
    }

    #[test]
    fn test_locate_falls_back_to_workspace() {
        let ws = TempDir::new().unwrap();
        let caller = ws.path().join("actions/parent");
        fs::create_dir_all(&caller).unwrap();
        write_action(&ws.path().join("shared/lint"));

        let found = locate_local("./shared/lint", &caller, ws.path()).unwrap();
        assert_eq!(found, normalize_path(&ws.path().join("shared/lint")));
    }

    #[test]
    fn test_locate_not_found_names_both_paths() {
        let ws = TempDir::new().unwrap();
        let caller = ws.path().join("a");
        fs::create_dir_all(&caller).unwrap();

        match locate_local("./missing", &caller, ws.path()) {
            Err(LocateError::ActionNotFound {
                caller_path,
                workspace_path,
                ..
            }) => {
                assert!(caller_path.ends_with("a/missing"));
                assert_eq!(workspace_path, normalize_path(&ws.path().join("missing")));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_locate_rejects_escape() {
        let result = locate_local("../../../escape", Path::new("/repo/a/b"), Path::new("/repo"));
        assert!(matches!(result, Err(LocateError::PathEscapesRepository { .. })));
    }

    #[test]
    fn test_locate_rejects_backslash_and_double_separator() {
        let ws = Path::new("/repo");
        assert!(matches!(
            locate_local(".\\child", ws, ws),
            Err(LocateError::InvalidReferencePath(_))
        ));
        assert!(matches!(
            locate_local(".//child", ws, ws),
            Err(LocateError::InvalidReferencePath(_))
        ));
    }

    #[test]
    fn test_parent_reference_inside_workspace() {
        let ws = TempDir::new().unwrap();
        let caller = ws.path().join("actions/a");
        fs::create_dir_all(&caller).unwrap();
        write_action(&ws.path().join("actions/b"));

        let found = locate_local("../b", &caller, ws.path()).unwrap();
        assert_eq!(found, normalize_path(&ws.path().join("actions/b")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let outside = TempDir::new().unwrap();
        write_action(outside.path());
        let ws = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), ws.path().join("link")).unwrap();

        let result = locate_local("./link", ws.path(), ws.path());
        assert!(matches!(result, Err(LocateError::PathEscapesRepository { .. })));
    }

    struct RecordingFetcher {
        calls: RefCell<Vec<(String, String, String)>>,
    }

    impl ActionFetcher for RecordingFetcher {
        fn fetch(&self, owner: &str, repo: &str, git_ref: &str) -> LocateResult<FetchedAction> {
            self.calls
                .borrow_mut()
                .push((owner.to_string(), repo.to_string(), git_ref.to_string()));
            Ok(FetchedAction::new(TempDir::new().unwrap()))
        }
    }

    #[test]
    fn test_hosted_without_ref_uses_default_branch() {
        let fetcher = RecordingFetcher {
            calls: RefCell::new(Vec::new()),
        };
        let location = locate("owner/repo", Path::new("/repo"), Path::new("/repo"), &fetcher).unwrap();

        assert!(location.caller_owns_cleanup());
        assert_eq!(location.identity(), "owner/repo@main");
        assert_eq!(
            fetcher.calls.borrow().as_slice(),
            &[("owner".to_string(), "repo".to_string(), "main".to_string())]
        );

        let path = location.path().unwrap().to_path_buf();
        location.cleanup();
        assert!(!path.exists());
    }

    #[test]
    fn test_hosted_subpath_cannot_escape_checkout() {
        let fetcher = RecordingFetcher {
            calls: RefCell::new(Vec::new()),
        };
        let result = locate("owner/repo/../../etc@v1", Path::new("/repo"), Path::new("/repo"), &fetcher);
        assert!(matches!(result, Err(LocateError::PathEscapesRepository { .. })));
    }

    /// Serves a checkout whose `sub` directory links outside of it
    #[cfg(unix)]
    struct SymlinkFetcher {
        target: PathBuf,
    }

    #[cfg(unix)]
    impl ActionFetcher for SymlinkFetcher {
        fn fetch(&self, _owner: &str, _repo: &str, _git_ref: &str) -> LocateResult<FetchedAction> {
            let dir = TempDir::new().unwrap();
            std::os::unix::fs::symlink(&self.target, dir.path().join("sub")).unwrap();
            Ok(FetchedAction::new(dir))
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_hosted_subpath_symlink_escape_rejected() {
        let outside = TempDir::new().unwrap();
        write_action(outside.path());
        let fetcher = SymlinkFetcher {
            target: outside.path().to_path_buf(),
        };

        let result = locate("owner/repo/sub@v1", Path::new("/repo"), Path::new("/repo"), &fetcher);
        assert!(matches!(result, Err(LocateError::PathEscapesRepository { .. })));
    }

    #[test]
    fn test_local_location_is_not_owned() {
        let location = ActionLocation::Local(PathBuf::from("/repo/a"));
        assert!(!location.caller_owns_cleanup());
        assert_eq!(location.path(), Some(Path::new("/repo/a")));
    }
}
