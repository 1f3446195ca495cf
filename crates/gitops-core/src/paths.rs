//! Repository path conventions and path arithmetic.
//!
//! All paths are repository-relative and `/`-separated regardless of host OS.

pub const ENVIRONMENTS_DIR: &str = "environments";
pub const SERVICES_DIR: &str = "services";
pub const APPS_DIR: &str = "apps";
pub const ENV_DIR: &str = "env";
pub const CONFIG_DIR: &str = "config";
pub const BASE_DIR: &str = "base";
pub const OVERLAYS_DIR: &str = "overlays";
pub const PIPELINES_DIR: &str = "pipelines";
pub const ARGOCD_DIR: &str = "argocd";

/// Name of the composition index in every directory.
pub const KUSTOMIZATION: &str = "kustomization.yaml";

/// Join segments with `/`, skipping empty ones.
pub fn join(segments: &[&str]) -> String {
    segments
        .iter()
        .flat_map(|s| s.split('/'))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Final component of a path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Path of `to` relative to the directory `from`.
///
/// Both are treated as directories rooted at the same place, so
/// `relative_path("a/b/overlays", "a/b/base")` is `../base`.
pub fn relative_path(from: &str, to: &str) -> String {
    let from: Vec<&str> = components(from);
    let to: Vec<&str> = components(to);

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = std::iter::repeat_n("..", from.len() - common).collect();
    parts.extend_from_slice(&to[common..]);

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn components(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// `config/<cicd>`
pub fn cicd_config_path(cicd: &str) -> String {
    join(&[CONFIG_DIR, cicd])
}

/// `config/<cicd>/base/pipelines`
pub fn pipelines_path(cicd: &str) -> String {
    join(&[&cicd_config_path(cicd), BASE_DIR, PIPELINES_DIR])
}

/// `config/argocd/config`
pub fn argocd_config_path() -> String {
    join(&[CONFIG_DIR, ARGOCD_DIR, CONFIG_DIR])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_sibling() {
        assert_eq!(
            relative_path("environments/dev/env/overlays", "environments/dev/env/base"),
            "../base"
        );
    }

    #[test]
    fn test_relative_up_and_across() {
        assert_eq!(
            relative_path(
                "environments/dev/apps/app1/base",
                "environments/dev/services/svc1"
            ),
            "../../../services/svc1"
        );
    }

    #[test]
    fn test_relative_child_and_same() {
        assert_eq!(relative_path("a/b", "a/b/c"), "c");
        assert_eq!(relative_path("a/b", "a/b"), ".");
        assert_eq!(relative_path("a/b/", "./a/b"), ".");
    }

    #[test]
    fn test_relative_disjoint() {
        assert_eq!(relative_path("x/y", "a"), "../../a");
    }

    #[test]
    fn test_join_and_file_name() {
        assert_eq!(join(&["config", "cicd/", "", "base"]), "config/cicd/base");
        assert_eq!(
            file_name("environments/dev/env/base/dev-environment.yaml"),
            "dev-environment.yaml"
        );
        assert_eq!(pipelines_path("cicd"), "config/cicd/base/pipelines");
        assert_eq!(argocd_config_path(), "config/argocd/config");
    }
}
