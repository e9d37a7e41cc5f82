//! App runtime
//!
//! The collaborator that actually starts and stops an app's containers. Job
//! executors only talk to this trait; compose files themselves are never
//! parsed or rewritten here.

pub mod compose;

pub use compose::{DockerComposeRuntime, check_compose_available};

use async_trait::async_trait;
use skiff_core::domain::app::App;
use std::path::{Path, PathBuf};

/// Compose project of one app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProject {
    /// Project name passed to `-p`
    pub name: String,
    /// Compose file, absolute or relative to the node's working directory
    pub file: PathBuf,
}

impl ComposeProject {
    /// Project of `app` below `apps_dir`
    ///
    /// Without an explicit compose file the app's directory is expected to
    /// hold a `docker-compose.yml`.
    pub fn for_app(app: &App, apps_dir: &Path) -> Self {
        let file = match &app.compose_file {
            Some(compose_file) => apps_dir.join(compose_file),
            None => apps_dir.join(&app.id).join("docker-compose.yml"),
        };

        Self {
            name: format!("skiff-{}", app.id.to_ascii_lowercase().replace('.', "-")),
            file,
        }
    }
}

#[async_trait]
pub trait AppRuntime: Send + Sync {
    /// Create and start the project's containers
    async fn up(&self, project: &ComposeProject) -> anyhow::Result<()>;

    /// Stop and remove the project's containers
    async fn down(&self, project: &ComposeProject) -> anyhow::Result<()>;

    /// Restart running containers
    async fn restart(&self, project: &ComposeProject) -> anyhow::Result<()>;

    /// Rebuild images without cache
    async fn build(&self, project: &ComposeProject) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skiff_core::domain::app::AppStatus;

    fn app(id: &str, compose_file: Option<&str>) -> App {
        App {
            id: id.to_string(),
            name: "blog".to_string(),
            node_id: "node-1".to_string(),
            status: AppStatus::Created,
            compose_file: compose_file.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_project_defaults_to_app_directory() {
        let project = ComposeProject::for_app(&app("Blog.v2", None), Path::new("/srv/apps"));
        assert_eq!(project.name, "skiff-blog-v2");
        assert_eq!(
            project.file,
            PathBuf::from("/srv/apps/Blog.v2/docker-compose.yml")
        );
    }

    #[test]
    fn test_project_uses_explicit_compose_file() {
        let project = ComposeProject::for_app(
            &app("blog", Some("shared/blog.yml")),
            Path::new("/srv/apps"),
        );
        assert_eq!(project.file, PathBuf::from("/srv/apps/shared/blog.yml"));
    }
}
