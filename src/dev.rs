//! Local development containers.
//!
//! Every action is a fixed sequence of `docker` invocations. No local state is
//! kept: whether a container exists is asked of Docker each time.

use crate::config::{Project, Tools};
use crate::error::{MobyError, Result};
use crate::git;
use crate::shell::{CommandOptions, Runner};

/// Tag used for the running container, and the fallback revision.
pub const DEV_TAG: &str = "dev";

pub const PS_FORMAT: &str = "table {{.ID}}\t{{.Names}}\t{{.Status}}\t{{.Ports}}\t{{.Image}}";

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevAction {
    /// Build and start the development container
    Start,
    /// Stop and remove the development container
    Stop,
    /// Restart the development container
    Restart,
    /// Rebuild the image and restart the container
    Rebuild,
    /// Show container logs
    Logs,
    /// Remove the development container and its images
    Clean,
    /// List Docker containers
    Ps,
    /// Remove all stopped containers
    Prune,
}

impl DevAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DevAction::Start => "start",
            DevAction::Stop => "stop",
            DevAction::Restart => "restart",
            DevAction::Rebuild => "rebuild",
            DevAction::Logs => "logs",
            DevAction::Clean => "clean",
            DevAction::Ps => "ps",
            DevAction::Prune => "prune",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DevOptions {
    pub port: Option<u16>,
    pub follow: bool,
}

/// Normalize a `docker ps` name entry ("/api, alias" -> "api").
pub fn container_name(raw_names: &str) -> &str {
    raw_names
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches('/')
}

/// Dispatch one action. `ps` and `prune` work without a project.
pub async fn run<R: Runner>(
    runner: &R,
    tools: &Tools,
    action: DevAction,
    project: Option<&Project>,
    opts: DevOptions,
) -> Result<()> {
    match (action, project) {
        (DevAction::Ps, project) => ps(runner, tools, project).await,
        (DevAction::Prune, _) => prune(runner, tools).await,
        (action, None) => Err(MobyError::ProjectRequired {
            action: action.as_str().to_string(),
        }),
        (DevAction::Start, Some(p)) => Dev::new(runner, tools, p).start(opts.port).await,
        (DevAction::Stop, Some(p)) => {
            Dev::new(runner, tools, p).stop().await;
            println!("✅ Container stopped and removed.");
            Ok(())
        }
        (DevAction::Restart, Some(p)) => Dev::new(runner, tools, p).restart(opts.port).await,
        (DevAction::Rebuild, Some(p)) => Dev::new(runner, tools, p).rebuild(opts.port).await,
        (DevAction::Logs, Some(p)) => Dev::new(runner, tools, p).logs(opts.follow).await,
        (DevAction::Clean, Some(p)) => Dev::new(runner, tools, p).clean().await,
    }
}

pub struct Dev<'a, R: Runner> {
    runner: &'a R,
    tools: &'a Tools,
    project: &'a Project,
}

impl<'a, R: Runner> Dev<'a, R> {
    pub fn new(runner: &'a R, tools: &'a Tools, project: &'a Project) -> Self {
        Dev {
            runner,
            tools,
            project,
        }
    }

    fn docker(&self) -> &str {
        &self.tools.docker
    }

    async fn revision(&self) -> String {
        git::revision(self.runner, self.tools, self.project.path())
            .await
            .unwrap_or_else(|| DEV_TAG.to_string())
    }

    pub async fn container_exists(&self) -> Result<bool> {
        let name = self.project.container_name();
        let filter = format!("name={name}");
        let out = self
            .runner
            .run(
                &[self.docker(), "ps", "-a", "--filter", &filter, "--format", "{{.Names}}"],
                CommandOptions::quiet(),
            )
            .await?;
        Ok(out.stdout.lines().any(|line| container_name(line) == name))
    }

    pub async fn build(&self, revision: &str) -> Result<()> {
        println!("🏗️ Building Docker image...");
        let image = self.project.image_name();
        let latest = format!("{image}:latest");
        let dev = format!("{image}:{DEV_TAG}");
        let rev = format!("{image}:{revision}");
        self.runner
            .run(
                &[self.docker(), "build", "-t", &latest, "-t", &dev, "-t", &rev, "."],
                CommandOptions::default().in_dir(self.project.path()),
            )
            .await?;
        Ok(())
    }

    pub async fn run_container(&self, port: u16) -> Result<()> {
        println!("🚀 Starting container on port {port}...");
        let publish = format!("{port}:{port}");
        let env = format!("PORT={port}");
        let image = format!("{}:{DEV_TAG}", self.project.image_name());
        self.runner
            .run(
                &[
                    self.docker(),
                    "run",
                    "-d",
                    "--name",
                    self.project.container_name(),
                    "-p",
                    &publish,
                    "-e",
                    &env,
                    &image,
                ],
                CommandOptions::default(),
            )
            .await?;
        Ok(())
    }

    /// Returns whether both stop and rm succeeded. Absence is not an error.
    pub async fn stop(&self) -> bool {
        println!("🛑 Stopping container...");
        let name = self.project.container_name();
        let stopped = self
            .runner
            .run_best_effort(&[self.docker(), "stop", name], CommandOptions::default())
            .await;
        let removed = self
            .runner
            .run_best_effort(&[self.docker(), "rm", name], CommandOptions::default())
            .await;
        stopped && removed
    }

    pub async fn start(&self, port: Option<u16>) -> Result<()> {
        let port = self.project.port(port)?;
        if self.container_exists().await? {
            return Err(MobyError::ContainerExists {
                name: self.project.container_name().to_string(),
            });
        }
        let revision = self.revision().await;
        self.build(&revision).await?;
        self.run_container(port).await?;
        println!("✅ Container started! Available at http://localhost:{port}");
        Ok(())
    }

    pub async fn restart(&self, port: Option<u16>) -> Result<()> {
        let port = self.project.port(port)?;
        self.stop().await;
        self.run_container(port).await?;
        println!("✅ Container restarted! Available at http://localhost:{port}");
        Ok(())
    }

    pub async fn rebuild(&self, port: Option<u16>) -> Result<()> {
        let port = self.project.port(port)?;
        self.stop().await;
        let revision = self.revision().await;
        self.build(&revision).await?;
        self.run_container(port).await?;
        println!("✅ Container rebuilt and started! Available at http://localhost:{port}");
        Ok(())
    }

    pub async fn logs(&self, follow: bool) -> Result<()> {
        let mut argv = vec![self.docker(), "logs"];
        if follow {
            argv.push("-f");
        }
        argv.push(self.project.container_name());
        self.runner.run(&argv, CommandOptions::stream()).await?;
        Ok(())
    }

    pub async fn clean(&self) -> Result<()> {
        println!("🧹 Cleaning up Docker resources...");
        self.stop().await;
        let revision = self.revision().await;
        let image = self.project.image_name();
        let tags = [
            format!("{image}:latest"),
            format!("{image}:{DEV_TAG}"),
            format!("{image}:{revision}"),
        ];
        let mut argv = vec![self.docker(), "rmi"];
        argv.extend(tags.iter().map(String::as_str));
        self.runner.run_best_effort(&argv, CommandOptions::default()).await;
        println!("✅ Cleanup complete!");
        Ok(())
    }
}

/// List containers, optionally only the project's.
pub async fn ps<R: Runner>(runner: &R, tools: &Tools, project: Option<&Project>) -> Result<()> {
    println!("📦 Listing Docker containers...\n");
    let filter = project.map(|p| format!("name={}", p.container_name()));
    let mut argv = vec![tools.docker.as_str(), "ps", "-a"];
    if let Some(filter) = &filter {
        argv.extend(["--filter", filter.as_str()]);
    }
    argv.extend(["--format", PS_FORMAT]);
    runner.run(&argv, CommandOptions::default()).await?;
    Ok(())
}

pub async fn prune<R: Runner>(runner: &R, tools: &Tools) -> Result<()> {
    println!("🧹 Removing all stopped containers...");
    runner
        .run(&[tools.docker.as_str(), "container", "prune", "-f"], CommandOptions::default())
        .await?;
    println!("✅ All stopped containers removed!");
    Ok(())
}
