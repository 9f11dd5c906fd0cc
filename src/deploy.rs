//! Build and push project images to ECR.

use crate::config::{Project, Tools};
use crate::error::{MobyError, Result};
use crate::git;
use crate::shell::{CommandOptions, Runner};
use tracing::debug;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const LATEST_TAG: &str = "latest";
pub const REGISTRY_USER: &str = "AWS";

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployAction {
    /// Build image for deployment
    Build,
    /// Log in to ECR
    Login,
    /// Push image to ECR
    Push,
    /// Build and push to ECR
    All,
}

pub fn registry_host(account_id: &str, region: &str) -> String {
    format!("{account_id}.dkr.ecr.{region}.amazonaws.com")
}

pub struct Deploy<'a, R: Runner> {
    runner: &'a R,
    tools: &'a Tools,
    project: &'a Project,
    version: Option<String>,
    region: Option<String>,
}

impl<'a, R: Runner> Deploy<'a, R> {
    /// `version` and `region` are the explicit flag values, if any.
    pub fn new(
        runner: &'a R,
        tools: &'a Tools,
        project: &'a Project,
        version: Option<String>,
        region: Option<String>,
    ) -> Self {
        Deploy {
            runner,
            tools,
            project,
            version,
            region,
        }
    }

    pub async fn run(&self, action: DeployAction) -> Result<()> {
        match action {
            DeployAction::Build => {
                let version = self.version().await?;
                self.build(&version).await
            }
            DeployAction::Login => {
                let region = self.region().await;
                self.login(&region).await.map(|_| ())
            }
            DeployAction::Push => {
                let version = self.version().await?;
                self.push(&version).await?;
                println!("✅ Push complete");
                Ok(())
            }
            DeployAction::All => {
                let version = self.version().await?;
                self.build(&version).await?;
                let remote = self.push(&version).await?;
                println!("\n✨ Deployment complete!");
                println!("📦 Image: {remote}:{version}");
                Ok(())
            }
        }
    }

    fn docker(&self) -> &str {
        &self.tools.docker
    }

    fn aws(&self) -> &str {
        &self.tools.aws
    }

    /// Explicit version, else the git revision.
    pub async fn version(&self) -> Result<String> {
        let version = match &self.version {
            Some(v) => v.clone(),
            None => git::revision(self.runner, self.tools, self.project.path())
                .await
                .ok_or(MobyError::MissingVersion)?,
        };
        println!("🚀 Deploying version: {version}");
        Ok(version)
    }

    /// Explicit region, else the AWS CLI default, else `us-east-1`.
    pub async fn region(&self) -> String {
        if let Some(region) = &self.region {
            return region.clone();
        }
        let configured = self
            .runner
            .run(&[self.aws(), "configure", "get", "region"], CommandOptions::quiet())
            .await
            .map(|res| res.stdout.trim().to_string());
        match configured {
            Ok(region) if !region.is_empty() => region,
            _ => {
                debug!(region = DEFAULT_REGION, "no configured region");
                DEFAULT_REGION.to_string()
            }
        }
    }

    pub async fn build(&self, version: &str) -> Result<()> {
        println!("🏗️  Building deployment image...");
        let image = self.project.image_name();
        let versioned = format!("{image}:{version}");
        let latest = format!("{image}:{LATEST_TAG}");
        self.runner
            .run(
                &[self.docker(), "build", "-t", &versioned, "-t", &latest, "."],
                CommandOptions::default().in_dir(self.project.path()),
            )
            .await?;
        println!("✅ Build complete");
        Ok(())
    }

    pub async fn account_id(&self) -> Result<String> {
        let res = self
            .runner
            .run(
                &[self.aws(), "sts", "get-caller-identity", "--query", "Account", "--output", "text"],
                CommandOptions::quiet(),
            )
            .await?;
        Ok(res.stdout.trim().to_string())
    }

    /// Logs docker in to the account's registry and returns its host name.
    pub async fn login(&self, region: &str) -> Result<String> {
        println!("🔑 Logging into ECR...");
        let registry = registry_host(&self.account_id().await?, region);

        let password = self
            .runner
            .run(
                &[self.aws(), "ecr", "get-login-password", "--region", region],
                CommandOptions::quiet(),
            )
            .await?;

        self.runner
            .run(
                &[self.docker(), "login", "--username", REGISTRY_USER, "--password-stdin", &registry],
                CommandOptions::default().with_input(&password.stdout),
            )
            .await?;
        println!("✅ Successfully logged into ECR");
        Ok(registry)
    }

    /// Creates the repository unless it already exists.
    pub async fn ensure_repository(&self, region: &str) -> Result<()> {
        let repo = self.project.image_name();
        let exists = self
            .runner
            .run_best_effort(
                &[self.aws(), "ecr", "describe-repositories", "--repository-names", repo, "--region", region],
                CommandOptions::quiet(),
            )
            .await;
        if !exists {
            println!("📦 Creating ECR repository: {repo}");
            self.runner
                .run(
                    &[self.aws(), "ecr", "create-repository", "--repository-name", repo, "--region", region],
                    CommandOptions::default(),
                )
                .await?;
        }
        Ok(())
    }

    /// Login, ensure the repository, then tag and push `version` and `latest`.
    /// Returns the remote image name without tag.
    pub async fn push(&self, version: &str) -> Result<String> {
        let region = self.region().await;
        let registry = self.login(&region).await?;
        self.ensure_repository(&region).await?;

        let image = self.project.image_name();
        let remote = format!("{registry}/{image}");
        for tag in [version, LATEST_TAG] {
            let local_tag = format!("{image}:{tag}");
            let remote_tag = format!("{remote}:{tag}");
            println!("🏷️  Tagging: {local_tag} -> {remote_tag}");
            self.runner
                .run(&[self.docker(), "tag", &local_tag, &remote_tag], CommandOptions::default())
                .await?;
            println!("⬆️  Pushing: {remote_tag}");
            self.runner
                .run(&[self.docker(), "push", &remote_tag], CommandOptions::default())
                .await?;
        }
        Ok(remote)
    }
}
