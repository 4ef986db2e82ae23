use clap::Args;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Interface to bind (default: [server].bind, PATCHRELAY_BIND, or 0.0.0.0)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Port to listen on (default: [server].port, PATCHRELAY_PORT, or 8080)
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Serve the browser UI from --frontend-dir at /
    #[arg(long)]
    pub serve_frontend: bool,

    /// Directory containing index.html for --serve-frontend
    #[arg(long, default_value = "docs", value_name = "DIR")]
    pub frontend_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Remote repository to clone or reuse
    #[arg(long, value_name = "URL")]
    pub repository_url: String,

    /// Target branch for default mode (default: remote default branch)
    #[arg(long, value_name = "NAME")]
    pub branch: Option<String>,

    /// Branch to create in from_commit and orphan modes
    #[arg(long, value_name = "NAME")]
    pub new_branch: Option<String>,

    /// default, from_commit, or orphan
    #[arg(long, default_value = "default", value_name = "MODE")]
    pub branch_mode: String,

    /// Base reference for from_commit (blank or HEAD: remote default branch)
    #[arg(long, value_name = "REF")]
    pub base_commit: Option<String>,

    /// Commit message; without one nothing is committed or pushed
    #[arg(long, value_name = "TEXT")]
    pub commit_message: Option<String>,

    /// Allow a commit with no staged changes
    #[arg(long)]
    pub allow_empty_commit: bool,

    /// Unified diff to apply
    #[arg(long, value_name = "FILE")]
    pub patch_file: Option<PathBuf>,

    /// Index into [[git_users]]
    #[arg(long, value_name = "INDEX")]
    pub git_user: Option<String>,

    /// Index into [[ssh_keys]]
    #[arg(long, value_name = "INDEX")]
    pub ssh_key: Option<String>,
}

impl SubmitArgs {
    /// Field map in the same shape the HTTP and WebSocket gateways deliver.
    pub fn to_fields(&self, patch: Option<String>) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        let mut put = |key: &str, value: Option<&str>| {
            if let Some(value) = value {
                fields.insert(key.to_string(), value.to_string());
            }
        };
        put("repository_url", Some(self.repository_url.as_str()));
        put("branch", self.branch.as_deref());
        put("new_branch", self.new_branch.as_deref());
        put("branch_mode", Some(self.branch_mode.as_str()));
        put("base_commit", self.base_commit.as_deref());
        put("commit_message", self.commit_message.as_deref());
        put(
            "allow_empty_commit",
            self.allow_empty_commit.then_some("true"),
        );
        put("patch", patch.as_deref());
        put("git_user", self.git_user.as_deref());
        put("ssh_key_path", self.ssh_key.as_deref());
        fields
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Also list the environment variables that override the config file
    #[arg(long)]
    pub show_env: bool,
}
