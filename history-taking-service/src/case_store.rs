use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

/// Remote store holding case and reference documents.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// File names under `folder`. Fails soft: any non-success listing
    /// response yields an empty list.
    async fn list_files(&self, folder: &str) -> anyhow::Result<Vec<String>>;

    /// Raw bytes of one file. A non-success response is an error; the caller
    /// decides whether to skip or surface it.
    async fn fetch_file(&self, folder: &str, name: &str) -> anyhow::Result<Vec<u8>>;

    /// Browser-facing download link for the reference sidebar.
    fn download_url(&self, folder: &str, name: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    name: String,
    #[serde(rename = "type")]
    entry_type: String,
}

/// GitHub-backed [`CaseStore`] using the contents API for listings and the
/// raw host for file bodies.
pub struct GithubCaseStore {
    client: reqwest::Client,
    api_base: String,
    raw_base: String,
    repo: String,
    branch: String,
}

impl GithubCaseStore {
    pub fn new(repo: String, branch: String) -> Self {
        Self::with_hosts(
            "https://api.github.com".to_string(),
            "https://raw.githubusercontent.com".to_string(),
            repo,
            branch,
        )
    }

    /// Hosts are injectable so tests can point at a local mock server.
    pub fn with_hosts(api_base: String, raw_base: String, repo: String, branch: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            raw_base,
            repo,
            branch,
        }
    }
}

#[async_trait]
impl CaseStore for GithubCaseStore {
    async fn list_files(&self, folder: &str) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/repos/{}/contents/{}", self.api_base, self.repo, folder);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "history-taking-service")
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(
                status = %response.status(),
                folder,
                "file listing did not succeed, returning empty list"
            );
            return Ok(Vec::new());
        }

        let entries: Vec<ContentsEntry> = response.json().await?;
        let files = entries
            .into_iter()
            .filter(|e| e.entry_type == "file")
            .map(|e| e.name)
            .collect::<Vec<_>>();

        info!(folder, count = files.len(), "listed remote files");
        Ok(files)
    }

    async fn fetch_file(&self, folder: &str, name: &str) -> anyhow::Result<Vec<u8>> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_base,
            self.repo,
            self.branch,
            folder,
            urlencoding::encode(name)
        );
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "fetch of {}/{} failed with status {}",
                folder,
                name,
                response.status()
            );
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn download_url(&self, folder: &str, name: &str) -> String {
        format!(
            "https://github.com/{}/raw/{}/{}/{}",
            self.repo,
            self.branch,
            folder,
            urlencoding::encode(name)
        )
    }
}
