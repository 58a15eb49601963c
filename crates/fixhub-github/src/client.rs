//! GitHub REST API access
//!
//! [`GithubApi`] is the seam the publisher, file service and context builder
//! depend on. [`GithubClient`] talks to the real API with an installation
//! token; [`MockGithubApi`] keeps repositories in memory for tests.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use fixhub_core::{FixhubError, GithubConfig, Result};
use parking_lot::Mutex;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::token_cache::{InstallationTokenCache, SignedToken, TokenExchange};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "fixhub";

/// Repository metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Commit a branch points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub sha: String,
}

/// A file as returned by the contents API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl FileContent {
    /// Build a base64-encoded entry the way GitHub returns it
    pub fn from_text(text: &str, sha: impl Into<String>) -> Self {
        Self {
            content: Some(STANDARD.encode(text)),
            sha: Some(sha.into()),
            encoding: Some("base64".to_string()),
            size: text.len() as u64,
        }
    }

    /// Decoded text; `None` when the API sent no content
    ///
    /// GitHub wraps base64 at 60 columns, so newlines are stripped first.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn decoded(&self) -> Result<Option<String>> {
        let Some(raw) = self.content.as_deref() else {
            return Ok(None);
        };

        let is_base64 = self
            .encoding
            .as_deref()
            .map_or(true, |e| e.eq_ignore_ascii_case("base64"));
        if !is_base64 {
            return Ok(Some(raw.to_string()));
        }

        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD.decode(compact.as_bytes()).map_err(|e| {
            FixhubError::MalformedResponse(format!("File content is not valid base64: {}", e))
        })?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// One entry of a git tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// A file write on a branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUpload {
    pub path: String,
    pub message: String,
    /// Plain text; encoded by the client
    pub content: String,
    pub branch: String,
    /// Blob being replaced; required by GitHub for updates, absent for creates
    pub sha: Option<String>,
}

/// Pull request to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

/// Pull request GitHub created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPullRequest {
    pub number: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// GitHub REST operations used by fixhub
#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<RepositoryInfo>;

    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<BranchRef>;

    /// Fails with [`FixhubError::InvalidInput`] when `path` is a directory
    async fn get_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<FileContent>;

    async fn create_branch(&self, owner: &str, repo: &str, branch: &str, sha: &str)
        -> Result<()>;

    async fn upload_content(&self, owner: &str, repo: &str, upload: &ContentUpload)
        -> Result<()>;

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<CreatedPullRequest>;

    async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        recursive: bool,
    ) -> Result<Vec<TreeEntry>>;
}

/// Unauthenticated HTTP plumbing shared by the App and installation flows
#[derive(Debug, Clone)]
pub struct GithubTransport {
    http: Client,
    api_url: String,
}

impl GithubTransport {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FixhubError::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_url: api_url.into(),
        })
    }

    pub fn from_config(config: &GithubConfig) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn request(&self, method: Method, path: &str, bearer: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        self.http
            .request(method, url)
            .bearer_auth(bearer)
            .header("Accept", GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| FixhubError::Http(format!("GitHub request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FixhubError::Http(format!("Failed to read GitHub response: {}", e)))?;

        if !status.is_success() {
            return Err(FixhubError::GithubApi {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

#[async_trait]
impl TokenExchange for GithubTransport {
    async fn create_installation_token(
        &self,
        installation_id: u64,
        jwt: &str,
    ) -> Result<SignedToken> {
        let path = format!("app/installations/{}/access_tokens", installation_id);
        let value = self.execute(self.request(Method::POST, &path, jwt)).await?;
        let response: AccessTokenResponse = from_value(value, "installation token")?;
        Ok(SignedToken {
            value: response.token,
            expires_at: response.expires_at,
        })
    }
}

/// Percent-encode each `/`-separated segment of a repository path or branch name
fn encode_segments(raw: &str) -> String {
    raw.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build `repos/{owner}/{repo}` with both parts encoded
fn repo_path(owner: &str, repo: &str) -> String {
    format!(
        "repos/{}/{}",
        urlencoding::encode(owner),
        urlencoding::encode(repo)
    )
}

fn from_value<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| FixhubError::MalformedResponse(format!("Unexpected {} response: {}", what, e)))
}

/// GitHub REST client authenticated as an App installation
#[derive(Clone)]
pub struct GithubClient {
    transport: GithubTransport,
    tokens: Arc<InstallationTokenCache>,
}

impl GithubClient {
    pub fn new(transport: GithubTransport, tokens: Arc<InstallationTokenCache>) -> Self {
        Self { transport, tokens }
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.send_with_query(method, path, &[], body).await
    }

    async fn send_with_query(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value> {
        let token = self.tokens.get_installation_token().await?;
        let mut request = self.transport.request(method, path, &token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.transport.execute(request).await
    }
}

#[derive(Deserialize)]
struct GitRefResponse {
    object: GitObject,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
}

#[async_trait]
impl GithubApi for GithubClient {
    #[instrument(skip(self))]
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<RepositoryInfo> {
        let value = self
            .send(Method::GET, &repo_path(owner, repo), None)
            .await?;
        from_value(value, "repository")
    }

    #[instrument(skip(self))]
    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<BranchRef> {
        let path = format!(
            "{}/git/ref/heads/{}",
            repo_path(owner, repo),
            encode_segments(branch)
        );
        let value = self.send(Method::GET, &path, None).await?;
        let git_ref: GitRefResponse = from_value(value, "branch ref")?;
        Ok(BranchRef {
            sha: git_ref.object.sha,
        })
    }

    #[instrument(skip(self))]
    async fn get_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<FileContent> {
        let api_path = format!(
            "{}/contents/{}",
            repo_path(owner, repo),
            encode_segments(path)
        );
        let value = self
            .send_with_query(Method::GET, &api_path, &[("ref", git_ref)], None)
            .await?;
        if value.is_array() {
            return Err(FixhubError::InvalidInput(format!(
                "{} is a directory; request a specific file",
                path
            )));
        }
        from_value(value, "file content")
    }

    #[instrument(skip(self))]
    async fn create_branch(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<()> {
        let body = json!({ "ref": format!("refs/heads/{}", branch), "sha": sha });
        self.send(
            Method::POST,
            &format!("{}/git/refs", repo_path(owner, repo)),
            Some(body),
        )
        .await?;
        debug!("Created branch {} at {}", branch, sha);
        Ok(())
    }

    #[instrument(skip(self, upload), fields(path = %upload.path, branch = %upload.branch))]
    async fn upload_content(&self, owner: &str, repo: &str, upload: &ContentUpload) -> Result<()> {
        let mut body = json!({
            "message": upload.message,
            "content": STANDARD.encode(&upload.content),
            "branch": upload.branch,
        });
        if let Some(sha) = &upload.sha {
            body["sha"] = Value::String(sha.clone());
        }
        let path = format!(
            "{}/contents/{}",
            repo_path(owner, repo),
            encode_segments(&upload.path)
        );
        self.send(Method::PUT, &path, Some(body)).await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(head = %request.head, base = %request.base))]
    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<CreatedPullRequest> {
        let body = json!({
            "title": request.title,
            "head": request.head,
            "base": request.base,
            "body": request.body,
        });
        let value = self
            .send(
                Method::POST,
                &format!("{}/pulls", repo_path(owner, repo)),
                Some(body),
            )
            .await?;
        from_value(value, "pull request")
    }

    #[instrument(skip(self))]
    async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        recursive: bool,
    ) -> Result<Vec<TreeEntry>> {
        let path = format!(
            "{}/git/trees/{}",
            repo_path(owner, repo),
            urlencoding::encode(sha)
        );
        let query: &[(&str, &str)] = if recursive { &[("recursive", "1")] } else { &[] };
        let value = self.send_with_query(Method::GET, &path, query, None).await?;
        let tree: TreeResponse = from_value(value, "tree")?;
        Ok(tree.tree)
    }
}

/// Mutable state behind [`MockGithubApi`]
#[derive(Debug, Default)]
struct MockState {
    repository: RepositoryInfo,
    branches: HashMap<String, String>,
    /// (path, ref) -> (content, sha)
    files: HashMap<(String, String), (String, String)>,
    directories: Vec<String>,
    tree: Vec<String>,
    failures: HashMap<String, (u16, String)>,
    content_requests: Vec<(String, String)>,
    created_branches: Vec<(String, String)>,
    uploads: Vec<ContentUpload>,
    pull_requests: Vec<NewPullRequest>,
    next_blob: u64,
}

/// In-memory GitHub for tests
///
/// Failures are injected per operation name (`get_branch`, `create_branch`,
/// `upload_content`, `create_pull_request`, `get_tree`, `get_repository`) or
/// per content path (`content:<path>`).
#[derive(Debug, Default, Clone)]
pub struct MockGithubApi {
    state: Arc<Mutex<MockState>>,
}

impl MockGithubApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(self, default_branch: &str, description: Option<&str>) -> Self {
        self.state.lock().repository = RepositoryInfo {
            default_branch: Some(default_branch.to_string()),
            description: description.map(str::to_string),
        };
        self
    }

    pub fn with_branch(self, branch: &str, sha: &str) -> Self {
        self.state
            .lock()
            .branches
            .insert(branch.to_string(), sha.to_string());
        self
    }

    /// Add a file on `git_ref` and list it in the tree
    pub fn with_file(self, git_ref: &str, path: &str, content: &str) -> Self {
        {
            let mut state = self.state.lock();
            state.next_blob += 1;
            let sha = format!("blob-{}", state.next_blob);
            state.files.insert(
                (path.to_string(), git_ref.to_string()),
                (content.to_string(), sha),
            );
            if !state.tree.iter().any(|p| p == path) {
                state.tree.push(path.to_string());
            }
        }
        self
    }

    pub fn with_directory(self, path: &str) -> Self {
        self.state.lock().directories.push(path.to_string());
        self
    }

    pub fn with_failure(self, operation: &str, status: u16, body: &str) -> Self {
        self.state
            .lock()
            .failures
            .insert(operation.to_string(), (status, body.to_string()));
        self
    }

    pub fn content_requests(&self) -> Vec<(String, String)> {
        self.state.lock().content_requests.clone()
    }

    pub fn created_branches(&self) -> Vec<(String, String)> {
        self.state.lock().created_branches.clone()
    }

    pub fn uploads(&self) -> Vec<ContentUpload> {
        self.state.lock().uploads.clone()
    }

    pub fn pull_requests(&self) -> Vec<NewPullRequest> {
        self.state.lock().pull_requests.clone()
    }

    /// Text of `path` on `git_ref`, including uploads
    pub fn file_text(&self, git_ref: &str, path: &str) -> Option<String> {
        self.state
            .lock()
            .files
            .get(&(path.to_string(), git_ref.to_string()))
            .map(|(content, _)| content.clone())
    }

    pub fn file_sha(&self, git_ref: &str, path: &str) -> Option<String> {
        self.state
            .lock()
            .files
            .get(&(path.to_string(), git_ref.to_string()))
            .map(|(_, sha)| sha.clone())
    }

    fn check_failure(state: &MockState, operation: &str) -> Result<()> {
        match state.failures.get(operation) {
            Some((status, body)) => Err(FixhubError::GithubApi {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }

    fn not_found() -> FixhubError {
        FixhubError::GithubApi {
            status: 404,
            body: r#"{"message":"Not Found"}"#.to_string(),
        }
    }
}

#[async_trait]
impl GithubApi for MockGithubApi {
    async fn get_repository(&self, _owner: &str, _repo: &str) -> Result<RepositoryInfo> {
        let state = self.state.lock();
        Self::check_failure(&state, "get_repository")?;
        Ok(state.repository.clone())
    }

    async fn get_branch(&self, _owner: &str, _repo: &str, branch: &str) -> Result<BranchRef> {
        let state = self.state.lock();
        Self::check_failure(&state, "get_branch")?;
        state
            .branches
            .get(branch)
            .map(|sha| BranchRef { sha: sha.clone() })
            .ok_or_else(Self::not_found)
    }

    async fn get_content(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<FileContent> {
        let mut state = self.state.lock();
        state
            .content_requests
            .push((path.to_string(), git_ref.to_string()));
        Self::check_failure(&state, &format!("content:{}", path))?;

        if state.directories.iter().any(|d| d == path) {
            return Err(FixhubError::InvalidInput(format!(
                "{} is a directory; request a specific file",
                path
            )));
        }

        state
            .files
            .get(&(path.to_string(), git_ref.to_string()))
            .map(|(content, sha)| FileContent::from_text(content, sha.clone()))
            .ok_or_else(Self::not_found)
    }

    async fn create_branch(&self, _owner: &str, _repo: &str, branch: &str, sha: &str) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_failure(&state, "create_branch")?;
        if state.branches.contains_key(branch) {
            return Err(FixhubError::GithubApi {
                status: 422,
                body: r#"{"message":"Reference already exists"}"#.to_string(),
            });
        }
        state.branches.insert(branch.to_string(), sha.to_string());
        state
            .created_branches
            .push((branch.to_string(), sha.to_string()));
        Ok(())
    }

    async fn upload_content(&self, _owner: &str, _repo: &str, upload: &ContentUpload) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_failure(&state, "upload_content")?;
        state.next_blob += 1;
        let sha = format!("blob-{}", state.next_blob);
        state.files.insert(
            (upload.path.clone(), upload.branch.clone()),
            (upload.content.clone(), sha),
        );
        state.uploads.push(upload.clone());
        Ok(())
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<CreatedPullRequest> {
        let mut state = self.state.lock();
        Self::check_failure(&state, "create_pull_request")?;
        state.pull_requests.push(request.clone());
        let number = state.pull_requests.len() as u64;
        Ok(CreatedPullRequest {
            number,
            html_url: Some(format!(
                "https://github.com/{}/{}/pull/{}",
                owner, repo, number
            )),
        })
    }

    async fn get_tree(
        &self,
        _owner: &str,
        _repo: &str,
        _sha: &str,
        _recursive: bool,
    ) -> Result<Vec<TreeEntry>> {
        let state = self.state.lock();
        Self::check_failure(&state, "get_tree")?;
        Ok(state
            .tree
            .iter()
            .map(|path| TreeEntry {
                path: path.clone(),
                kind: "blob".to_string(),
            })
            .collect())
    }
}
