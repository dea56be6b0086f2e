//! GitHub-backed forge client.
//!
//! A thin REST wrapper: repository coordinates are fixed at construction
//! and every method maps to one or two API calls. No orchestration logic
//! lives here.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use pubflow_core::error::{Error, Result};
use pubflow_core::forge::{
    CheckAction, CheckConclusion, CheckOutput, CommitInfo, Deployment, DeploymentState,
    ForgeClient, NewDeployment, NewFile, PullRequest, TagRef,
};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const PAGE_SIZE: u32 = 100;

/// Forge client for one GitHub repository.
pub struct GithubClient {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
}

impl GithubClient {
    /// Creates a client authenticated with a token against the public
    /// GitHub API.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: &str) -> Result<Self> {
        Self::with_api_base(owner, repo, token, DEFAULT_API_BASE)
    }

    /// Creates a client against a custom API base (GitHub Enterprise or a
    /// test server).
    pub fn with_api_base(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: &str,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|e| Error::Forge(format!("invalid token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("pubflow"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Forge(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            repo: repo.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_base, self.owner, self.repo, path)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        match self.request_optional(method, path, body).await? {
            Some(value) => Ok(value),
            None => Err(Error::Forge(format!("not found: {path}"))),
        }
    }

    /// Like [`Self::request`] but maps 404 to `None`.
    async fn request_optional<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<T>> {
        let url = self.url(path);
        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::Forge(format!("{method} {path}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Forge(format!("{method} {path}: {status}: {body}")));
        }
        if status == StatusCode::NO_CONTENT {
            // Endpoints with empty bodies deserialize from null.
            return Ok(Some(serde_json::from_value(Value::Null)?));
        }
        let value = response
            .json()
            .await
            .map_err(|e| Error::Forge(format!("{method} {path}: invalid response: {e}")))?;
        Ok(Some(value))
    }
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    message: String,
    tree: ApiObject,
}

#[derive(Debug, Deserialize)]
struct ApiObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    git_ref: String,
    object: ApiObject,
}

#[derive(Debug, Deserialize)]
struct ApiContents {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiPull {
    number: u64,
    head: ApiPullHead,
}

#[derive(Debug, Deserialize)]
struct ApiPullHead {
    #[serde(rename = "ref")]
    git_ref: String,
    repo: ApiRepoId,
}

#[derive(Debug, Deserialize)]
struct ApiRepoId {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ApiDeployment {
    id: u64,
    sha: String,
    task: String,
    payload: Value,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiCheckSuite {
    total_count: u64,
    check_runs: Vec<ApiCheckRun>,
}

#[derive(Debug, Deserialize)]
struct ApiCheckRun {
    output: ApiCheckOutput,
}

#[derive(Debug, Deserialize)]
struct ApiCheckOutput {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiId {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ApiPullNumber {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct ApiSha {
    sha: String,
}

impl From<ApiCommit> for CommitInfo {
    fn from(commit: ApiCommit) -> Self {
        CommitInfo {
            sha: commit.sha,
            tree_sha: commit.commit.tree.sha,
            message: commit.commit.message,
        }
    }
}

fn check_output_json(output: &CheckOutput) -> Value {
    json!({
        "title": output.title,
        "summary": output.summary,
        "text": output.text,
    })
}

#[async_trait]
impl ForgeClient for GithubClient {
    async fn get_commit(&self, sha: &str) -> Result<CommitInfo> {
        let commit: ApiCommit = self
            .request(Method::GET, &format!("/commits/{sha}"), None)
            .await?;
        Ok(commit.into())
    }

    async fn list_commits(&self, sha: &str, page: u32, per_page: u32) -> Result<Vec<CommitInfo>> {
        let commits: Vec<ApiCommit> = self
            .request(
                Method::GET,
                &format!("/commits?sha={sha}&page={page}&per_page={per_page}"),
                None,
            )
            .await?;
        Ok(commits.into_iter().map(CommitInfo::from).collect())
    }

    async fn list_tags(&self, prefix: &str) -> Result<Vec<TagRef>> {
        let mut tags = Vec::new();
        let mut page = 1;
        loop {
            let refs: Option<Vec<ApiRef>> = self
                .request_optional(
                    Method::GET,
                    &format!("/git/matching-refs/tags/{prefix}?page={page}&per_page={PAGE_SIZE}"),
                    None,
                )
                .await?;
            let refs = refs.unwrap_or_default();
            let len = refs.len();
            for r in refs {
                let name = r
                    .git_ref
                    .strip_prefix("refs/tags/")
                    .unwrap_or(&r.git_ref)
                    .to_string();
                tags.push(TagRef {
                    name,
                    sha: r.object.sha,
                });
            }
            if (len as u32) < PAGE_SIZE {
                return Ok(tags);
            }
            page += 1;
        }
    }

    async fn branch_head(&self, branch: &str) -> Result<String> {
        let r: ApiRef = self
            .request(Method::GET, &format!("/git/ref/heads/{branch}"), None)
            .await?;
        Ok(r.object.sha)
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        let body = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        let _: Value = self.request(Method::POST, "/git/refs", Some(&body)).await?;
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        let _: Option<Value> = self
            .request_optional(Method::DELETE, &format!("/git/refs/heads/{branch}"), None)
            .await?;
        Ok(())
    }

    async fn get_file(&self, path: &str, git_ref: &str) -> Result<Option<String>> {
        let contents: Option<ApiContents> = self
            .request_optional(
                Method::GET,
                &format!("/contents/{path}?ref={git_ref}"),
                None,
            )
            .await?;
        match contents {
            None => Ok(None),
            Some(contents) => {
                let encoded: String = contents
                    .content
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| Error::Forge(format!("invalid blob encoding for {path}: {e}")))?;
                String::from_utf8(bytes)
                    .map(Some)
                    .map_err(|e| Error::Forge(format!("non-UTF-8 blob at {path}: {e}")))
            }
        }
    }

    async fn commit_files(
        &self,
        base_tree_sha: &str,
        parent_sha: &str,
        message: &str,
        files: &[NewFile],
    ) -> Result<String> {
        let tree: Vec<Value> = files
            .iter()
            .map(|file| {
                json!({
                    "path": file.path,
                    "mode": "100644",
                    "type": "blob",
                    "content": file.content,
                })
            })
            .collect();

        let tree_body = json!({ "base_tree": base_tree_sha, "tree": tree });
        let tree: ApiSha = self
            .request(Method::POST, "/git/trees", Some(&tree_body))
            .await?;

        let commit_body = json!({
            "message": message,
            "tree": tree.sha,
            "parents": [parent_sha],
        });
        let commit: ApiSha = self
            .request(Method::POST, "/git/commits", Some(&commit_body))
            .await?;
        Ok(commit.sha)
    }

    async fn create_pull(&self, title: &str, head: &str, base: &str) -> Result<u64> {
        let body = json!({
            "title": title,
            "head": head,
            "base": base,
            "draft": true,
            "maintainer_can_modify": true,
        });
        let pull: ApiPullNumber = self.request(Method::POST, "/pulls", Some(&body)).await?;
        Ok(pull.number)
    }

    async fn update_pull_body(&self, number: u64, body: &str) -> Result<()> {
        let body = json!({ "body": body });
        let _: Value = self
            .request(Method::PATCH, &format!("/pulls/{number}"), Some(&body))
            .await?;
        Ok(())
    }

    async fn list_open_pulls(&self, base: &str) -> Result<Vec<PullRequest>> {
        let pulls: Vec<ApiPull> = self
            .request(
                Method::GET,
                &format!("/pulls?state=open&base={base}&per_page={PAGE_SIZE}"),
                None,
            )
            .await?;
        Ok(pulls
            .into_iter()
            .map(|pull| PullRequest {
                number: pull.number,
                head_ref: pull.head.git_ref,
                head_repo_id: pull.head.repo.id,
            })
            .collect())
    }

    async fn create_deployment(&self, deployment: &NewDeployment) -> Result<u64> {
        let body = json!({
            "ref": deployment.git_ref,
            "task": deployment.task,
            "auto_merge": false,
            "required_contexts": [],
            "payload": deployment.payload,
            "environment": deployment.environment,
            "description": deployment.description,
        });
        let created: ApiId = self
            .request(Method::POST, "/deployments", Some(&body))
            .await?;
        Ok(created.id)
    }

    async fn list_deployments(&self, git_ref: &str, task: &str) -> Result<Vec<Deployment>> {
        let deployments: Vec<ApiDeployment> = self
            .request(
                Method::GET,
                &format!("/deployments?ref={git_ref}&task={task}&per_page={PAGE_SIZE}"),
                None,
            )
            .await?;
        Ok(deployments
            .into_iter()
            .map(|d| Deployment {
                id: d.id,
                sha: d.sha,
                task: d.task,
                payload: d.payload,
                updated_at: d.updated_at,
            })
            .collect())
    }

    async fn create_deployment_status(
        &self,
        deployment_id: u64,
        state: DeploymentState,
    ) -> Result<()> {
        let body = json!({ "state": state.as_str() });
        let _: Value = self
            .request(
                Method::POST,
                &format!("/deployments/{deployment_id}/statuses"),
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn create_check(
        &self,
        name: &str,
        head_sha: &str,
        conclusion: Option<CheckConclusion>,
        output: Option<CheckOutput>,
        actions: &[CheckAction],
    ) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let mut body = json!({
            "name": name,
            "head_sha": head_sha,
            "started_at": now,
        });
        match conclusion {
            Some(conclusion) => {
                body["status"] = json!("completed");
                body["conclusion"] = json!(conclusion.as_str());
                body["completed_at"] = json!(now);
            }
            None => {
                body["status"] = json!("in_progress");
            }
        }
        if let Some(output) = &output {
            body["output"] = check_output_json(output);
        }
        if !actions.is_empty() {
            body["actions"] = actions
                .iter()
                .map(|action| {
                    json!({
                        "identifier": action.identifier,
                        "label": action.label,
                        "description": action.description,
                    })
                })
                .collect();
        }
        let check: ApiId = self
            .request(Method::POST, "/check-runs", Some(&body))
            .await?;
        Ok(check.id)
    }

    async fn complete_check(&self, check_id: u64, conclusion: CheckConclusion) -> Result<()> {
        let body = json!({
            "status": "completed",
            "conclusion": conclusion.as_str(),
            "completed_at": Utc::now().to_rfc3339(),
        });
        let _: Value = self
            .request(Method::PATCH, &format!("/check-runs/{check_id}"), Some(&body))
            .await?;
        Ok(())
    }

    async fn latest_check_text(&self, sha: &str, check_name: &str) -> Result<Option<String>> {
        let suite: ApiCheckSuite = self
            .request(
                Method::GET,
                &format!(
                    "/commits/{sha}/check-runs?check_name={check_name}&status=completed&filter=latest&per_page=1"
                ),
                None,
            )
            .await?;
        if suite.total_count == 0 {
            return Ok(None);
        }
        Ok(suite.check_runs.into_iter().next().and_then(|run| run.output.text))
    }

    async fn create_release(
        &self,
        tag_name: &str,
        target_sha: &str,
        title: &str,
        body: &str,
    ) -> Result<()> {
        let body = json!({
            "tag_name": tag_name,
            "target_commitish": target_sha,
            "name": title,
            "body": body,
        });
        let _: Value = self.request(Method::POST, "/releases", Some(&body)).await?;
        Ok(())
    }
}
