//! GitHub REST API revision source.
//!
//! Lists commits touching a file with the paginated commits endpoint and
//! fetches raw file content per commit with the contents endpoint.

use changelens_core::{ChangelensError, GithubConfig, RevisionDescriptor};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::source::{RevisionSource, SourceMode};

/// A file on GitHub, identified by repository, ref and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubFileRef {
    pub owner: String,
    pub repo: String,
    /// Branch, tag or commit the blob URL pointed at.
    pub ref_name: String,
    pub path: String,
}

/// Parse a GitHub blob URL into its parts.
///
/// # Errors
///
/// Returns [`ChangelensError::InvalidReference`] if the URL is not of the
/// form `https://github.com/{owner}/{repo}/blob/{ref}/{path}`.
///
/// # Examples
///
/// ```
/// use changelens_history::github::parse_github_url;
///
/// let file = parse_github_url(
///     "https://github.com/acme/petstore/blob/main/specs/openapi.json",
/// ).unwrap();
/// assert_eq!(file.owner, "acme");
/// assert_eq!(file.repo, "petstore");
/// assert_eq!(file.ref_name, "main");
/// assert_eq!(file.path, "specs/openapi.json");
/// ```
pub fn parse_github_url(url: &str) -> Result<GithubFileRef, ChangelensError> {
    let invalid = || {
        ChangelensError::InvalidReference(format!(
            "'{url}' is not a GitHub file URL, expected https://github.com/owner/repo/blob/ref/path"
        ))
    };
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
        .or_else(|| url.strip_prefix("github.com/"))
        .ok_or_else(invalid)?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);

    let mut parts = rest.splitn(5, '/');
    let owner = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let repo = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    match parts.next() {
        Some("blob") | Some("tree") => {}
        _ => return Err(invalid()),
    }
    let ref_name = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let path = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;

    Ok(GithubFileRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        ref_name: ref_name.to_string(),
        path: path.to_string(),
    })
}

/// Returns true when `input` looks like a GitHub URL rather than a local path.
pub fn is_github_url(input: &str) -> bool {
    input.starts_with("https://github.com/")
        || input.starts_with("http://github.com/")
        || input.starts_with("github.com/")
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    message: String,
    author: Option<ApiSignature>,
    committer: Option<ApiSignature>,
}

#[derive(Debug, Deserialize)]
struct ApiSignature {
    name: Option<String>,
    email: Option<String>,
    date: Option<DateTime<Utc>>,
}

impl ApiCommit {
    fn into_descriptor(self) -> RevisionDescriptor {
        let signature = self.commit.author.or(self.commit.committer);
        let (author, author_email, timestamp) = match signature {
            Some(sig) => (
                sig.name.unwrap_or_default(),
                sig.email.unwrap_or_default(),
                sig.date.unwrap_or_default(),
            ),
            None => (String::new(), String::new(), DateTime::<Utc>::default()),
        };
        RevisionDescriptor {
            id: self.sha,
            message: self.commit.message.lines().next().unwrap_or("").to_string(),
            author,
            author_email,
            timestamp,
        }
    }
}

/// A file's history read through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubSource {
    http: reqwest::Client,
    file: GithubFileRef,
    api_base: String,
    token: Option<String>,
    per_page: u8,
    max_commits: Option<usize>,
}

impl GithubSource {
    /// Create a source for `file`. The token is optional; anonymous requests
    /// work for public repositories but are heavily rate limited.
    pub fn new(file: GithubFileRef, config: &GithubConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            file,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.resolve_token(),
            per_page: config.per_page.clamp(1, 100),
            max_commits: None,
        }
    }

    /// Stop paginating once this many commits have been listed.
    pub fn with_max_commits(mut self, max: Option<usize>) -> Self {
        self.max_commits = max;
        self
    }

    pub fn file(&self) -> &GithubFileRef {
        &self.file
    }

    /// `api_base` extended with `segments`, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ChangelensError> {
        let invalid = || ChangelensError::Github(format!("invalid API base '{}'", self.api_base));
        let mut url = reqwest::Url::parse(&self.api_base).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn commits_url(&self, page: u32) -> Result<reqwest::Url, ChangelensError> {
        let file = &self.file;
        let mut url = self.endpoint(&["repos", file.owner.as_str(), file.repo.as_str(), "commits"])?;
        url.query_pairs_mut()
            .append_pair("sha", &file.ref_name)
            .append_pair("path", &file.path)
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    fn contents_url(&self, sha: &str) -> Result<reqwest::Url, ChangelensError> {
        let file = &self.file;
        let mut segments = vec!["repos", file.owner.as_str(), file.repo.as_str(), "contents"];
        segments.extend(file.path.split('/'));
        let mut url = self.endpoint(&segments)?;
        url.query_pairs_mut().append_pair("ref", sha);
        Ok(url)
    }

    fn request(&self, url: reqwest::Url, accept: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .get(url)
            .header("Accept", accept)
            .header("User-Agent", "changelens")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn get(
        &self,
        url: &reqwest::Url,
        accept: &str,
    ) -> Result<reqwest::Response, ChangelensError> {
        let response = self
            .request(url.clone(), accept)
            .send()
            .await
            .map_err(|e| ChangelensError::Github(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChangelensError::Github(format!(
                "GitHub API error {status}: {body}"
            )));
        }
        Ok(response)
    }
}

impl RevisionSource for GithubSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Remote
    }

    fn describe(&self) -> String {
        format!("{}/{}:{}", self.file.owner, self.file.repo, self.file.path)
    }

    async fn list(&self) -> Result<Vec<RevisionDescriptor>, ChangelensError> {
        let mut revisions = Vec::new();
        let mut page = 1;
        loop {
            let url = self.commits_url(page)?;
            let commits: Vec<ApiCommit> = self
                .get(&url, "application/vnd.github+json")
                .await?
                .json()
                .await
                .map_err(|e| ChangelensError::Github(format!("bad commits payload: {e}")))?;

            let received = commits.len();
            tracing::debug!(page, received, "fetched commit page");
            revisions.extend(commits.into_iter().map(ApiCommit::into_descriptor));

            if let Some(max) = self.max_commits {
                if revisions.len() >= max {
                    revisions.truncate(max);
                    break;
                }
            }
            if received < usize::from(self.per_page) {
                break;
            }
            page += 1;
        }
        Ok(revisions)
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, ChangelensError> {
        let url = self.contents_url(id)?;
        let bytes = self
            .get(&url, "application/vnd.github.raw+json")
            .await?
            .bytes()
            .await
            .map_err(|e| ChangelensError::Github(format!("failed to read {url}: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> GithubSource {
        let file = parse_github_url("https://github.com/acme/petstore/blob/main/api/openapi.json")
            .unwrap();
        let config = GithubConfig {
            token: Some("t0ken".into()),
            per_page: 50,
            ..GithubConfig::default()
        };
        GithubSource::new(file, &config)
    }

    #[test]
    fn parse_url_with_nested_path() {
        let file = parse_github_url("https://github.com/a/b/blob/v1.2/x/y/z.yaml").unwrap();
        assert_eq!(file.ref_name, "v1.2");
        assert_eq!(file.path, "x/y/z.yaml");
    }

    #[test]
    fn parse_url_strips_query() {
        let file = parse_github_url("https://github.com/a/b/blob/main/spec.json?plain=1").unwrap();
        assert_eq!(file.path, "spec.json");
    }

    #[test]
    fn parse_url_rejects_repo_root() {
        assert!(parse_github_url("https://github.com/a/b").is_err());
        assert!(parse_github_url("https://github.com/a/b/blob/main").is_err());
        assert!(parse_github_url("https://gitlab.com/a/b/blob/main/x.json").is_err());
        assert!(parse_github_url("https://github.com/a/b/pulls/1/x").is_err());
    }

    #[test]
    fn recognizes_github_urls() {
        assert!(is_github_url("https://github.com/a/b/blob/main/x.json"));
        assert!(!is_github_url("specs/openapi.json"));
    }

    #[test]
    fn builds_api_urls() {
        let source = source();
        assert_eq!(
            source.commits_url(2).unwrap().as_str(),
            "https://api.github.com/repos/acme/petstore/commits?sha=main&path=api%2Fopenapi.json&per_page=50&page=2"
        );
        assert_eq!(
            source.contents_url("abc123").unwrap().as_str(),
            "https://api.github.com/repos/acme/petstore/contents/api/openapi.json?ref=abc123"
        );
        assert_eq!(source.describe(), "acme/petstore:api/openapi.json");
        assert_eq!(source.mode(), SourceMode::Remote);
    }

    #[test]
    fn api_urls_encode_paths_and_refs() {
        let file = GithubFileRef {
            owner: "acme".into(),
            repo: "petstore".into(),
            ref_name: "release/2.0".into(),
            path: "specs/pet store#v2.json".into(),
        };
        let config = GithubConfig {
            api_base: "https://ghe.example.com/api/v3/".into(),
            ..GithubConfig::default()
        };
        let source = GithubSource::new(file, &config);
        assert_eq!(
            source.contents_url("abc 123").unwrap().as_str(),
            "https://ghe.example.com/api/v3/repos/acme/petstore/contents/specs/pet%20store%23v2.json?ref=abc+123"
        );
        let commits = source.commits_url(1).unwrap();
        assert_eq!(commits.path(), "/api/v3/repos/acme/petstore/commits");
        let query: Vec<(String, String)> = commits.query_pairs().into_owned().collect();
        assert_eq!(query[0], ("sha".into(), "release/2.0".into()));
        assert_eq!(query[1], ("path".into(), "specs/pet store#v2.json".into()));
    }

    #[test]
    fn commit_payload_maps_to_descriptor() {
        let json = r#"[{
            "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
            "commit": {
                "message": "Add pets endpoint\n\nLonger body",
                "author": {"name": "Dana", "email": "dana@example.com", "date": "2024-03-01T10:00:00Z"},
                "committer": {"name": "GitHub", "email": "noreply@github.com", "date": "2024-03-02T10:00:00Z"}
            }
        }]"#;
        let commits: Vec<ApiCommit> = serde_json::from_str(json).unwrap();
        let desc = commits.into_iter().next().unwrap().into_descriptor();
        assert_eq!(desc.message, "Add pets endpoint");
        assert_eq!(desc.author, "Dana");
        assert_eq!(desc.author_email, "dana@example.com");
        assert_eq!(desc.timestamp.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn commit_without_author_falls_back_to_committer() {
        let json = r#"{
            "sha": "abc",
            "commit": {
                "message": "m",
                "author": null,
                "committer": {"name": "bot", "email": "bot@example.com", "date": "2024-01-01T00:00:00Z"}
            }
        }"#;
        let commit: ApiCommit = serde_json::from_str(json).unwrap();
        assert_eq!(commit.into_descriptor().author, "bot");
    }
}
