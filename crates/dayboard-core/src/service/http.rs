use async_trait::async_trait;
use dayboard_shared::{ProjectCreate, ProjectDto, ProjectPatch, TaskCreate, TaskDto, TaskPatch};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::{ServiceError, TaskService};

/// REST client for the task service. Requests carry no timeout: a call that
/// never answers never resolves.
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    client: Client,
    base: Url,
}

impl HttpTaskService {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        let base = Url::parse(base_url)
            .map_err(|err| ServiceError::Transport(format!("invalid base url {base_url}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(ServiceError::Transport(format!(
                "base url {base_url} cannot carry a path"
            )));
        }
        let client = Client::builder()
            .build()
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        Ok(Self { client, base })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::Transport(format!("base url {} cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ServiceError> {
        let url = self.url(segments)?;
        debug!(%method, %url, "task service request");

        let mut request = self
            .client
            .request(method, url.clone())
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(url.path().to_string()));
        }
        if !status.is_success() {
            return Err(ServiceError::Rejected {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }
        Ok(bytes.to_vec())
    }

    async fn send_json<R, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<R, ServiceError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| ServiceError::Decode(format!("failed to encode request: {err}")))?;
        let bytes = self.send(method, segments, payload).await?;
        serde_json::from_slice(&bytes).map_err(|err| ServiceError::Decode(err.to_string()))
    }
}

#[async_trait]
impl TaskService for HttpTaskService {
    #[instrument(skip(self))]
    async fn list_tasks(&self) -> Result<Vec<TaskDto>, ServiceError> {
        self.send_json::<_, ()>(Method::GET, &["tasks"], None).await
    }

    #[instrument(skip(self))]
    async fn list_projects(&self) -> Result<Vec<ProjectDto>, ServiceError> {
        self.send_json::<_, ()>(Method::GET, &["projects"], None).await
    }

    #[instrument(skip(self, create), fields(title_len = create.title.len()))]
    async fn create_task(&self, create: TaskCreate) -> Result<TaskDto, ServiceError> {
        self.send_json(Method::POST, &["tasks"], Some(&create)).await
    }

    #[instrument(skip(self, patch))]
    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<TaskDto, ServiceError> {
        self.send_json(Method::PATCH, &["tasks", id], Some(&patch)).await
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, id: &str) -> Result<(), ServiceError> {
        self.send(Method::DELETE, &["tasks", id], None).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn restore_task(&self, id: &str) -> Result<TaskDto, ServiceError> {
        self.send_json::<_, ()>(Method::POST, &["tasks", id, "restore"], None)
            .await
    }

    #[instrument(skip(self))]
    async fn permanently_delete_task(&self, id: &str) -> Result<(), ServiceError> {
        self.send(Method::DELETE, &["tasks", id, "permanent"], None)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, create), fields(name = %create.name))]
    async fn create_project(&self, create: ProjectCreate) -> Result<ProjectDto, ServiceError> {
        self.send_json(Method::POST, &["projects"], Some(&create)).await
    }

    #[instrument(skip(self, patch))]
    async fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<ProjectDto, ServiceError> {
        self.send_json(Method::PATCH, &["projects", id], Some(&patch)).await
    }

    #[instrument(skip(self))]
    async fn delete_project(&self, id: &str) -> Result<(), ServiceError> {
        self.send(Method::DELETE, &["projects", id], None).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::HttpTaskService;

    #[test]
    fn builds_escaped_resource_urls() {
        let service = HttpTaskService::new("http://127.0.0.1:8080/api/").expect("service");
        let url = service.url(&["tasks", "a b/c", "restore"]).expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/api/tasks/a%20b%2Fc/restore");
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(HttpTaskService::new("not a url").is_err());
        assert!(HttpTaskService::new("mailto:someone@example.com").is_err());
    }
}
