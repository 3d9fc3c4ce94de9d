//! REST client for the remote `todos` resource
//!
//! ureq is blocking, so every request runs on tokio's blocking pool.

use crate::config::schema::ApiConfig;
use crate::error::{TallyError, TallyResult};
use crate::service::TodoService;
use crate::todo::{NewTodo, Todo, TodoPatch};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use tracing::debug;

const FETCH_FAILED: &str = "Fetch Failed";
const CREATE_FAILED: &str = "Create Todo Failed";
const UPDATE_FAILED: &str = "Update Todo Failed";
const DELETE_FAILED: &str = "Delete Todo Failed";

/// Everything but RFC 3986 unreserved characters; `.` stays encoded so an
/// id can never read as `.` or `..`
const ID_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'~');

/// PATCH body: the id plus whichever fields are set
#[derive(serde::Serialize)]
struct PatchBody<'a> {
    id: &'a str,
    #[serde(flatten)]
    patch: &'a TodoPatch,
}

/// `TodoService` backed by HTTP
#[derive(Clone)]
pub struct HttpTodoService {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpTodoService {
    pub fn new(config: &ApiConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(config.timeout())
            .build()
            .into();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/todos", self.base_url)
    }

    fn item_url(&self, id: &str) -> String {
        format!(
            "{}/todos/{}",
            self.base_url,
            utf8_percent_encode(id, ID_SEGMENT)
        )
    }

    /// Run a blocking request and decode its JSON body
    ///
    /// Any transport failure, non-success status or undecodable body maps to
    /// a service error labelled with `operation`.
    async fn run<T, F>(&self, operation: &'static str, request: F) -> TallyResult<T>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(&ureq::Agent) -> Result<ureq::http::Response<ureq::Body>, ureq::Error>
            + Send
            + 'static,
    {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || {
            let mut response = request(&agent).map_err(|e| TallyError::service(operation, e))?;
            response
                .body_mut()
                .read_json::<T>()
                .map_err(|e| TallyError::service(operation, e))
        })
        .await
        .map_err(|e| TallyError::Internal(format!("request task failed: {}", e)))?
    }
}

#[async_trait]
impl TodoService for HttpTodoService {
    async fn list(&self) -> TallyResult<Vec<Todo>> {
        let url = self.collection_url();
        debug!("GET {}", url);
        self.run(FETCH_FAILED, move |agent| agent.get(&url).call())
            .await
    }

    async fn get_by_id(&self, id: &str) -> TallyResult<Todo> {
        let url = self.item_url(id);
        debug!("GET {}", url);
        self.run(FETCH_FAILED, move |agent| agent.get(&url).call())
            .await
    }

    async fn create(&self, content: &str) -> TallyResult<Todo> {
        let url = self.collection_url();
        let body = serde_json::to_value(NewTodo::new(content))?;
        debug!("POST {}", url);
        self.run(CREATE_FAILED, move |agent| agent.post(&url).send_json(&body))
            .await
    }

    async fn update(&self, id: &str, patch: &TodoPatch) -> TallyResult<Todo> {
        let url = self.item_url(id);
        let body = serde_json::to_value(PatchBody { id, patch })?;
        debug!("PATCH {}", url);
        self.run(UPDATE_FAILED, move |agent| agent.patch(&url).send_json(&body))
            .await
    }

    async fn delete(&self, id: &str) -> TallyResult<Todo> {
        let url = self.item_url(id);
        debug!("DELETE {}", url);
        self.run(DELETE_FAILED, move |agent| agent.delete(&url).call())
            .await
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_strip_trailing_slash() {
        let service = HttpTodoService::new(&ApiConfig {
            base_url: "http://localhost:3000/".to_string(),
            timeout_secs: 1,
        });
        assert_eq!(service.collection_url(), "http://localhost:3000/todos");
        assert_eq!(service.item_url("7"), "http://localhost:3000/todos/7");
    }

    #[test]
    fn item_url_encodes_id_as_one_segment() {
        let service = HttpTodoService::new(&ApiConfig::default());
        let base = service.collection_url();

        assert_eq!(service.item_url("a1-b_2"), format!("{}/a1-b_2", base));
        assert_eq!(service.item_url("../x"), format!("{}/%2E%2E%2Fx", base));
        assert_eq!(service.item_url("a?b"), format!("{}/a%3Fb", base));
        assert_eq!(service.item_url("a b#c"), format!("{}/a%20b%23c", base));
    }

    #[test]
    fn patch_body_carries_id_and_set_fields_only() {
        let patch = TodoPatch::done(true);
        let body = serde_json::to_value(PatchBody { id: "1", patch: &patch }).unwrap();
        assert_eq!(body, serde_json::json!({"id": "1", "isDone": true}));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_service_error() {
        // Port 9 (discard) is closed on test machines; connection is refused
        let service = HttpTodoService::new(&ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
        });

        let err = service.list().await.unwrap_err();
        assert!(err.is_service());
        assert!(err.to_string().starts_with("Fetch Failed"));
    }
}
