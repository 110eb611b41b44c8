//! API client for the Kruize recommendation service

use anyhow::{Context, Result};
use kruize_lib::record::ExperimentSummary;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

pub mod endpoints {
    pub const CREATE_PERFORMANCE_PROFILE: &str = "createPerformanceProfile";
    pub const CREATE_EXPERIMENT: &str = "createExperiment";
    pub const UPDATE_RESULTS: &str = "updateResults";
    pub const LIST_EXPERIMENTS: &str = "listExperiments";
    pub const LIST_RECOMMENDATIONS: &str = "listRecommendations";
    pub const UPDATE_RECOMMENDATIONS: &str = "updateRecommendations";
}

/// API client for the recommendation service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Send a request and return the body of a successful response
    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        debug!(url = %response.url(), status = %status, "Service responded");

        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }

        Ok(body)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let request = self.client.get(self.url(path)?).query(query);
        let body = self.send(request).await?;
        serde_json::from_str(&body).context("Failed to parse response")
    }

    /// Make a POST request with JSON body
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let request = self.client.post(self.url(path)?).json(body);
        let body = self.send(request).await?;
        Ok(ApiResponse::from_body(body))
    }

    pub async fn create_performance_profile(
        &self,
        profile: &serde_json::Value,
    ) -> Result<ApiResponse> {
        self.post(endpoints::CREATE_PERFORMANCE_PROFILE, profile).await
    }

    /// Post experiment definitions; callers validate them first
    pub async fn create_experiment<B: Serialize + ?Sized>(
        &self,
        experiments: &B,
    ) -> Result<ApiResponse> {
        self.post(endpoints::CREATE_EXPERIMENT, experiments).await
    }

    pub async fn update_results<B: Serialize + ?Sized>(&self, results: &B) -> Result<ApiResponse> {
        self.post(endpoints::UPDATE_RESULTS, results).await
    }

    pub async fn list_experiments(&self) -> Result<Vec<ExperimentSummary>> {
        self.get(endpoints::LIST_EXPERIMENTS, &[]).await
    }

    pub async fn list_recommendations(
        &self,
        experiment_name: &str,
    ) -> Result<Vec<ExperimentRecommendations>> {
        self.get(
            endpoints::LIST_RECOMMENDATIONS,
            &[("experiment_name", experiment_name)],
        )
        .await
    }

    /// Ask the service to generate recommendations up to `interval_end_time`
    pub async fn update_recommendations(
        &self,
        experiment_name: &str,
        interval_end_time: Option<&str>,
    ) -> Result<Vec<ExperimentRecommendations>> {
        let mut query = vec![("experiment_name", experiment_name)];
        if let Some(end) = interval_end_time {
            query.push(("interval_end_time", end));
        }

        let request = self
            .client
            .post(self.url(endpoints::UPDATE_RECOMMENDATIONS)?)
            .query(&query);
        let body = self.send(request).await?;
        serde_json::from_str(&body).context("Failed to parse response")
    }
}

// API response types

/// Status document returned by the service's write endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub httpcode: Option<u16>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ApiResponse {
    /// Bodies that are not a status document are kept as the message
    fn from_body(body: String) -> Self {
        match serde_json::from_str(&body) {
            Ok(response) => response,
            Err(_) => Self {
                message: body,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRecommendations {
    pub experiment_name: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub kubernetes_objects: Vec<RecommendedObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedObject {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub containers: Vec<RecommendedContainer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedContainer {
    pub container_name: String,
    #[serde(default)]
    pub container_image_name: Option<String>,
    #[serde(default)]
    pub recommendations: Option<ContainerRecommendations>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecommendations {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub notifications: BTreeMap<String, Notification>,
    /// Keyed by monitoring end timestamp
    #[serde(default)]
    pub data: BTreeMap<String, IntervalRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalRecommendation {
    #[serde(default)]
    pub monitoring_end_time: Option<String>,
    #[serde(default)]
    pub current: Option<ResourceConfig>,
    /// Keyed by term, e.g. `short_term`
    #[serde(default)]
    pub recommendation_terms: BTreeMap<String, TermRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermRecommendation {
    #[serde(default)]
    pub duration_in_hours: Option<f64>,
    /// Keyed by engine, e.g. `cost` or `performance`
    #[serde(default)]
    pub recommendation_engines: BTreeMap<String, EngineRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRecommendation {
    #[serde(default)]
    pub pod_count: Option<u32>,
    #[serde(default)]
    pub confidence_level: Option<f64>,
    #[serde(default)]
    pub config: Option<ResourceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub requests: Option<ResourceValues>,
    #[serde(default)]
    pub limits: Option<ResourceValues>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceValues {
    #[serde(default)]
    pub cpu: Option<Amount>,
    #[serde(default)]
    pub memory: Option<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amount {
    pub amount: f64,
    #[serde(default)]
    pub format: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_experiment_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/createExperiment")
            .match_body(Matcher::Regex(
                r#""experiment_name":"fe\|deployment\|prod""#.to_string(),
            ))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Experiment registered successfully with Kruize.","httpcode":201,"status":"SUCCESS"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response = client
            .create_experiment(&json!([{"experiment_name": "fe|deployment|prod"}]))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.httpcode, Some(201));
        assert_eq!(response.status.as_deref(), Some("SUCCESS"));
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/updateResults")
            .with_status(400)
            .with_body("Experiment name not found")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.update_results(&json!([])).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("400"), "{}", message);
        assert!(message.contains("Experiment name not found"), "{}", message);
    }

    #[tokio::test]
    async fn test_plain_text_response_kept_as_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/createPerformanceProfile")
            .with_status(201)
            .with_body("created")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response = client.create_performance_profile(&json!({})).await.unwrap();
        assert_eq!(response.message, "created");
        assert_eq!(response.httpcode, None);
    }

    #[tokio::test]
    async fn test_list_recommendations_sends_experiment_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/listRecommendations")
            .match_query(Matcher::UrlEncoded(
                "experiment_name".into(),
                "fe|deployment|prod".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([{
                    "experiment_name": "fe|deployment|prod",
                    "kubernetes_objects": [{
                        "type": "deployment",
                        "name": "fe",
                        "namespace": "prod",
                        "containers": [{
                            "container_name": "web",
                            "recommendations": {
                                "data": {
                                    "2023-01-02T03:15:00.000Z": {
                                        "recommendation_terms": {
                                            "short_term": {
                                                "recommendation_engines": {
                                                    "cost": {
                                                        "config": {
                                                            "requests": {
                                                                "cpu": {"amount": 0.5, "format": "cores"},
                                                                "memory": {"amount": 512.0, "format": "MiB"}
                                                            }
                                                        }
                                                    }
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }]
                    }]
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let listed = client.list_recommendations("fe|deployment|prod").await.unwrap();
        mock.assert_async().await;

        let container = &listed[0].kubernetes_objects[0].containers[0];
        let data = &container.recommendations.as_ref().unwrap().data;
        let interval = &data["2023-01-02T03:15:00.000Z"];
        let cost = &interval.recommendation_terms["short_term"].recommendation_engines["cost"];
        let requests = cost.config.as_ref().unwrap().requests.as_ref().unwrap();
        assert_eq!(requests.cpu.as_ref().unwrap().amount, 0.5);
        assert_eq!(requests.memory.as_ref().unwrap().format, "MiB");
    }

    #[tokio::test]
    async fn test_update_recommendations_passes_interval_end() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/updateRecommendations")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("experiment_name".into(), "fe|deployment|prod".into()),
                Matcher::UrlEncoded(
                    "interval_end_time".into(),
                    "2023-01-02T03:15:00.000Z".into(),
                ),
            ]))
            .with_status(201)
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let updated = client
            .update_recommendations("fe|deployment|prod", Some("2023-01-02T03:15:00.000Z"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(updated.is_empty());
    }

    #[tokio::test]
    async fn test_list_experiments_tolerates_extra_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/listExperiments")
            .with_status(200)
            .with_body(
                json!([{
                    "experiment_name": "fe|deployment|prod",
                    "status": "IN_PROGRESS",
                    "kubernetes_objects": [{
                        "type": "deployment", "name": "fe", "namespace": "prod",
                        "containers": [{"container_name": "web", "container_image_name": "img"}]
                    }]
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let listed = client.list_experiments().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].identities().count(), 1);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
