//! Configurable HTTP uploader

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{NoProgress, ProgressSink, Uploader, UrlShortener};
use crate::config::{CustomUploaderConfig, HttpMethod, RequestBody};
use crate::task::UploadResult;

const CHUNK_SIZE: usize = 64 * 1024;

/// Uploader driven entirely by a [`CustomUploaderConfig`]
pub struct CustomUploader {
    client: Client,
    config: CustomUploaderConfig,
}

/// Values substituted into request fields
struct RequestVars<'a> {
    input: &'a str,
    file_name: &'a str,
}

impl RequestVars<'_> {
    fn fill(&self, template: &str) -> String {
        template
            .replace("{input}", self.input)
            .replace("{filename}", self.file_name)
    }

    fn fill_map(&self, map: &BTreeMap<String, String>) -> Vec<(String, String)> {
        map.iter()
            .map(|(k, v)| (k.clone(), self.fill(v)))
            .collect()
    }
}

impl CustomUploader {
    pub fn new(client: Client, config: CustomUploaderConfig) -> Self {
        Self { client, config }
    }

    pub fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or("custom uploader")
    }

    /// Environment token, unless the headers already authorize the request
    fn bearer_token(&self) -> Option<&str> {
        let has_auth = self
            .config
            .headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("authorization"));
        self.config.token.as_deref().filter(|_| !has_auth)
    }

    async fn send(
        &self,
        file: Option<(Bytes, &str)>,
        input: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> UploadResult {
        let file_name = file.as_ref().map(|(_, name)| *name).unwrap_or_default();
        let vars = RequestVars { input, file_name };

        let method = match self.config.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
        };
        let url = vars.fill(&self.config.request_url);

        let mut request = self
            .client
            .request(method, &url)
            .query(&vars.fill_map(&self.config.parameters));
        for (name, value) in vars.fill_map(&self.config.headers) {
            request = request.header(name, value);
        }
        if let Some(token) = self.bearer_token() {
            request = request.bearer_auth(token);
        }

        let arguments = vars.fill_map(&self.config.arguments);
        request = match self.config.body {
            RequestBody::None => request,
            RequestBody::MultipartFormData => {
                let mut form = Form::new();
                for (name, value) in arguments {
                    form = form.text(name, value);
                }
                if let Some((data, name)) = file {
                    let len = data.len() as u64;
                    let part = Part::stream_with_length(progress_body(data, progress), len)
                        .file_name(name.to_string());
                    form = form.part(self.config.file_form_name.clone(), part);
                }
                request.multipart(form)
            }
            RequestBody::FormUrlEncoded => request.form(&arguments),
            RequestBody::Json => {
                let body: BTreeMap<String, String> = arguments.into_iter().collect();
                request.json(&body)
            }
            RequestBody::Binary => match file {
                Some((data, _)) => request.body(progress_body(data, progress)),
                None => request,
            },
        };

        debug!(uploader = self.name(), url, "Sending request");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(uploader = self.name(), error = %e, "Request failed");
                return UploadResult::from_error(describe_error(&e));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return UploadResult::from_error(format!("Failed to read response: {e}"));
            }
        };

        let mut result = UploadResult {
            response: Some(body.clone()),
            ..UploadResult::default()
        };
        let template = ResponseTemplate::new(&body, &vars);

        if !status.is_success() {
            result.push_error(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
            if let Some(message) = self.config.error_message.as_deref() {
                let message = template.render(message);
                if !message.is_empty() {
                    result.push_error(message);
                }
            }
            return result;
        }

        result.url = non_empty(template.render(&self.config.url));
        result.thumbnail_url = self
            .config
            .thumbnail_url
            .as_deref()
            .and_then(|t| non_empty(template.render(t)));
        result.deletion_url = self
            .config
            .deletion_url
            .as_deref()
            .and_then(|t| non_empty(template.render(t)));
        result
    }
}

#[async_trait]
impl Uploader for CustomUploader {
    async fn upload(
        &self,
        data: Bytes,
        file_name: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> UploadResult {
        self.send(Some((data, file_name)), "", progress).await
    }
}

#[async_trait]
impl UrlShortener for CustomUploader {
    async fn shorten(&self, url: &str) -> UploadResult {
        let mut result = self.send(None, url, Arc::new(NoProgress)).await;
        if !result.is_error() {
            result.shortened_url = result.url.take();
            result.url = Some(url.to_string());
        }
        result
    }
}

/// Request body that reports progress as reqwest pulls each chunk
fn progress_body(data: Bytes, progress: Arc<dyn ProgressSink>) -> reqwest::Body {
    let total = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(CHUNK_SIZE)
        .map(|start| data.slice(start..(start + CHUNK_SIZE).min(data.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures_util::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        progress.report(sent, Some(total));
        Ok::<_, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(stream)
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timed out".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {e}")
    } else {
        format!("Request failed: {e}")
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Expands `{response}`, `{json:path}`, `{input}` and `{filename}`
struct ResponseTemplate<'a> {
    body: &'a str,
    json: Option<Value>,
    vars: &'a RequestVars<'a>,
}

impl<'a> ResponseTemplate<'a> {
    fn new(body: &'a str, vars: &'a RequestVars<'a>) -> Self {
        Self {
            body,
            json: serde_json::from_str(body).ok(),
            vars,
        }
    }

    fn render(&self, template: &str) -> String {
        let mut out = String::new();
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let Some(len) = rest[start..].find('}') else {
                rest = &rest[start..];
                break;
            };
            let name = &rest[start + 1..start + len];
            match self.lookup(name) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[start..=start + len]),
            }
            rest = &rest[start + len + 1..];
        }

        out.push_str(rest);
        out
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "response" => Some(self.body.trim().to_string()),
            "input" => Some(self.vars.input.to_string()),
            "filename" => Some(self.vars.file_name.to_string()),
            _ => {
                let path = name.strip_prefix("json:")?;
                Some(
                    self.json
                        .as_ref()
                        .and_then(|json| json_path(json, path))
                        .unwrap_or_default(),
                )
            }
        }
    }
}

/// Walk `a.b.0.c` through objects and arrays
fn json_path(value: &Value, path: &str) -> Option<String> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    match current {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
