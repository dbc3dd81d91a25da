//! HTTP client for the FileDeck REST API

use std::path::Path;

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use reqwest::multipart;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use filedeck_types::{DirListing, SystemInfoReport};

use crate::config::ClientConfig;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct EditBody {
    content: String,
}

/// Typed client covering every REST operation the server exposes
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn list_dir(&self, path: &str) -> Result<DirListing> {
        let response = self
            .get("/api/files")
            .query(&[("path", path)])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn create_folder(&self, parent_path: &str, name: &str) -> Result<()> {
        let body = serde_json::json!({ "parent_path": parent_path, "name": name });
        let response = self.post("/api/create_folder").json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let body = serde_json::json!({ "path": path });
        let response = self.post("/api/delete").json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn rename(&self, old_path: &str, new_name: &str) -> Result<()> {
        let body = serde_json::json!({ "old_path": old_path, "new_name": new_name });
        let response = self.post("/api/rename").json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn read_file(&self, path: &str) -> Result<String> {
        let response = self
            .get("/api/edit")
            .query(&[("path", path)])
            .send()
            .await?;
        let body: EditBody = Self::check(response).await?.json().await?;
        Ok(body.content)
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let body = serde_json::json!({ "path": path, "content": content });
        let response = self.post("/api/edit").json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn upload(&self, dir: &str, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new()
            .text("path", dir.to_string())
            .part("file", part);
        let response = self.post("/api/upload").multipart(form).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Stream a server file into `dest`
    pub async fn download_to(&self, path: &str, dest: &Path) -> Result<()> {
        let response = self
            .get("/api/download")
            .query(&[("path", path)])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    pub async fn system_info(&self) -> Result<SystemInfoReport> {
        let response = self.get("/api/system_info").send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.with_auth(self.http.get(self.config.api_url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.with_auth(self.http.post(self.config.api_url(path)))
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-success response into the server's error message
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        bail!("server responded {}: {}", status.as_u16(), message);
    }
}
