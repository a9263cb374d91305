//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use route_composer::Project;
use tempfile::TempDir;
use tower::ServiceExt;

/// A throwaway project directory populated file by file.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn project(&self) -> Project {
        Project::new(self.dir.path())
    }

    /// Create an empty file, along with any missing parent directories.
    pub fn file(&self, relative: &str) -> &Self {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
        self
    }

    pub fn dir(&self, relative: &str) -> &Self {
        fs::create_dir_all(self.dir.path().join(relative)).unwrap();
        self
    }
}

/// Send one request through the router without a network round trip.
pub async fn send(app: &Router, method: Method, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, HeaderMap, String) {
    let mut request = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let (status, _, body) = send(app, Method::GET, uri, &[]).await;
    (status, body)
}
