#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;
use tether_api::{ApiError, ApiRequest, ApiResponse, HttpClient, RestClient, transport::resolve_url};
use tether_engine::Engine;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const BASE_URL: &str = "http://api.test";

/// A canned response.
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

pub fn reply(status: u16, body: &str) -> Reply {
    Reply {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

pub fn json_reply(status: u16, body: Value) -> Reply {
    reply(status, &body.to_string())
}

impl Reply {
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Build the response as if it answered a request to `url`.
    pub fn to_response(&self, url: &str) -> ApiResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            headers.insert(
                HeaderName::from_static(*name),
                HeaderValue::from_str(value).expect("header value"),
            );
        }
        ApiResponse::new(
            StatusCode::from_u16(self.status).expect("status"),
            headers,
            self.body.clone(),
            url,
        )
    }
}

/// A request seen by [`ScriptedServer`], with the (paused) time it arrived.
#[derive(Debug, Clone)]
pub struct Seen {
    pub request: ApiRequest,
    pub at: Instant,
}

/// In-memory transport answering from a queue of canned replies.
#[derive(Default)]
pub struct ScriptedServer {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<Seen>>,
}

impl ScriptedServer {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::default(),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.seen().into_iter().map(|seen| seen.request).collect()
    }

    /// `METHOD path` of every request, in order.
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| format!("{} {}", request.method, request.path))
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for ScriptedServer {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    async fn send(&self, request: ApiRequest, _cancel: &CancellationToken) -> Result<ApiResponse, ApiError> {
        let url = resolve_url(BASE_URL, &request.path, &request.query)?;
        let reply = self.replies.lock().unwrap().pop_front();
        let method = request.method;
        self.seen.lock().unwrap().push(Seen {
            request,
            at: Instant::now(),
        });
        let Some(reply) = reply else {
            return Err(ApiError::transport(method.as_str(), url.as_str(), "no scripted reply left"));
        };

        Ok(reply.to_response(url.as_str()))
    }
}

/// Response to a request sent to `path` under the base URL.
pub fn initial(reply: Reply, path: &str) -> ApiResponse {
    reply.to_response(&format!("{BASE_URL}{path}"))
}

pub fn engine(server: &Arc<ScriptedServer>) -> Engine {
    Engine::new(RestClient::new(server.clone()))
}
