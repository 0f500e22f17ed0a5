//! Headless-browser capability consumed by the fetch engine.
//!
//! The concrete driver lives outside this crate; campaigns receive it as an
//! injected `BrowserDriver`. Tests substitute scripted stubs. The surface is
//! the minimal set of operations the engine actually performs.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An authenticated session token injected at context creation. Opaque to
/// the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1366,
            height: 768,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub profile_dir: Option<String>,
    pub viewport: Viewport,
    pub user_agent: String,
    pub cookies: Vec<SessionCookie>,
    /// Egress endpoint for this context, `None` for a direct connection.
    pub proxy: Option<String>,
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch_context(&self, options: ContextOptions) -> Result<Box<dyn BrowserContext>>;
}

#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>>;
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for domcontentloaded, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;
    /// The resolved URL after redirects.
    async fn url(&self) -> Result<String>;
    async fn content(&self) -> Result<String>;
    async fn title(&self) -> Result<String>;
    /// Rendered body text, used for pushback-phrase detection.
    async fn body_text(&self) -> Result<String>;
    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>>;
    async fn wheel(&self, delta_x: f64, delta_y: f64) -> Result<()>;
}

#[async_trait]
pub trait PageElement: Send + Sync {
    async fn inner_text(&self) -> Result<String>;
    async fn attribute(&self, name: &str) -> Result<Option<String>>;
    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>>;
    async fn scroll_into_view(&self) -> Result<()>;
}
