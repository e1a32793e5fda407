use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

use crate::bluesky::{self, PostView, ThreadNode};

/// The two reads the widget needs, behind a trait so tests and offline
/// front-ends can swap the network out.
pub trait ThreadService: Send + Sync {
    fn search_posts(&self, page_url: &str, author: &str) -> Result<Vec<PostView>>;
    fn load_thread(&self, post_uri: &str) -> Result<ThreadNode>;
}

pub struct BlueskyThreadService {
    client: Arc<bluesky::Client>,
}

impl BlueskyThreadService {
    pub fn new(client: Arc<bluesky::Client>) -> Self {
        Self { client }
    }
}

impl ThreadService for BlueskyThreadService {
    fn search_posts(&self, page_url: &str, author: &str) -> Result<Vec<PostView>> {
        self.client
            .search_posts(page_url, author)
            .context("search posts")
    }

    fn load_thread(&self, post_uri: &str) -> Result<ThreadNode> {
        self.client
            .get_post_thread(post_uri)
            .context("fetch post thread")
    }
}

#[derive(Default)]
pub struct MockThreadService {
    pub posts: Vec<PostView>,
    pub thread: Option<ThreadNode>,
    pub fail_search: bool,
    pub fail_thread: bool,
}

impl ThreadService for MockThreadService {
    fn search_posts(&self, _page_url: &str, _author: &str) -> Result<Vec<PostView>> {
        if self.fail_search {
            bail!("mock: search unavailable");
        }
        Ok(self.posts.clone())
    }

    fn load_thread(&self, _post_uri: &str) -> Result<ThreadNode> {
        if self.fail_thread {
            bail!("mock: thread unavailable");
        }
        self.thread
            .clone()
            .ok_or_else(|| anyhow!("mock: no thread configured"))
    }
}
