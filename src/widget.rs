use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};

use crate::bluesky::{ThreadNode, ThreadViewPost};
use crate::data::ThreadService;
use crate::filters::{self, CommentFilter};
use crate::uri;

pub const INITIAL_VISIBLE: usize = 5;
pub const REVEAL_STEP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WidgetError {
    #[error("No matching post found")]
    NotFound,
    #[error("Error fetching post")]
    Fetching,
    #[error("Error loading comments")]
    CommentLoading,
}

impl WidgetError {
    pub fn code(&self) -> &'static str {
        match self {
            WidgetError::NotFound => "not_found",
            WidgetError::Fetching => "fetching_error",
            WidgetError::CommentLoading => "comment_loading_error",
        }
    }
}

/// Structured code + message handed to the embedding page when the widget
/// has nothing to show.
#[derive(Debug, Clone)]
pub struct Notice {
    pub code: &'static str,
    pub message: String,
}

pub type NoticeCallback = Arc<dyn Fn(Notice) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostSource {
    /// An at:// identifier or bsky.app post URL supplied directly.
    Identifier(String),
    /// Find the author's post linking to the given page via search.
    Discover { author: String, page_url: String },
}

pub struct CommentSectionOptions {
    pub source: PostSource,
    pub filters: Vec<CommentFilter>,
    pub on_empty: Option<NoticeCallback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    ResolvingIdentifier,
    FetchingThread,
    Ready,
    Errored,
}

/// Drops placeholder nodes and orders the remaining replies by descending
/// like count. The sort is stable; ties keep their fetched order.
pub fn rank_replies(nodes: &[ThreadNode]) -> Vec<ThreadViewPost> {
    let mut replies: Vec<ThreadViewPost> = nodes
        .iter()
        .filter_map(ThreadNode::as_post)
        .cloned()
        .collect();
    replies.sort_by(|a, b| b.post.like_count.cmp(&a.post.like_count));
    replies
}

pub struct CommentSection {
    options: CommentSectionOptions,
    state: State,
    resolved_uri: Option<String>,
    thread: Option<ThreadViewPost>,
    ranked: Vec<ThreadViewPost>,
    error: Option<WidgetError>,
    visible_count: usize,
}

impl CommentSection {
    pub fn new(options: CommentSectionOptions) -> Self {
        Self {
            options,
            state: State::Idle,
            resolved_uri: None,
            thread: None,
            ranked: Vec::new(),
            error: None,
            visible_count: INITIAL_VISIBLE,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn error(&self) -> Option<WidgetError> {
        self.error
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.map(|err| err.to_string())
    }

    pub fn resolved_uri(&self) -> Option<&str> {
        self.resolved_uri.as_deref()
    }

    /// Web URL of the resolved post, for linking back to Bluesky.
    pub fn post_url(&self) -> Option<String> {
        self.resolved_uri.as_deref().map(uri::web_url)
    }

    pub fn thread(&self) -> Option<&ThreadViewPost> {
        self.thread.as_ref()
    }

    /// Ranked replies that survive the active filter set.
    pub fn candidates(&self) -> Vec<&ThreadViewPost> {
        self.ranked
            .iter()
            .filter(|reply| filters::passes(reply, &self.options.filters))
            .collect()
    }

    /// The currently revealed slice of the candidate list.
    pub fn visible(&self) -> Vec<&ThreadViewPost> {
        let mut candidates = self.candidates();
        candidates.truncate(self.visible_count);
        candidates
    }

    /// Candidates beyond the reveal cursor.
    pub fn hidden_count(&self) -> usize {
        self.candidates().len().saturating_sub(self.visible_count)
    }

    /// Advances the reveal cursor. Only accepted in Ready; a no-op once
    /// every candidate is already revealed.
    pub fn show_more(&mut self) {
        if self.state != State::Ready {
            return;
        }
        let total = self.candidates().len();
        if self.visible_count < total {
            self.visible_count = (self.visible_count + REVEAL_STEP).min(total);
        }
    }

    /// Runs one fetch cycle: resolve the identifier, fetch the thread, rank
    /// the replies. A single attempt each; any failure is terminal until the
    /// next load call.
    pub fn load(&mut self, service: &dyn ThreadService) {
        self.reset();

        self.state = State::ResolvingIdentifier;
        let source = self.options.source.clone();
        let post_uri = match &source {
            PostSource::Identifier(raw) => uri::at_uri(raw),
            PostSource::Discover { author, page_url } => {
                match service.search_posts(page_url, author) {
                    Ok(posts) => match posts.into_iter().next() {
                        Some(post) => post.uri,
                        None => return self.fail(WidgetError::NotFound),
                    },
                    Err(_) => return self.fail(WidgetError::Fetching),
                }
            }
        };
        self.resolved_uri = Some(post_uri.clone());

        self.state = State::FetchingThread;
        let node = match service.load_thread(&post_uri) {
            Ok(node) => node,
            Err(_) => return self.fail(WidgetError::CommentLoading),
        };
        match node.into_post() {
            Some(thread) => {
                self.ranked = rank_replies(&thread.replies);
                self.thread = Some(thread);
                self.state = State::Ready;
            }
            None => self.fail(WidgetError::CommentLoading),
        }
    }

    /// Runs `load` on a worker thread and delivers the finished widget over
    /// a channel, so a front-end can show a loading placeholder meanwhile.
    /// There is no cancellation: dropping the receiver leaves at most one
    /// in-flight request to complete unobserved.
    pub fn load_in_background(
        mut self,
        service: Arc<dyn ThreadService>,
    ) -> Receiver<CommentSection> {
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            self.load(service.as_ref());
            let _ = tx.send(self);
        });
        rx
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.resolved_uri = None;
        self.thread = None;
        self.ranked.clear();
        self.error = None;
        self.visible_count = INITIAL_VISIBLE;
    }

    fn fail(&mut self, error: WidgetError) {
        if let Some(callback) = &self.options.on_empty {
            callback(Notice {
                code: error.code(),
                message: error.to_string(),
            });
        }
        self.error = Some(error);
        self.state = State::Errored;
    }
}
