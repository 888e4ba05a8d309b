//! Mock asset loader for testing
//!
//! Outcomes are scripted per path. Unscripted paths resolve to a small
//! textured triangle. Every call to `fetch` is counted, which is how tests
//! prove that concurrent loads of one path share a single fetch.

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::{AssetLoader, LoadFailure, RawAsset, RawMesh, RawTexture};

/// Scripted result for one path
#[derive(Debug, Clone)]
pub enum MockResponse {
    Asset(RawAsset),
    Fail(LoadFailure),
    /// Never resolves; only a deadline ends the load
    Hang,
}

#[derive(Default)]
struct MockLoaderState {
    responses: HashMap<String, MockResponse>,
    gates: HashMap<String, Shared<oneshot::Receiver<()>>>,
    fetches: HashMap<String, usize>,
}

/// Loader with scripted per-path outcomes
#[derive(Clone)]
pub struct MockLoader {
    state: Arc<Mutex<MockLoaderState>>,
    default_texture_side: u32,
}

/// Holds a gated path closed until [`MockGate::open`] is called
pub struct MockGate {
    sender: oneshot::Sender<()>,
}

impl MockGate {
    pub fn open(self) {
        let _ = self.sender.send(());
    }
}

impl Default for MockLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLoader {
    /// A loader whose unscripted paths produce a triangle with a 16x16 texture
    pub fn new() -> Self {
        Self::with_texture_side(16)
    }

    /// A loader whose unscripted paths produce a triangle with a `side`x`side` texture
    pub fn with_texture_side(side: u32) -> Self {
        Self {
            state: Arc::default(),
            default_texture_side: side,
        }
    }

    /// Triangle plus a square RGBA texture of the given side
    pub fn textured_asset(side: u32) -> RawAsset {
        RawAsset {
            meshes: vec![RawMesh {
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                ..Default::default()
            }],
            textures: vec![RawTexture {
                width: side,
                height: side,
                rgba: vec![255; (side * side * 4) as usize],
            }],
        }
    }

    /// Script the response for `path`
    pub fn respond(&self, path: impl Into<String>, response: MockResponse) -> &Self {
        self.state.lock().responses.insert(path.into(), response);
        self
    }

    /// Make `path` fail with `failure`
    pub fn fail(&self, path: impl Into<String>, failure: LoadFailure) -> &Self {
        self.respond(path, MockResponse::Fail(failure))
    }

    /// Make `path` never resolve
    pub fn hang(&self, path: impl Into<String>) -> &Self {
        self.respond(path, MockResponse::Hang)
    }

    /// Hold fetches of `path` until the returned gate is opened
    pub fn gate(&self, path: impl Into<String>) -> MockGate {
        let (sender, receiver) = oneshot::channel();
        self.state.lock().gates.insert(path.into(), receiver.shared());
        MockGate { sender }
    }

    /// How many times `path` was fetched
    pub fn fetch_count(&self, path: &str) -> usize {
        self.state.lock().fetches.get(path).copied().unwrap_or(0)
    }

    /// Total fetches across all paths
    pub fn total_fetches(&self) -> usize {
        self.state.lock().fetches.values().sum()
    }
}

#[async_trait::async_trait]
impl AssetLoader for MockLoader {
    async fn fetch(&self, path: &str) -> Result<RawAsset, LoadFailure> {
        let (gate, response) = {
            let mut state = self.state.lock();
            *state.fetches.entry(path.to_string()).or_insert(0) += 1;
            (
                state.gates.get(path).cloned(),
                state.responses.get(path).cloned(),
            )
        };

        if let Some(gate) = gate {
            // A dropped gate counts as opened
            let _ = gate.await;
        }

        match response {
            Some(MockResponse::Asset(asset)) => Ok(asset),
            Some(MockResponse::Fail(failure)) => Err(failure),
            Some(MockResponse::Hang) => futures::future::pending().await,
            None => Ok(Self::textured_asset(self.default_texture_side)),
        }
    }
}
