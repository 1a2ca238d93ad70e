//! Local stand-in for the GFS mirror.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::{StatusCode, Uri};
use axum::Router;
use gfs_viewer::Config;

/// HTTP server on an ephemeral port answering every path with the same
/// status and body, counting requests.
pub struct MockMirror {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
}

impl MockMirror {
    pub async fn start(status: StatusCode, body: Vec<u8>) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let paths = Arc::new(Mutex::new(Vec::new()));

        let (hit_counter, seen) = (hits.clone(), paths.clone());
        let app = Router::new().fallback(move |uri: Uri| {
            let hit_counter = hit_counter.clone();
            let seen = seen.clone();
            let body = body.clone();
            async move {
                hit_counter.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push(uri.path().to_string());
                (status, body)
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
            paths,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

/// Default configuration writing into `dir` and downloading from `base_url`.
pub fn test_config(dir: &std::path::Path, base_url: &str) -> Config {
    let mut config = Config::default();
    config.output.dir = dir.to_path_buf();
    config.source.base_url = Some(base_url.to_string());
    config
}
