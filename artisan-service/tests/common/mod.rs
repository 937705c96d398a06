#![allow(dead_code)]

use artisan_service::config::{
    ArtisanConfig, CatalogBackend, CatalogConfig, GenaiConfig, MediaConfig, PublicConfig,
};
use artisan_service::services::providers::{MockTextProvider, TextProvider};
use artisan_service::startup::{AppState, Application};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use reqwest::multipart;
use service_core::config::Config as CoreConfig;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestOptions {
    pub provider: Option<Arc<MockTextProvider>>,
    pub strict: bool,
    pub max_upload_bytes: usize,
    pub backend_origin: Option<String>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            provider: None,
            strict: false,
            max_upload_bytes: 2 * 1024 * 1024,
            backend_origin: None,
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub state: AppState,
    pub client: reqwest::Client,
    media_dir: TempDir,
    originals_dir: TempDir,
}

impl TestApp {
    /// App on a random port with the in-memory catalog and no GenAI provider.
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        service_core::observability::init_metrics();

        let media_dir = tempfile::tempdir().expect("Failed to create media dir");
        let originals_dir = tempfile::tempdir().expect("Failed to create originals dir");

        let config = ArtisanConfig {
            common: CoreConfig {
                port: 0,
                ..CoreConfig::default()
            },
            catalog: CatalogConfig {
                backend: CatalogBackend::Memory,
                mongodb: None,
            },
            media: MediaConfig {
                dir: media_dir.path().to_path_buf(),
                originals_dir: originals_dir.path().to_path_buf(),
                max_upload_bytes: options.max_upload_bytes,
            },
            public: PublicConfig {
                backend_origin: options.backend_origin,
            },
            genai: GenaiConfig {
                strict: options.strict,
                ..GenaiConfig::default()
            },
            otlp_endpoint: None,
        };

        let provider = options
            .provider
            .map(|mock| mock as Arc<dyn TextProvider>);

        let app = Application::build_with_provider(config, provider)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let state = app.state().clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            state,
            client,
            media_dir,
            originals_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn media_path(&self, key: &str) -> PathBuf {
        self.media_dir.path().join(key)
    }

    pub fn original_path(&self, key: &str) -> PathBuf {
        self.originals_dir.path().join(key)
    }

    /// Number of regular files under the media and originals directories.
    pub fn media_file_count(&self) -> usize {
        fn count(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .map(|entry| {
                            let path = entry.path();
                            if path.is_dir() {
                                count(&path)
                            } else {
                                1
                            }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        count(self.media_dir.path()) + count(self.originals_dir.path())
    }

    pub async fn register(&self, fields: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url("/register_artisan"))
            .form(fields)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Register an artisan and return its id.
    pub async fn register_artisan(&self, name: &str, location: &str) -> String {
        let response = self
            .register(&[("name", name), ("location", location)])
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        body["id"].as_str().expect("id").to_string()
    }

    pub async fn upload(&self, form: multipart::Form) -> reqwest::Response {
        self.client
            .post(self.url("/upload_product"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Upload a product with a generated PNG and return its id.
    pub async fn upload_product(&self, artisan_id: &str, name: &str) -> String {
        let response = self
            .upload(product_form(artisan_id, name, png_bytes(40, 30)))
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        body["id"].as_str().expect("id").to_string()
    }
}

pub fn product_form(artisan_id: &str, name: &str, image: Vec<u8>) -> multipart::Form {
    multipart::Form::new()
        .text("artisan_id", artisan_id.to_string())
        .text("product_name", name.to_string())
        .text("description", "Handmade")
        .text("price", "250")
        .part(
            "file",
            multipart::Part::bytes(image)
                .file_name("photo.png")
                .mime_str("image/png")
                .expect("mime"),
        )
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(40 + x % 150) as u8, (70 + y % 150) as u8, 110])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .expect("Failed to encode PNG");
    bytes
}
