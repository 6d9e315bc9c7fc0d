//! The tool's configuration and its defaults.

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Config {
    // Paths
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    // Network
    #[serde(default = "default_list_url_base")]
    pub list_url_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    // Concurrency
    #[serde(default = "default_list_workers")]
    pub list_workers: usize,
    #[serde(default = "default_entry_workers")]
    pub entry_workers: usize,
    #[serde(default = "default_asset_workers")]
    pub asset_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            list_url_base: default_list_url_base(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            list_workers: default_list_workers(),
            entry_workers: default_entry_workers(),
            asset_workers: default_asset_workers(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        &[
            FieldMeta {
                name: "output_dir",
                description: "Directory downloaded series are written to",
            },
            FieldMeta {
                name: "list_url_base",
                description: "Base URL of the catalog site",
            },
            FieldMeta {
                name: "user_agent",
                description: "User-Agent header sent with every request",
            },
            FieldMeta {
                name: "request_timeout",
                description: "Per-request timeout in seconds (0 disables the timeout)",
            },
            FieldMeta {
                name: "list_workers",
                description: "Threads crawling list pages (one of them seeks the last page)",
            },
            FieldMeta {
                name: "entry_workers",
                description: "Threads downloading episodes",
            },
            FieldMeta {
                name: "asset_workers",
                description: "Threads per episode downloading its images",
            },
        ]
    }
}

fn default_output_dir() -> String {
    "result".to_string()
}

fn default_list_url_base() -> String {
    "https://comic.naver.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_request_timeout() -> u64 {
    0
}

fn default_list_workers() -> usize {
    2
}

fn default_entry_workers() -> usize {
    4
}

fn default_asset_workers() -> usize {
    8
}
