use serde::{Deserialize, Serialize};

/// How the inference server is started and where it listens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server executable, invoked as `<binary> serve <model> ...`
    pub binary: String,
    pub host: String,
    pub port: u16,
    /// Extra arguments appended verbatim to the server command line
    pub extra_args: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary: "vllm".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            extra_args: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Base URL of the OpenAI-compatible API as seen from this machine
    pub fn base_url(&self) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "::" | "[::]" | "" => "localhost".to_string(),
            ipv6 if ipv6.contains(':') && !ipv6.starts_with('[') => format!("[{ipv6}]"),
            other => other.to_string(),
        };
        format!("http://{}:{}/v1", host, self.port)
    }
}

/// Weight download settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Download tool, invoked as `<binary> download <repo> --local-dir <dir>`
    pub binary: String,
    /// File whose presence marks a model directory as fully installed
    pub marker_file: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            binary: "huggingface-cli".to_string(),
            marker_file: "config.json".to_string(),
        }
    }
}
