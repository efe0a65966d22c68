use super::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// How to launch one MCP tool server over stdio.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    name: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    workdir: Option<String>,
}

impl From<RawServer> for ServerConfig {
    fn from(raw: RawServer) -> Self {
        let expand = |s: &str| -> String {
            shellexpand::full(s)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| s.to_string())
        };

        let command = PathBuf::from(expand(&raw.command));
        let workdir = raw.workdir.map(|d| PathBuf::from(expand(&d)));
        let args = raw.args.into_iter().map(|arg| expand(&arg)).collect();
        let env = raw
            .env
            .into_iter()
            .map(|(key, value)| (key, expand(&value)))
            .collect();

        Self {
            name: raw.name,
            command,
            args,
            env,
            workdir,
        }
    }
}

impl ServerConfig {
    /// Builds a launch config for a server script: `.py` runs under
    /// `python`, `.js` under `node`. The file stem becomes the server name.
    pub fn from_script_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let interpreter = match path.extension().and_then(|ext| ext.to_str()) {
            Some("py") => "python",
            Some("js") => "node",
            _ => {
                return Err(ConfigError::UnsupportedScript {
                    path: path.to_path_buf(),
                });
            }
        };
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("server")
            .to_string();

        Ok(Self {
            name,
            command: PathBuf::from(interpreter),
            args: vec![path.to_string_lossy().into_owned()],
            env: HashMap::new(),
            workdir: None,
        })
    }
}
