use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub template_dir: PathBuf,
    /// Template rendered at `/` when the store has no selection yet.
    pub default_template: String,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("site.json")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            template_dir: PathBuf::from("./template"),
            default_template: "t1".to_string(),
        }
    }
}
