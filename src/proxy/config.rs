/// 反代服务配置
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// 监听地址
    pub bind_address: String,

    /// 监听端口
    pub port: u16,

    /// 上游请求超时时间(秒)
    pub request_timeout: u64,

    /// 上游代理配置
    pub upstream_proxy: UpstreamProxyConfig,
}

/// 上游代理配置
#[derive(Debug, Clone, Default)]
pub struct UpstreamProxyConfig {
    /// 是否启用
    pub enabled: bool,
    /// 代理地址 (http://, https://, socks5://)
    pub url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: 8080,
            request_timeout: default_request_timeout(),
            upstream_proxy: UpstreamProxyConfig::default(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_request_timeout() -> u64 {
    300 // 大文件下载需要较长时间
}

impl ProxyConfig {
    /// 获取实际的监听地址
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
