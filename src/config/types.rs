//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 模型后端配置
    #[serde(default)]
    pub llm: LlmConfig,

    /// 生成流程配置
    #[serde(default)]
    pub generation: GenerationConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 模型后端配置
///
/// `provider` 选择后端，其余字段按后端分节。
/// Hosted 缺少 api_key 不会阻止启动，只会让每次生成返回 NotConfigured。
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// hosted | local
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default)]
    pub hosted: HostedLlmConfig,

    #[serde(default)]
    pub local: LocalLlmConfig,

    /// 采样温度 [0, 2]
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// 单次生成的最大 token 数，不设置则交给后端决定
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// 单次 HTTP 请求超时（秒）
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "hosted".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            hosted: HostedLlmConfig::default(),
            local: LocalLlmConfig::default(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// OpenAI 兼容后端
#[derive(Debug, Clone, Deserialize)]
pub struct HostedLlmConfig {
    #[serde(default = "default_hosted_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_hosted_model")]
    pub model: String,
}

fn default_hosted_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_hosted_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for HostedLlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_hosted_url(),
            api_key: None,
            model: default_hosted_model(),
        }
    }
}

/// Ollama 兼容后端，不需要凭证
#[derive(Debug, Clone, Deserialize)]
pub struct LocalLlmConfig {
    #[serde(default = "default_local_url")]
    pub base_url: String,

    #[serde(default = "default_local_model")]
    pub model: String,
}

fn default_local_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_local_model() -> String {
    "llama3".to_string()
}

impl Default for LocalLlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_local_url(),
            model: default_local_model(),
        }
    }
}

/// 生成流程配置
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// 整个生成请求的截止时间（秒），批量与流式共用
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/storyforge.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
