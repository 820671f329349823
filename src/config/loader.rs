//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 支持的模型后端
const PROVIDERS: &[&str] = &["hosted", "local", "openai", "ollama"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `STORYFORGE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `STORYFORGE_SERVER__PORT=8080`
/// - `STORYFORGE_LLM__PROVIDER=local`
/// - `STORYFORGE_LLM__HOSTED__API_KEY=sk-...`
/// - `STORYFORGE_LLM__LOCAL__BASE_URL=http://ollama:11434`
/// - `STORYFORGE_GENERATION__REQUEST_TIMEOUT_SECS=600`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default("llm.provider", "hosted")?
        .set_default("llm.hosted.base_url", "https://api.openai.com/v1")?
        .set_default("llm.hosted.model", "gpt-4o-mini")?
        .set_default("llm.local.base_url", "http://localhost:11434")?
        .set_default("llm.local.model", "llama3")?
        .set_default("llm.temperature", 0.7)?
        .set_default("llm.timeout_secs", 120)?
        .set_default("generation.request_timeout_secs", 300)?
        .set_default("database.path", "data/storyforge.db")?
        .set_default("database.max_connections", 5)?
        .set_default("log.level", "info")?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级），变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("STORYFORGE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
///
/// 缺少 api_key 不在这里拒绝，服务照常启动
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    let provider = config.llm.provider.trim().to_ascii_lowercase();
    if !PROVIDERS.contains(&provider.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "Unknown llm provider '{}', expected hosted or local",
            config.llm.provider
        )));
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return Err(ConfigError::ValidationError(format!(
            "llm.temperature must be within [0, 2], got {}",
            config.llm.temperature
        )));
    }

    if config.llm.timeout_secs == 0 || config.generation.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Timeouts cannot be 0".to_string(),
        ));
    }

    if config.database.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Database path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志），不输出凭证
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("LLM Provider: {}", config.llm.provider);
    tracing::info!(
        "LLM Hosted: {} (model {}, api key {})",
        config.llm.hosted.base_url,
        config.llm.hosted.model,
        if config.llm.hosted.api_key.is_some() { "set" } else { "missing" }
    );
    tracing::info!(
        "LLM Local: {} (model {})",
        config.llm.local.base_url,
        config.llm.local.model
    );
    tracing::info!("LLM Temperature: {}", config.llm.temperature);
    tracing::info!("LLM Timeout: {}s", config.llm.timeout_secs);
    tracing::info!(
        "Generation Deadline: {}s",
        config.generation.request_timeout_secs
    );
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Database Max Connections: {}", config.database.max_connections);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_validation_passes_for_default_config() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_temperature() {
        let mut config = AppConfig::default();
        config.llm.temperature = 2.5;
        assert!(validate_config(&config).is_err());
        config.llm.temperature = 2.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_unknown_provider() {
        let mut config = AppConfig::default();
        config.llm.provider = "anthropomorphic".to_string();
        assert!(validate_config(&config).is_err());
        config.llm.provider = "Ollama".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
[llm]
provider = "local"
temperature = 0.3

[llm.local]
model = "qwen2"

[generation]
request_timeout_secs = 90
"#,
        );

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.llm.provider, "local");
        assert_eq!(config.llm.local.model, "qwen2");
        assert_eq!(config.llm.local.base_url, "http://localhost:11434");
        assert!((config.llm.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.generation.request_timeout_secs, 90);
        // 缺少 api_key 不是启动错误
        assert!(config.llm.hosted.api_key.is_none());
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let file = write_config("[llm]\ntemperature = 3.0\n");
        assert!(matches!(
            load_config_from_path(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
