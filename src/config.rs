//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::ast::Identifier;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("无法读取配置文件 {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置: {0}")]
    Json(#[from] serde_json::Error),
}

/// 翻译器配置
///
/// ```json
/// { "field_mapping": { "id": "_id" }, "optimization": { "min_or_conditions_for_in": 5 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 过滤字段名到存储字段名的映射
    pub field_mapping: HashMap<String, String>,
    pub optimization: OptimizationConfig,
}

/// Configuration for SQL optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Minimum number of `=` comparisons on one column in an `or` chain before
    /// the chain is rewritten into a single IN
    #[serde(alias = "max_or_conditions_for_in")]
    pub min_or_conditions_for_in: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            min_or_conditions_for_in: 5,
        }
    }
}

impl FilterConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// 获取字段对应的存储字段名，如果不存在映射则返回原始路径
    pub fn field_name(&self, field: &Identifier) -> String {
        let dotted = field.dotted();
        self.field_mapping.get(&dotted).cloned().unwrap_or(dotted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_json_config() {
        let temp_file = std::env::temp_dir().join("query_filter_test_config.json");
        let mut file = fs::File::create(&temp_file).unwrap();
        writeln!(
            file,
            r#"{{
                "field_mapping": {{ "id": "_id", "address.city": "city" }},
                "optimization": {{ "min_or_conditions_for_in": 3 }}
            }}"#
        )
        .unwrap();

        let config = FilterConfig::from_json_file(&temp_file).unwrap();
        assert_eq!(config.field_name(&Identifier::from_dotted("id")), "_id");
        assert_eq!(config.field_name(&Identifier::from_dotted("address.city")), "city");
        assert_eq!(config.field_name(&Identifier::from_dotted("name")), "name");
        assert_eq!(config.optimization.min_or_conditions_for_in, 3);

        fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = FilterConfig::from_json_str("{}").unwrap();
        assert_eq!(config, FilterConfig::default());
        assert_eq!(config.optimization.min_or_conditions_for_in, 5);

        let config = FilterConfig::from_json_str(r#"{"field_mapping": {"a": "b"}}"#).unwrap();
        assert_eq!(config.optimization, OptimizationConfig::default());
    }

    #[test]
    fn test_legacy_threshold_key_is_accepted() {
        let config =
            FilterConfig::from_json_str(r#"{"optimization": {"max_or_conditions_for_in": 4}}"#).unwrap();
        assert_eq!(config.optimization.min_or_conditions_for_in, 4);
    }

    #[test]
    fn test_invalid_json_config() {
        let result = FilterConfig::from_json_str("invalid json");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = FilterConfig::from_json_file("non_existent_file.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
