use crate::config::AppConfig;
use crate::core::Direction;
use crate::storage::{S3Connector, StoreConnector};
use std::sync::Arc;

#[derive(Debug)]
pub struct TestConnectionResult {
    pub success: bool,
    pub message: String,
    pub details: Option<String>,
}

/// 验证配置并测试第一个桶的连接
pub async fn validate(config: &AppConfig) -> TestConnectionResult {
    if let Err(e) = config.validate() {
        return TestConnectionResult {
            success: false,
            message: "配置验证失败".to_string(),
            details: Some(e.to_string()),
        };
    }
    let connector: Arc<dyn StoreConnector> = Arc::new(S3Connector::new(config.store.clone()));
    test_connection(config, connector.as_ref()).await
}

pub async fn test_connection(
    config: &AppConfig,
    connector: &dyn StoreConnector,
) -> TestConnectionResult {
    let Some(job) = config.job_specs(Direction::Download).into_iter().next() else {
        return TestConnectionResult {
            success: false,
            message: "没有配置要测试的桶".to_string(),
            details: None,
        };
    };

    let store = match connector.connect(&job.remote_name).await {
        Ok(store) => store,
        Err(e) => {
            return TestConnectionResult {
                success: false,
                message: "连接失败".to_string(),
                details: Some(format!("{:#}", e)),
            }
        }
    };

    match store.bucket_exists().await {
        Ok(true) => TestConnectionResult {
            success: true,
            message: "连接成功".to_string(),
            details: Some(format!("Bucket: {}", job.remote_name)),
        },
        Ok(false) => TestConnectionResult {
            success: false,
            message: "存储桶不存在".to_string(),
            details: Some(format!("Bucket: {}", job.remote_name)),
        },
        Err(e) => TestConnectionResult {
            success: false,
            message: "连接失败".to_string(),
            details: Some(format!("检查凭证和 bucket 名称: {:#}", e)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryConnector, MemoryStore};

    fn config(bucket: &str) -> AppConfig {
        AppConfig::from_json(&format!(
            r#"{{ "store": {{ "endpoint": "http://ceph:7480", "access_key": "ak", "secret_key": "sk" }}, "bucket": "{}" }}"#,
            bucket
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_connection_outcomes() {
        let connector = MemoryConnector::default()
            .with("ok", Arc::new(MemoryStore::new("ok")))
            .with("gone", Arc::new(MemoryStore::new("gone").without_bucket()));

        let result = test_connection(&config("ok"), &connector).await;
        assert!(result.success);

        let result = test_connection(&config("gone"), &connector).await;
        assert!(!result.success);
        assert_eq!(result.message, "存储桶不存在");

        let result = test_connection(&config("unknown"), &connector).await;
        assert_eq!(result.message, "连接失败");
        assert!(result.details.unwrap().contains("认证失败"));
    }

    #[tokio::test]
    async fn test_validate_reports_config_errors() {
        let result = validate(&config("your-bucket-name")).await;
        assert!(!result.success);
        assert_eq!(result.message, "配置验证失败");
    }
}
