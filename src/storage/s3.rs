use super::{
    normalize_etag, ObjectPage, ObjectReader, ObjectStore, RemoteObject, StoreConnector,
    IO_TIMEOUT_SECS, LIST_PAGE_SIZE, OP_TIMEOUT_SECS,
};
use crate::config::StoreSettings;
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Metakey, Operator};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::debug;

/// 分块上传的块大小
const WRITE_CHUNK_SIZE: usize = 8 * 1024 * 1024;
/// 读取本地流的缓冲大小
const READ_BUF_SIZE: usize = 256 * 1024;
/// us-east-1 创建桶时不能带 LocationConstraint
const DEFAULT_REGION: &str = "us-east-1";

/// S3 兼容存储（单个存储桶）
///
/// 对象读写与列举走 opendal，存储桶的检查与创建走 aws-sdk-s3
/// （opendal 不提供桶级别的管理接口）。
pub struct S3Storage {
    operator: Operator,
    admin: aws_sdk_s3::Client,
    bucket: String,
    region: String,
    name: String,
}

impl S3Storage {
    pub fn new(settings: &StoreSettings, bucket: &str) -> Result<Self> {
        use opendal::services::S3;

        // 默认路径风格访问，兼容 Ceph / MinIO
        let builder = S3::default()
            .bucket(bucket)
            .region(&settings.region)
            .endpoint(&settings.endpoint)
            .access_key_id(&settings.access_key)
            .secret_access_key(&settings.secret_key);

        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "objectsync",
        );
        let admin_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&settings.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            operator,
            admin: aws_sdk_s3::Client::from_conf(admin_config),
            bucket: bucket.to_string(),
            region: settings.region.clone(),
            name: format!("s3://{}", bucket),
        })
    }

    fn to_remote(key: String, meta: &opendal::Metadata) -> RemoteObject {
        RemoteObject {
            key,
            etag: normalize_etag(meta.etag()),
            last_modified: meta.last_modified().unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            size: meta.content_length(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn list_page(&self, cursor: Option<&str>) -> Result<ObjectPage> {
        let mut request = self
            .operator
            .lister_with("")
            .recursive(true)
            .metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::Etag | Metakey::Mode);
        if let Some(after) = cursor {
            request = request.start_after(after);
        }
        let mut lister = request.await?;

        let mut objects = Vec::new();
        while let Some(entry) = lister.try_next().await? {
            let key = entry.path().trim_start_matches('/').to_string();

            // 跳过根目录
            if key.is_empty() {
                continue;
            }

            if objects.len() == LIST_PAGE_SIZE {
                let next_cursor = objects.last().map(|o: &RemoteObject| o.key.clone());
                return Ok(ObjectPage {
                    objects,
                    is_truncated: true,
                    next_cursor,
                });
            }

            objects.push(Self::to_remote(key, entry.metadata()));
        }

        Ok(ObjectPage {
            objects,
            is_truncated: false,
            next_cursor: None,
        })
    }

    async fn stat(&self, key: &str) -> Result<Option<RemoteObject>> {
        match self.operator.stat(key).await {
            Ok(meta) => Ok(Some(Self::to_remote(key.to_string(), &meta))),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader> {
        let reader = self.operator.reader(key).await?;
        let stream = reader.into_bytes_stream(..).await?;
        Ok(Box::pin(StreamReader::new(stream)))
    }

    async fn put_object(&self, key: &str, body: ObjectReader, size: u64) -> Result<()> {
        // 目录标记只能通过 create_dir 写入
        if key.ends_with('/') {
            self.operator.create_dir(key).await?;
            return Ok(());
        }

        let mut writer = self
            .operator
            .writer_with(key)
            .chunk(WRITE_CHUNK_SIZE)
            .await?;
        let mut stream = ReaderStream::with_capacity(body, READ_BUF_SIZE);
        let mut written = 0u64;
        while let Some(chunk) = stream.try_next().await? {
            written += chunk.len() as u64;
            writer.write(chunk).await?;
        }
        writer.close().await?;

        if written != size {
            debug!("{}: 写入 {} 字节, 扫描时大小 {}", key, written, size);
        }
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool> {
        match self.admin.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn create_bucket(&self) -> Result<()> {
        let mut request = self.admin.create_bucket().bucket(&self.bucket);
        if self.region != DEFAULT_REGION {
            let location = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build();
            request = request.create_bucket_configuration(location);
        }
        request.send().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 根据连接配置为每个存储桶创建 S3 存储
pub struct S3Connector {
    settings: StoreSettings,
}

impl S3Connector {
    pub fn new(settings: StoreSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl StoreConnector for S3Connector {
    async fn connect(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        tracing::info!("初始化S3存储: bucket={}, endpoint={}", bucket, self.settings.endpoint);
        Ok(Arc::new(S3Storage::new(&self.settings, bucket)?) as Arc<dyn ObjectStore>)
    }
}
