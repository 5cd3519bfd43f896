use chrono::{DateTime, Utc};
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

/// 本地目录中的一个条目
#[derive(Debug, Clone)]
pub struct LocalEntry {
    /// 相对路径，统一使用 `/`，目录以 `/` 结尾
    pub key: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

/// 以某个目录为根的本地文件树
#[derive(Debug, Clone)]
pub struct LocalTree {
    base_path: PathBuf,
}

impl LocalTree {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 将对象键解析为本地路径，拒绝逃逸出根目录的键
    pub fn resolve(&self, key: &str) -> io::Result<PathBuf> {
        let relative = Path::new(key.trim_end_matches('/'));
        let mut resolved = self.base_path.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("非法的对象键: {}", key),
                    ))
                }
            }
        }
        if resolved == self.base_path {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("对象键没有有效路径: {}", key),
            ));
        }
        Ok(resolved)
    }

    /// 递归遍历目录，任何遍历错误都视为失败
    pub async fn walk(&self) -> io::Result<Vec<LocalEntry>> {
        let base = self.base_path.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        tokio::task::spawn_blocking(move || Self::walk_blocking(&base))
            .await
            .map_err(io::Error::other)?
    }

    fn walk_blocking(base: &Path) -> io::Result<Vec<LocalEntry>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(base).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(base)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

            // 跳过根目录本身
            if relative.as_os_str().is_empty() {
                continue;
            }

            let metadata = entry.metadata().map_err(io::Error::from)?;
            let mut key = normalize_key(relative);
            let is_dir = metadata.is_dir();
            if is_dir {
                key.push('/');
            }

            entries.push(LocalEntry {
                key,
                size: if is_dir { 0 } else { metadata.len() },
                modified: DateTime::<Utc>::from(metadata.modified()?),
                is_dir,
            });
        }

        Ok(entries)
    }

    /// 检查键对应的文件或目录是否存在
    pub async fn exists(&self, key: &str) -> io::Result<bool> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn create_dir(&self, key: &str) -> io::Result<PathBuf> {
        let path = self.resolve(key)?;
        fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// 在目标旁创建临时文件 `<name>.part`，按需创建父目录
    ///
    /// 写完后用 [`PartialFile::commit`] 替换目标；目标文件在此之前不会被改动。
    pub async fn create_partial(&self, key: &str) -> io::Result<PartialFile> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".part");
        let temp_path = path.with_file_name(name);
        let file = fs::File::create(&temp_path).await?;
        Ok(PartialFile {
            path,
            temp_path,
            file,
        })
    }

    pub async fn open(&self, key: &str) -> io::Result<fs::File> {
        fs::File::open(self.resolve(key)?).await
    }
}

/// 尚未落盘到目标路径的下载文件
pub struct PartialFile {
    pub path: PathBuf,
    pub temp_path: PathBuf,
    pub file: fs::File,
}

impl PartialFile {
    /// 刷新并关闭临时文件，再重命名为目标文件
    pub async fn commit(mut self) -> io::Result<PathBuf> {
        self.file.flush().await?;
        drop(self.file);
        fs::rename(&self.temp_path, &self.path).await?;
        Ok(self.path)
    }

    /// 丢弃临时文件
    pub async fn discard(self) {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
    }
}

/// 设置修改时间（调用方只记录失败，不中断传输）
pub fn set_modified(path: &Path, modified: DateTime<Utc>) -> io::Result<()> {
    let mtime = filetime::FileTime::from_system_time(modified.into());
    filetime::set_file_mtime(path, mtime)
}

/// 规范化路径分隔符（统一使用 /）
fn normalize_key(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}
