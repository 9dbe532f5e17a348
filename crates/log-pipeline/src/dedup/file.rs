//! 파일 기반 중복 제거 저장소
//!
//! 테이블 하나를 `<data_dir>/<table>.json` 문서 하나로 저장합니다.
//! 기록은 쓰기마다 새 임시 파일에 쓴 뒤 대상 경로로 persist하며, 그 시점에
//! 만료된 엔트리를 정리합니다. 손상된 문서는 다음 기록 때 옆으로 옮기고
//! 빈 문서로 다시 시작합니다.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use sqlsentinel_core::types::DedupEntry;

use super::DedupStore;
use crate::error::LogPipelineError;

const BACKEND: &str = "file";

/// 문서 경로별 쓰기 잠금 (같은 프로세스의 모든 인스턴스가 공유)
static PATH_LOCKS: LazyLock<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(Default::default);

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = PATH_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    locks.entry(path.to_path_buf()).or_default().clone()
}

/// 테이블 문서 형식
#[derive(Debug, Default, Serialize, Deserialize)]
struct TableDocument {
    table: String,
    items: Vec<DedupEntry>,
}

/// 디스크에서 읽은 문서 상태
enum Loaded {
    Document(TableDocument),
    Corrupt(serde_json::Error),
}

/// 파일 저장소
#[derive(Debug, Clone)]
pub struct FileDedupStore {
    table: String,
    data_dir: PathBuf,
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileDedupStore {
    /// 데이터 디렉토리를 만들고 테이블 저장소를 엽니다.
    pub async fn open(
        data_dir: impl AsRef<Path>,
        table_name: &str,
    ) -> Result<Self, LogPipelineError> {
        if table_name.is_empty()
            || !table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            || table_name.starts_with('.')
        {
            return Err(LogPipelineError::Config {
                field: "dedup.table_name".to_owned(),
                reason: format!("'{table_name}' is not a valid table name"),
            });
        }

        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| store_error(format!("create {}: {e}", data_dir.display())))?;

        let path = data_dir.join(format!("{table_name}.json"));
        tracing::debug!(path = %path.display(), "file dedup store opened");

        Ok(Self {
            table: table_name.to_owned(),
            data_dir: data_dir.to_path_buf(),
            write_lock: lock_for(&path),
            path,
        })
    }

    /// 테이블 문서 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 손상된 문서를 옮겨 둘 경로
    pub fn quarantine_path(&self) -> PathBuf {
        self.path.with_extension("json.corrupt")
    }

    fn empty_document(&self) -> TableDocument {
        TableDocument {
            table: self.table.clone(),
            items: Vec::new(),
        }
    }

    async fn load(&self) -> Result<Loaded, LogPipelineError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(match serde_json::from_slice(&bytes) {
                Ok(document) => Loaded::Document(document),
                Err(e) => Loaded::Corrupt(e),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Loaded::Document(self.empty_document())),
            Err(e) => Err(store_error(format!("read {}: {e}", self.path.display()))),
        }
    }

    async fn read_document(&self) -> Result<TableDocument, LogPipelineError> {
        match self.load().await? {
            Loaded::Document(document) => Ok(document),
            Loaded::Corrupt(e) => Err(store_error(format!("corrupt table document: {e}"))),
        }
    }

    /// 손상된 문서를 옆으로 옮기고 빈 문서를 돌려줍니다.
    async fn quarantine(&self, cause: &serde_json::Error) -> Result<TableDocument, LogPipelineError> {
        let target = self.quarantine_path();
        tracing::warn!(
            table = %self.table,
            path = %self.path.display(),
            quarantine = %target.display(),
            error = %cause,
            "corrupt dedup table document moved aside, starting empty"
        );
        match tokio::fs::rename(&self.path, &target).await {
            Ok(()) => {}
            // 다른 기록자가 먼저 옮긴 경우
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(store_error(format!("rename {}: {e}", self.path.display())));
            }
        }
        Ok(self.empty_document())
    }

    async fn write_document(&self, document: &TableDocument) -> Result<(), LogPipelineError> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let data_dir = self.data_dir.clone();
        let target = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<(), LogPipelineError> {
            let tmp = NamedTempFile::new_in(&data_dir)
                .map_err(|e| store_error(format!("temp file in {}: {e}", data_dir.display())))?;
            std::fs::write(tmp.path(), &bytes)
                .map_err(|e| store_error(format!("write {}: {e}", tmp.path().display())))?;
            tmp.persist(&target)
                .map_err(|e| store_error(format!("persist {}: {}", target.display(), e.error)))?;
            Ok(())
        })
        .await
        .map_err(|e| store_error(format!("write task failed: {e}")))?
    }
}

fn store_error(reason: String) -> LogPipelineError {
    LogPipelineError::Store {
        backend: BACKEND.to_owned(),
        reason,
    }
}

impl DedupStore for FileDedupStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn latest_entry(
        &self,
        error_number: u32,
        now_millis: i64,
    ) -> Result<Option<DedupEntry>, LogPipelineError> {
        let document = self.read_document().await?;
        Ok(document
            .items
            .into_iter()
            .filter(|e| e.error_number == error_number && !e.is_expired_at(now_millis))
            .max_by_key(|e| e.timestamp_millis))
    }

    async fn put_entry(&self, entry: DedupEntry) -> Result<(), LogPipelineError> {
        let _guard = self.write_lock.lock().await;

        let mut document = match self.load().await? {
            Loaded::Document(document) => document,
            Loaded::Corrupt(e) => self.quarantine(&e).await?,
        };
        let before = document.items.len();
        document
            .items
            .retain(|e| !e.is_expired_at(entry.timestamp_millis));
        let purged = before - document.items.len();
        document.items.push(entry);

        self.write_document(&document).await?;
        if purged > 0 {
            tracing::debug!(purged, table = %self.table, "expired dedup entries purged");
        }
        Ok(())
    }
}
