//! 以 SQLite 保存的影片庫

use super::video_record::{NewVideo, VideoRecord};
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};

pub struct LibraryStore {
    conn: Connection,
}

impl LibraryStore {
    /// 開啟（必要時建立）資料庫檔案
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("無法開啟影片庫: {}", path.display()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("無法建立記憶體資料庫")?;
        Self::initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS videos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                duration TEXT NOT NULL,
                resolution TEXT NOT NULL,
                file_path TEXT NOT NULL UNIQUE,
                thumbnail BLOB
            );
            ",
        )
        .context("無法建立影片庫資料表")?;
        Ok(())
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<VideoRecord> {
        let file_path: String = row.get(4)?;
        Ok(VideoRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            duration: row.get(2)?,
            resolution: row.get(3)?,
            file_path: PathBuf::from(file_path),
            thumbnail: row.get(5)?,
        })
    }

    /// 新增紀錄；相同路徑已存在時更新該筆紀錄
    pub fn add(&self, video: &NewVideo) -> Result<i64> {
        self.conn
            .query_row(
                "INSERT INTO videos (title, duration, resolution, file_path, thumbnail)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(file_path) DO UPDATE SET
                     title = excluded.title,
                     duration = excluded.duration,
                     resolution = excluded.resolution,
                     thumbnail = excluded.thumbnail
                 RETURNING id",
                params![
                    video.title,
                    video.duration,
                    video.resolution,
                    path_key(&video.file_path),
                    video.thumbnail,
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("無法寫入影片紀錄: {}", video.file_path.display()))
    }

    /// 依新增順序列出所有紀錄
    pub fn list(&self) -> Result<Vec<VideoRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, title, duration, resolution, file_path, thumbnail
                 FROM videos ORDER BY id",
            )
            .context("無法讀取影片庫")?;

        let rows = stmt
            .query_map([], Self::row_to_record)
            .context("無法讀取影片庫")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("無法讀取影片紀錄")
    }

    pub fn find_by_path(&self, path: &Path) -> Result<Option<VideoRecord>> {
        self.conn
            .query_row(
                "SELECT id, title, duration, resolution, file_path, thumbnail
                 FROM videos WHERE file_path = ?1",
                params![path_key(path)],
                Self::row_to_record,
            )
            .optional()
            .with_context(|| format!("無法查詢影片紀錄: {}", path.display()))
    }

    /// 刪除指定路徑的紀錄，回傳刪除筆數（路徑不存在時為 0）
    pub fn delete_by_path(&self, path: &Path) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM videos WHERE file_path = ?1",
                params![path_key(path)],
            )
            .with_context(|| format!("無法刪除影片紀錄: {}", path.display()))
    }

    pub fn update_thumbnail(&self, path: &Path, thumbnail: Option<&[u8]>) -> Result<bool> {
        let updated = self
            .conn
            .execute(
                "UPDATE videos SET thumbnail = ?1 WHERE file_path = ?2",
                params![thumbnail, path_key(path)],
            )
            .with_context(|| format!("無法更新縮圖: {}", path.display()))?;
        Ok(updated > 0)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
            .context("無法計算影片數量")?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn video(path: &str) -> NewVideo {
        let mut video = NewVideo::new(Path::new(path));
        video.duration = "02:05".to_string();
        video.resolution = "1920x1080".to_string();
        video
    }

    #[test]
    fn test_add_and_list() {
        let store = LibraryStore::in_memory().unwrap();
        store.add(&video("/videos/a.mp4")).unwrap();
        store.add(&video("/videos/b.mkv")).unwrap();

        let records = store.list().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "a");
        assert_eq!(records[0].duration, "02:05");
        assert_eq!(records[0].resolution, "1920x1080");
        assert_eq!(records[1].file_path, PathBuf::from("/videos/b.mkv"));
    }

    #[test]
    fn test_add_same_path_updates() {
        let store = LibraryStore::in_memory().unwrap();
        let first_id = store.add(&video("/videos/a.mp4")).unwrap();

        let mut updated = video("/videos/a.mp4");
        updated.title = "Renamed".to_string();
        updated.thumbnail = Some(vec![1, 2, 3]);
        let second_id = store.add(&updated).unwrap();

        assert_eq!(first_id, second_id);
        assert_eq!(store.count().unwrap(), 1);
        let record = store.find_by_path(Path::new("/videos/a.mp4")).unwrap().unwrap();
        assert_eq!(record.title, "Renamed");
        assert_eq!(record.thumbnail, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_delete_by_path() {
        let store = LibraryStore::in_memory().unwrap();
        store.add(&video("/videos/a.mp4")).unwrap();
        store.add(&video("/videos/b.mp4")).unwrap();

        assert_eq!(store.delete_by_path(Path::new("/videos/a.mp4")).unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.find_by_path(Path::new("/videos/a.mp4")).unwrap().is_none());

        // 不存在的路徑不影響其他紀錄
        assert_eq!(store.delete_by_path(Path::new("/videos/a.mp4")).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_update_thumbnail() {
        let store = LibraryStore::in_memory().unwrap();
        store.add(&video("/videos/a.mp4")).unwrap();

        assert!(store.update_thumbnail(Path::new("/videos/a.mp4"), Some(&[9u8, 9][..])).unwrap());
        assert!(!store.update_thumbnail(Path::new("/videos/none.mp4"), None).unwrap());

        let record = store.find_by_path(Path::new("/videos/a.mp4")).unwrap().unwrap();
        assert_eq!(record.thumbnail, Some(vec![9, 9]));
    }

    #[test]
    fn test_persist_across_open() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("video_library.db");

        {
            let store = LibraryStore::open(&db_path).unwrap();
            store.add(&video("/videos/a.mp4")).unwrap();
        }

        let store = LibraryStore::open(&db_path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
