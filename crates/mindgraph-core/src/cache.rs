//! On-disk HTML cache, one `<content id>.html` file per page
//!
//! Entries are written once and never invalidated. Writes go through a temporary
//! file and a rename so concurrent readers never observe a partial page.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct HtmlCache {
    dir: PathBuf,
}

impl HtmlCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, content_id: &str) -> PathBuf {
        self.dir.join(format!("{content_id}.html"))
    }

    /// Returns `Ok(None)` on a cache miss.
    pub async fn get(&self, content_id: &str) -> std::io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(content_id)).await {
            Ok(html) => Ok(Some(html)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Store a page unless one is already cached for this id.
    pub async fn put(&self, content_id: &str, html: &str) -> std::io::Result<()> {
        let target = self.path_for(content_id);
        if fs::try_exists(&target).await? {
            return Ok(());
        }

        fs::create_dir_all(&self.dir).await?;

        let temp = self.dir.join(format!(
            ".{content_id}.{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp, html).await?;

        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HtmlCache::new(dir.path().join("pages"));

        assert_eq!(cache.get("AA1").await.unwrap(), None);

        cache.put("AA1", "<p>hello</p>").await.unwrap();
        assert_eq!(cache.get("AA1").await.unwrap().as_deref(), Some("<p>hello</p>"));
        assert!(cache.path_for("AA1").ends_with("AA1.html"));
    }

    #[tokio::test]
    async fn test_first_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HtmlCache::new(dir.path());

        cache.put("AA1", "first").await.unwrap();
        cache.put("AA1", "second").await.unwrap();

        assert_eq!(cache.get("AA1").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HtmlCache::new(dir.path());

        cache.put("AA1", "page").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["AA1.html"]);
    }
}
