//! Run history storage.
//!
//! Everything lives in one JSON document under the data directory. Reads load the
//! whole document; writes go to a temporary file that is synced and renamed over the
//! existing one, so a failed write never leaves a half-written history behind.

use crate::model::{
    Category, CategoryId, CategorySummary, HistoricalRun, Route, RouteId, RunCommit, RunId,
    SegmentName, SegmentRecord,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

const DB_FILE: &str = "splits.json";

/// Storage operations the timer needs. Implementations must keep runs in
/// chronological order per route.
pub trait SplitStore {
    fn categories(&self) -> Result<Vec<CategorySummary>>;
    fn create_category(&mut self, name: &str) -> Result<Category>;
    fn routes_in_category(&self, category_id: CategoryId) -> Result<Vec<Route>>;
    fn create_route(
        &mut self,
        category_id: CategoryId,
        name: &str,
        segment_names: &[String],
    ) -> Result<Route>;
    fn route(&self, id: RouteId) -> Result<Option<Route>>;
    fn find_route(&self, name: &str) -> Result<Option<Route>>;
    fn category(&self, id: CategoryId) -> Result<Option<CategorySummary>>;
    fn runs_for_route(&self, id: RouteId) -> Result<Vec<HistoricalRun>>;
    fn commit_run(&mut self, commit: &RunCommit) -> Result<RunId>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    routes: Vec<Route>,
    #[serde(default)]
    runs: Vec<HistoricalRun>,
}

impl Database {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn summarize(&self, category: &Category) -> CategorySummary {
        let route_ids: Vec<RouteId> = self
            .routes
            .iter()
            .filter(|r| r.category_id == category.id)
            .map(|r| r.id)
            .collect();
        let runs = self.runs.iter().filter(|r| route_ids.contains(&r.route_id));
        let (best, total_runs) = runs.fold((None, 0), |(best, n), r| {
            let best = match best {
                Some(b) if b <= r.total => Some(b),
                _ => Some(r.total),
            };
            (best, n + 1)
        });
        CategorySummary {
            category: category.clone(),
            best,
            total_runs,
        }
    }
}

/// File-backed store rooted at a data directory.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("create data dir {}", dir.display()))?;
        Ok(Self {
            path: dir.join(DB_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Database> {
        if !self.path.exists() {
            return Ok(Database::default());
        }
        let data = fs::read(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        serde_json::from_slice(&data).with_context(|| format!("parse {}", self.path.display()))
    }

    fn save(&self, db: &Database) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(db)?;
        {
            let mut f =
                fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
            f.write_all(&data)
                .with_context(|| format!("write {}", tmp.display()))?;
            f.sync_all().context("sync splits file")?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }

    fn update<T>(&mut self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut db = self.load()?;
        let out = f(&mut db)?;
        self.save(&db)?;
        Ok(out)
    }
}

/// Default data directory: `<platform data dir>/splitwatch`.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("no data directory available on this platform")?;
    Ok(base.join("splitwatch"))
}

impl SplitStore for JsonStore {
    fn categories(&self) -> Result<Vec<CategorySummary>> {
        let db = self.load()?;
        Ok(db.categories.iter().map(|c| db.summarize(c)).collect())
    }

    fn create_category(&mut self, name: &str) -> Result<Category> {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("category name is required");
        }
        self.update(|db| {
            if db.categories.iter().any(|c| c.name == name) {
                bail!("category '{name}' already exists");
            }
            let category = Category {
                id: db.allocate_id(),
                name,
            };
            db.categories.push(category.clone());
            Ok(category)
        })
    }

    fn routes_in_category(&self, category_id: CategoryId) -> Result<Vec<Route>> {
        Ok(self
            .load()?
            .routes
            .into_iter()
            .filter(|r| r.category_id == category_id)
            .collect())
    }

    fn create_route(
        &mut self,
        category_id: CategoryId,
        name: &str,
        segment_names: &[String],
    ) -> Result<Route> {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("route name is required");
        }
        if segment_names.is_empty() {
            bail!("route '{name}' needs at least one segment");
        }
        if segment_names.iter().any(|s| s.trim().is_empty()) {
            bail!("segment names must not be empty");
        }
        self.update(|db| {
            if !db.categories.iter().any(|c| c.id == category_id) {
                bail!("category {category_id} not found");
            }
            if db.routes.iter().any(|r| r.name == name) {
                bail!("route '{name}' already exists");
            }
            let id = db.allocate_id();
            let segments = segment_names
                .iter()
                .enumerate()
                .map(|(i, s)| SegmentName {
                    id: db.allocate_id(),
                    position: i as u32 + 1,
                    name: s.trim().to_string(),
                })
                .collect();
            let route = Route {
                id,
                category_id,
                name,
                segments,
            };
            db.routes.push(route.clone());
            Ok(route)
        })
    }

    fn route(&self, id: RouteId) -> Result<Option<Route>> {
        Ok(self.load()?.routes.into_iter().find(|r| r.id == id))
    }

    fn find_route(&self, name: &str) -> Result<Option<Route>> {
        let name = name.trim();
        Ok(self.load()?.routes.into_iter().find(|r| r.name == name))
    }

    fn category(&self, id: CategoryId) -> Result<Option<CategorySummary>> {
        let db = self.load()?;
        Ok(db
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| db.summarize(c)))
    }

    fn runs_for_route(&self, id: RouteId) -> Result<Vec<HistoricalRun>> {
        let mut runs: Vec<HistoricalRun> = self
            .load()?
            .runs
            .into_iter()
            .filter(|r| r.route_id == id)
            .collect();
        runs.sort_by_key(|r| r.created_at);
        Ok(runs)
    }

    fn commit_run(&mut self, commit: &RunCommit) -> Result<RunId> {
        self.update(|db| {
            let route = db
                .routes
                .iter()
                .find(|r| r.id == commit.route_id)
                .with_context(|| format!("route {} not found", commit.route_id))?;
            if route.segments.len() != commit.segment_durations.len() {
                bail!(
                    "run has {} segments, route '{}' has {}",
                    commit.segment_durations.len(),
                    route.name,
                    route.segments.len()
                );
            }
            let segment_ids: Vec<_> = route.segments.iter().map(|s| s.id).collect();

            let id = db.allocate_id();
            let segments = segment_ids
                .into_iter()
                .zip(&commit.segment_durations)
                .map(|(segment_id, d)| SegmentRecord {
                    run_id: id,
                    segment_id,
                    duration: *d,
                })
                .collect();
            db.runs.push(HistoricalRun {
                id,
                route_id: commit.route_id,
                total: commit.total,
                segments,
                created_at: OffsetDateTime::now_utc(),
            });
            Ok(id)
        })
    }
}

/// Export a route's runs as pretty JSON.
pub fn export_json(path: &Path, route: &Route, runs: &[HistoricalRun]) -> Result<()> {
    #[derive(Serialize)]
    struct Export<'a> {
        route: &'a Route,
        runs: &'a [HistoricalRun],
    }
    let data = serde_json::to_vec_pretty(&Export { route, runs })?;
    fs::write(path, data).with_context(|| format!("write {}", path.display()))
}

/// Export a route's runs as CSV, one row per run, durations in milliseconds.
pub fn export_csv(path: &Path, route: &Route, runs: &[HistoricalRun]) -> Result<()> {
    let mut out = String::new();
    out.push_str("run_id,created_at,total_ms");
    for s in &route.segments {
        out.push(',');
        out.push_str(&csv_field(&s.name));
    }
    out.push('\n');
    for r in runs {
        let created = r
            .created_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        out.push_str(&format!("{},{},{}", r.id, created, r.total.as_millis()));
        for d in r.segment_durations() {
            out.push_str(&format!(",{}", d.as_millis()));
        }
        out.push('\n');
    }
    fs::write(path, out).with_context(|| format!("write {}", path.display()))
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    pub(crate) fn temp_store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn ms(v: &[u64]) -> Vec<Duration> {
        v.iter().map(|m| Duration::from_millis(*m)).collect()
    }

    #[test]
    fn empty_store_has_nothing() {
        let (_dir, store) = temp_store();
        assert!(store.categories().unwrap().is_empty());
        assert_eq!(store.find_route("any%").unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn create_category_and_route() {
        let (_dir, mut store) = temp_store();
        let c = store.create_category("Super Mario 64").unwrap();
        let r = store
            .create_route(c.id, "16 Star", &names(&["BoB", "WF", "CCM"]))
            .unwrap();

        assert_eq!(r.segments.len(), 3);
        assert_eq!(
            r.segments.iter().map(|s| s.position).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(store.find_route("16 Star").unwrap(), Some(r.clone()));
        assert_eq!(store.route(r.id).unwrap(), Some(r.clone()));
        assert_eq!(store.routes_in_category(c.id).unwrap(), vec![r]);
    }

    #[test]
    fn names_are_validated() {
        let (_dir, mut store) = temp_store();
        assert!(store.create_category("  ").is_err());
        let c = store.create_category("Celeste").unwrap();
        assert!(store.create_category("Celeste").is_err());
        assert!(store.create_route(c.id, "Any%", &[]).is_err());
        assert!(store.create_route(c.id, "Any%", &names(&["a", ""])).is_err());
        assert!(store.create_route(999, "Any%", &names(&["a"])).is_err());
        store.create_route(c.id, "Any%", &names(&["a"])).unwrap();
        assert!(store.create_route(c.id, "Any%", &names(&["b"])).is_err());
    }

    #[test]
    fn commit_run_round_trips_through_disk() {
        let (dir, mut store) = temp_store();
        let c = store.create_category("Celeste").unwrap();
        let r = store.create_route(c.id, "Any%", &names(&["1A", "2A"])).unwrap();

        let id = store
            .commit_run(&RunCommit {
                route_id: r.id,
                segment_durations: ms(&[61_234, 90_500]),
                total: Duration::from_millis(151_734),
            })
            .unwrap();

        let reopened = JsonStore::open(dir.path()).unwrap();
        let runs = reopened.runs_for_route(r.id).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, id);
        assert_eq!(runs[0].total, Duration::from_millis(151_734));
        assert_eq!(
            runs[0].segments.iter().map(|s| s.segment_id).collect::<Vec<_>>(),
            r.segments.iter().map(|s| s.id).collect::<Vec<_>>()
        );
        assert_eq!(runs[0].segment_durations().collect::<Vec<_>>(), ms(&[61_234, 90_500]));

        let summary = reopened.category(c.id).unwrap().unwrap();
        assert_eq!(summary.total_runs, 1);
        assert_eq!(summary.best, Some(Duration::from_millis(151_734)));
    }

    #[test]
    fn commit_with_wrong_segment_count_is_rejected() {
        let (_dir, mut store) = temp_store();
        let c = store.create_category("Celeste").unwrap();
        let r = store.create_route(c.id, "Any%", &names(&["1A", "2A"])).unwrap();
        let err = store
            .commit_run(&RunCommit {
                route_id: r.id,
                segment_durations: ms(&[1_000]),
                total: Duration::from_secs(1),
            })
            .unwrap_err();
        assert!(err.to_string().contains("1 segments"));
        assert!(store.runs_for_route(r.id).unwrap().is_empty());
    }

    #[test]
    fn category_best_spans_routes() {
        let (_dir, mut store) = temp_store();
        let c = store.create_category("Celeste").unwrap();
        let a = store.create_route(c.id, "Any%", &names(&["x"])).unwrap();
        let b = store.create_route(c.id, "Any% glitchless", &names(&["x"])).unwrap();
        for (route, secs) in [(a.id, 50), (b.id, 40), (a.id, 45)] {
            store
                .commit_run(&RunCommit {
                    route_id: route,
                    segment_durations: vec![Duration::from_secs(secs)],
                    total: Duration::from_secs(secs),
                })
                .unwrap();
        }
        let summaries = store.categories().unwrap();
        assert_eq!(summaries[0].total_runs, 3);
        assert_eq!(summaries[0].best, Some(Duration::from_secs(40)));
        assert_eq!(store.runs_for_route(a.id).unwrap().len(), 2);
    }

    #[test]
    fn corrupt_file_is_an_error_not_an_empty_store() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), b"{not json").unwrap();
        assert!(store.categories().is_err());
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let (dir, mut store) = temp_store();
        let c = store.create_category("Celeste").unwrap();
        let r = store
            .create_route(c.id, "Any%", &names(&["Forsaken City", "Old Site, part 1"]))
            .unwrap();
        store
            .commit_run(&RunCommit {
                route_id: r.id,
                segment_durations: ms(&[1_500, 2_250]),
                total: Duration::from_millis(3_750),
            })
            .unwrap();
        let runs = store.runs_for_route(r.id).unwrap();

        let path = dir.path().join("out.csv");
        export_csv(&path, &r, &runs).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("run_id,created_at,total_ms,Forsaken City,\"Old Site, part 1\"")
        );
        assert!(lines.next().unwrap().ends_with(",3750,1500,2250"));

        let json_path = dir.path().join("out.json");
        export_json(&json_path, &r, &runs).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&fs::read(&json_path).unwrap()).unwrap();
        assert_eq!(v["route"]["name"], "Any%");
        assert_eq!(v["runs"][0]["total"], "3s 750ms");
    }
}
