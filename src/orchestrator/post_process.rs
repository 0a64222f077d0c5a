//! Post-run processing.
//!
//! Handles the commit of a finished run and rebuilding the comparison profile from
//! the stored history.

use crate::comparison::ComparisonProfile;
use crate::error::SplitsError;
use crate::model::{Route, RunId};
use crate::storage::SplitStore;
use crate::timer::LiveRun;
use anyhow::{Context, Result};

/// Load a route's history and derive its comparison profile.
pub(crate) fn load_profile(store: &dyn SplitStore, route: &Route) -> Result<ComparisonProfile> {
    let runs = store
        .runs_for_route(route.id)
        .with_context(|| format!("load runs for route '{}'", route.name))?;
    let profile = ComparisonProfile::compute(&route.segments, &runs)
        .with_context(|| format!("history of route '{}' is inconsistent", route.name))?;
    Ok(profile)
}

/// Write a finished run. The live run is only borrowed, so a failure leaves it intact
/// for another attempt at saving.
pub(crate) fn commit_finished_run(
    store: &mut dyn SplitStore,
    route: &Route,
    run: &LiveRun,
) -> Result<RunId, SplitsError> {
    let payload = run.commit_payload(route.id).ok_or(SplitsError::InvalidTransition {
        op: "save",
        status: run.status().as_str(),
    })?;
    store.commit_run(&payload).map_err(SplitsError::persistence)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::comparison::tests::secs;
    use crate::model::{Category, CategoryId, CategorySummary, HistoricalRun, RouteId, RunCommit};
    use crate::storage::tests::temp_store;
    use std::time::Instant;

    /// Store whose writes always fail, for exercising the retry path.
    pub(crate) struct ReadOnlyStore<S>(pub(crate) S);

    impl<S: SplitStore> SplitStore for ReadOnlyStore<S> {
        fn categories(&self) -> Result<Vec<CategorySummary>> {
            self.0.categories()
        }
        fn create_category(&mut self, _: &str) -> Result<Category> {
            anyhow::bail!("store is read-only")
        }
        fn routes_in_category(&self, id: CategoryId) -> Result<Vec<Route>> {
            self.0.routes_in_category(id)
        }
        fn create_route(&mut self, _: CategoryId, _: &str, _: &[String]) -> Result<Route> {
            anyhow::bail!("store is read-only")
        }
        fn route(&self, id: RouteId) -> Result<Option<Route>> {
            self.0.route(id)
        }
        fn find_route(&self, name: &str) -> Result<Option<Route>> {
            self.0.find_route(name)
        }
        fn category(&self, id: CategoryId) -> Result<Option<CategorySummary>> {
            self.0.category(id)
        }
        fn runs_for_route(&self, id: RouteId) -> Result<Vec<HistoricalRun>> {
            self.0.runs_for_route(id)
        }
        fn commit_run(&mut self, _: &RunCommit) -> Result<RunId> {
            anyhow::bail!("store is read-only")
        }
    }

    pub(crate) fn finished_run(route: &Route, profile: &ComparisonProfile) -> LiveRun {
        let t0 = Instant::now();
        let mut run = LiveRun::new(route.len(), profile);
        run.start(t0).unwrap();
        for i in 1..=route.len() as u64 {
            run.advance(profile, t0 + secs(10 * i)).unwrap();
        }
        run
    }

    #[test]
    fn commit_then_reload_includes_the_run() {
        let (_dir, mut store) = temp_store();
        let c = store.create_category("Portal").unwrap();
        let route = store
            .create_route(c.id, "Inbounds", &["00-01".into(), "02-03".into()])
            .unwrap();
        let profile = load_profile(&store, &route).unwrap();
        assert!(!profile.has_history());

        let run = finished_run(&route, &profile);
        commit_finished_run(&mut store, &route, &run).unwrap();

        let profile = load_profile(&store, &route).unwrap();
        assert_eq!(profile.total_runs, 1);
        assert_eq!(profile.gold, vec![secs(10), secs(10)]);
        assert_eq!(profile.personal_best, Some(secs(20)));
    }

    #[test]
    fn unfinished_run_cannot_be_committed() {
        let (_dir, mut store) = temp_store();
        let c = store.create_category("Portal").unwrap();
        let route = store.create_route(c.id, "Inbounds", &["a".into()]).unwrap();
        let run = LiveRun::new(1, &ComparisonProfile::default());
        let err = commit_finished_run(&mut store, &route, &run).unwrap_err();
        assert!(matches!(err, SplitsError::InvalidTransition { op: "save", .. }));
    }

    #[test]
    fn failed_commit_is_retryable_and_keeps_the_run() {
        let (_dir, mut store) = temp_store();
        let c = store.create_category("Portal").unwrap();
        let route = store.create_route(c.id, "Inbounds", &["a".into()]).unwrap();
        let profile = load_profile(&store, &route).unwrap();
        let run = finished_run(&route, &profile);

        let mut failing = ReadOnlyStore(store);
        let err = commit_finished_run(&mut failing, &route, &run).unwrap_err();
        assert!(err.is_retryable());
        assert!(run.is_finished());
        assert_eq!(run.finalized_total(), Some(secs(10)));

        let mut store = failing.0;
        commit_finished_run(&mut store, &route, &run).unwrap();
        assert_eq!(store.runs_for_route(route.id).unwrap().len(), 1);
    }
}
