//! Deployment pipeline tests
//!
//! Exercise the crates together the way a deployment does: clone a datasets
//! repository, load its fragments, pull upstream changes, reload, diff,
//! overlay secrets, render datasets.xml and flag the changed datasets.

use std::fs;
use std::path::{Path, PathBuf};

use erddap_fs::{NormalizedPath, io};
use erddap_git::{DatasetsRepo, PullOutcome};
use erddap_registry::{
    DiffStatus, LiveRegistry, Registry, Source, Value, diff, merge_secrets, render,
    secrets_from_vars,
};
use erddap_test_utils::fragments::{dataset, document};
use erddap_test_utils::git::{commit_files, upstream_repo};
use tempfile::TempDir;

/// The shared datasets.xml fixture
fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../test-fixtures/datasets/datasets.xml")
}

fn fixture() -> String {
    fs::read_to_string(fixture_path()).unwrap()
}

// =============================================================================
// Fixture document
// =============================================================================

mod fixture_document {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixture_shapes() {
        let registry = Registry::load_file(fixture_path()).unwrap();

        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec!["buoy_obs", "sst_daily", "remote_glider"]
        );
        assert_eq!(
            registry.settings().keys().collect::<Vec<_>>(),
            vec![
                "cacheMinutes",
                "loadDatasetsMinMinutes",
                "partialRequestMaxBytes",
                "drawLandMask",
                "user"
            ]
        );

        let buoy = registry.dataset("buoy_obs").unwrap();
        assert_eq!(buoy.kind, "EDDTableFromDatabase");
        assert_eq!(buoy.fields["connectionProperty"].as_list().unwrap().len(), 3);
        assert_eq!(buoy.fields["dataVariable"].as_list().unwrap().len(), 3);
        assert_eq!(buoy.fields["catalogName"], Value::Text(String::new()));
        assert_eq!(buoy.get("reloadEveryNMinutes"), Some(Value::scalar("10080")));

        let sst = registry.dataset("sst_daily").unwrap();
        let title = &sst.fields["addAttributes"].as_block().unwrap().children["att"];
        assert_eq!(
            title.as_block().unwrap().text,
            "Daily sea surface temperature & anomaly"
        );

        assert_eq!(buoy.attributes["active"], "true");
        assert_eq!(registry.dataset("remote_glider").unwrap().attributes["active"], "false");
    }

    #[test]
    fn test_fixture_render_is_stable() {
        let registry = Registry::load_file(fixture_path()).unwrap();
        let first = render(&registry).unwrap();

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("datasets.xml");
        fs::write(&path, &first).unwrap();
        let reloaded = Registry::load_file(&path).unwrap();

        assert!(!diff(&registry, &reloaded).has_changes());
        assert_eq!(render(&reloaded).unwrap(), first);
    }
}

// =============================================================================
// Git-backed deployment
// =============================================================================

mod deployment {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Deployment {
        _temp: TempDir,
        upstream: PathBuf,
        repo: DatasetsRepo,
        live: LiveRegistry,
        output: PathBuf,
        flags: NormalizedPath,
    }

    fn deploy() -> Deployment {
        let temp = TempDir::new().unwrap();
        let upstream = temp.path().join("upstream");
        upstream_repo(
            &upstream,
            &[
                ("datasets.d/000-base.xml", &fixture()),
                (
                    "datasets.d/900-overrides.xml",
                    &document(&dataset(
                        "remote_glider",
                        "EDDTableFromErddap",
                        &[("sourceUrl", "https://erddap.example.org/erddap/tabledap/glider")],
                    )),
                ),
            ],
        );

        let clone = temp.path().join("clone");
        let repo = DatasetsRepo::open_or_clone(upstream.to_str(), &clone).unwrap();
        let (live, report) =
            LiveRegistry::load(Source::fragments(&clone, "datasets.d/*.xml", true)).unwrap();
        assert!(report.warnings.is_empty());

        Deployment {
            output: temp.path().join("content/datasets.xml"),
            flags: NormalizedPath::new(temp.path().join("erddapData/erddap/hardFlag")),
            _temp: temp,
            upstream,
            repo,
            live,
        }
    }

    #[test]
    fn test_initial_load_merges_overrides() {
        let deployment = deploy();
        let snapshot = deployment.live.snapshot();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.files().len(), 2);
        let glider = snapshot.dataset("remote_glider").unwrap();
        // Later fragments override per key; untouched keys survive
        assert_eq!(glider.attributes["active"], "true");
        assert_eq!(glider.fields["redirect"], Value::scalar("false"));
        assert_eq!(
            snapshot.ids().collect::<Vec<_>>(),
            vec!["buoy_obs", "sst_daily", "remote_glider"]
        );
    }

    #[test]
    fn test_pull_reload_diff_render_and_flag() {
        let deployment = deploy();
        let before = deployment.live.snapshot();

        commit_files(
            &deployment.upstream,
            &[
                (
                    "datasets.d/sst/950-sst.xml",
                    &document(&dataset(
                        "sst_daily",
                        "EDDGridFromNcFiles",
                        &[("reloadEveryNMinutes", "60"), ("fileDir", "/data/sst/daily/")],
                    )),
                ),
                (
                    "datasets.d/960-waves.xml",
                    &document(&dataset("wave_spectra", "EDDTableFromNcFiles", &[])),
                ),
            ],
            "Faster sst reloads, add wave spectra",
        );

        let outcome = deployment.repo.pull().unwrap();
        assert!(matches!(outcome, PullOutcome::FastForwarded { .. }));

        let reload = deployment.live.reload().unwrap();
        let changes = reload.diff();
        assert_eq!(changes.changed_ids(), vec!["sst_daily", "wave_spectra"]);
        assert_eq!(changes["sst_daily"].status, DiffStatus::Modified);
        assert_eq!(changes["wave_spectra"].status, DiffStatus::Added);
        assert_eq!(changes["buoy_obs"].status, DiffStatus::Unchanged);
        let sst = &changes["sst_daily"];
        assert_eq!(sst.modified_attributes().len(), 1);
        assert_eq!(sst.modified_attributes()["reloadEveryNMinutes"].new, Value::scalar("60"));
        assert!(sst.removed_attributes().is_empty());

        // Readers holding the old snapshot are unaffected
        assert_eq!(before.len(), 3);
        assert_eq!(deployment.live.snapshot().len(), 4);

        let secrets = secrets_from_vars([("ERDDAP_SECRET_buoy_obs_password", "hunter2")]);
        let (merged, report) = merge_secrets(&reload.after, &secrets);
        assert!(report.is_clean());
        erddap_registry::write(&merged, &deployment.output).unwrap();

        let written = fs::read_to_string(&deployment.output).unwrap();
        assert!(written.contains("<connectionProperty name=\"password\">hunter2</connectionProperty>"));
        assert!(!render(&reload.after).unwrap().windows(7).any(|w| w == b"hunter2"));

        let deployed = Registry::load_file(&deployment.output).unwrap();
        assert!(!diff(&merged, &deployed).has_changes());

        let flags = io::write_markers(&deployment.flags, changes.changed_ids()).unwrap();
        assert_eq!(flags.len(), 2);
        assert!(deployment.flags.join("sst_daily").to_native().is_file());
        assert!(deployment.flags.join("wave_spectra").to_native().is_file());
        assert!(!deployment.flags.join("buoy_obs").to_native().exists());
    }

    #[test]
    fn test_pull_without_upstream_changes() {
        let deployment = deploy();

        assert_eq!(deployment.repo.pull().unwrap(), PullOutcome::UpToDate);
        let reload = deployment.live.reload().unwrap();
        assert!(!reload.diff().has_changes());
    }

    #[test]
    fn test_broken_upstream_fragment_keeps_live_snapshot() {
        let deployment = deploy();

        commit_files(
            &deployment.upstream,
            &[("datasets.d/970-broken.xml", "<erddapDatasets><dataset datasetID=\"x\">")],
            "Broken fragment",
        );
        deployment.repo.pull().unwrap();

        let err = deployment.live.reload().unwrap_err();
        assert!(err.to_string().contains("970-broken.xml"));
        assert_eq!(deployment.live.snapshot().len(), 3);
    }
}
