use anyhow::{Context, Result};
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Abstraction for managing the attest test environment.
struct AttestTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl AttestTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let project_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .context("Workspace root not found")?
            .join("demos/registry");

        let dest = tmp.path().join("registry");
        Self::copy_dir(&project_root, &dest)?;

        Ok(Self {
            _tmp: tmp,
            root: dest,
        })
    }

    fn copy_dir(src: &PathBuf, dst: &PathBuf) -> std::io::Result<()> {
        let mut options = fs_extra::dir::CopyOptions::new();
        options.skip_exist = true;
        options.content_only = true;

        std::fs::create_dir_all(dst)?;
        fs_extra::dir::copy(src, dst, &options)
            .map(|_| ())
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    fn attest(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("attest"));
        cmd.current_dir(&self.root);
        cmd
    }

    fn run_pipeline(&self) -> Result<()> {
        self.attest()
            .args(["run", "--input", "data/holdings.csv"])
            .assert()
            .success()
            .stdout(predicate::str::contains("SUCCESS"));
        Ok(())
    }

    fn report_index(&self) -> Result<serde_json::Value> {
        let content = std::fs::read_to_string(self.root.join("target/reports/index.json"))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn snapshot_hash(&self) -> Result<String> {
        let index = self.report_index()?;
        index[0]["snapshot_hash"]
            .as_str()
            .map(String::from)
            .context("snapshot_hash missing from report index")
    }
}

#[test]
fn test_full_pipeline_produces_four_reports() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.run_pipeline()?;

    let index = env.report_index()?;
    let records = index.as_array().context("index should be a list")?;
    assert_eq!(records.len(), 4);

    let hash = env.snapshot_hash()?;
    assert_eq!(hash.len(), 12);
    for record in records {
        assert_eq!(record["snapshot_hash"], serde_json::json!(hash));
    }

    // The frozen copy itself must exist under its hash.
    assert!(
        env.root
            .join(format!("target/snapshots/{}.json", hash))
            .exists()
    );
    Ok(())
}

#[test]
fn test_summary_report_counts_validation_and_lookup_state() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.run_pipeline()?;
    let hash = env.snapshot_hash()?;

    let summary: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
        env.root.join(format!("target/reports/{}/summary.json", hash)),
    )?)?;
    let body = &summary["body"];

    assert_eq!(body["document_type"], "Shareholder Registry");
    assert_eq!(body["total_rows"], 4);
    // Row 3 carries an invalid ID number.
    assert_eq!(body["valid_rows"], 3);
    assert_eq!(body["invalid_rows"], 1);
    // Alice via ID number, Dave via email fallback.
    assert_eq!(body["rows_matched"], 2);
    // The ambiguous Bob row plus the no-lookup-key row.
    assert_eq!(body["exception_counts"]["pending"], 2);
    Ok(())
}

#[test]
fn test_exceptions_report_details() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.run_pipeline()?;
    let hash = env.snapshot_hash()?;

    let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
        env.root
            .join(format!("target/reports/{}/exceptions.json", hash)),
    )?)?;
    let exceptions = report["body"]["exceptions"]
        .as_array()
        .context("exceptions list")?;
    assert_eq!(exceptions.len(), 2);

    // Bob's ID number exists twice in the directory.
    assert_eq!(exceptions[0]["kind"], "ambiguous");
    assert_eq!(exceptions[0]["field"], "SHAREHOLDER_ID_NUMBER");
    assert_eq!(
        exceptions[0]["candidates"]
            .as_array()
            .context("candidates")?
            .len(),
        2
    );

    // Dana has neither a valid ID nor an email.
    assert_eq!(exceptions[1]["kind"], "no_lookup_key");

    let failures = report["body"]["validation_failures"]
        .as_array()
        .context("validation failures")?;
    assert!(
        failures
            .iter()
            .any(|f| f["field"] == "SHAREHOLDER_ID_NUMBER" && f["row_index"] == 3)
    );
    Ok(())
}

#[test]
fn test_report_regeneration_and_stale_snapshot_guard() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.run_pipeline()?;
    let hash = env.snapshot_hash()?;

    // Regeneration from the frozen copy works as often as we like.
    env.attest()
        .args(["report", "--snapshot-hash", &hash, "--kind", "verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("regenerated"));

    // Tamper with the frozen copy: the engine must refuse to render from it.
    let snapshot_path = env.root.join(format!("target/snapshots/{}.json", hash));
    let mut snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot_path)?)?;
    snapshot["content"]["dataset"]["rows"][0][0] = serde_json::json!("tampered");
    std::fs::write(&snapshot_path, serde_json::to_string_pretty(&snapshot)?)?;

    env.attest()
        .args(["report", "--snapshot-hash", &hash, "--kind", "verify"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stale snapshot"));
    Ok(())
}

#[test]
fn test_unknown_snapshot_hash_fails() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.run_pipeline()?;

    env.attest()
        .args(["report", "--snapshot-hash", "000000000000", "--kind", "summary"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
    Ok(())
}

#[test]
fn test_mapping_artifact_round_trips() -> Result<()> {
    let env = AttestTestEnv::new()?;

    env.attest()
        .args([
            "mapping",
            "--input",
            "data/holdings.csv",
            "--output",
            "mapping.yaml",
        ])
        .assert()
        .success();

    let artifact: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(env.root.join("mapping.yaml"))?)?;

    assert_eq!(
        artifact["document_type"],
        serde_yaml::Value::from("Shareholder Registry")
    );
    let entries = artifact["entries"].as_sequence().context("entries")?;
    // Eleven source columns, all bound (two of them to ADDRESS_LINE).
    assert_eq!(entries.len(), 11);
    assert_eq!(entries[0]["column"], serde_yaml::Value::from("ID Number"));
    assert_eq!(
        entries[0]["validation"],
        serde_yaml::Value::from("SA_ID_NUMBER")
    );
    Ok(())
}

#[test]
fn test_schemas_listing() -> Result<()> {
    let env = AttestTestEnv::new()?;

    let output = env.attest().arg("schemas").output()?;
    assert!(output.status.success());

    // Tracing writes timestamped lines; keep only the listing itself.
    let stdout = String::from_utf8(output.stdout)?;
    let listing: String = stdout
        .lines()
        .filter(|l| l.starts_with("📚") || l.starts_with("   -"))
        .collect::<Vec<_>>()
        .join("\n");

    insta::assert_snapshot!(listing, @r###"
    📚 1 schema(s) loaded:
       - registry (Shareholder Registry): 10 field(s), threshold 75%, lookup: ["SHAREHOLDER_ID_NUMBER", "EMAIL"]
    "###);
    Ok(())
}

#[test]
fn test_no_matching_schema_aborts_the_run() -> Result<()> {
    let env = AttestTestEnv::new()?;
    std::fs::write(
        env.root.join("data/junk.csv"),
        "colour,shape\nred,circle\nblue,square\n",
    )?;

    env.attest()
        .args(["run", "--input", "data/junk.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("VALIDATION ABORTED"));
    Ok(())
}
