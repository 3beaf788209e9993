//! End-to-end tests that drive the `pim` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// sha256 of the bytes `test`.
const TEST_DIGEST: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

/// A temporary pim home with one directory source called `local`.
struct TestContext {
    temp_dir: TempDir,
    pim_home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let pim_home = temp_dir.path().join(".pim");
        std::fs::create_dir_all(pim_home.join("manifests")).expect("failed to create pim home");
        std::fs::write(
            pim_home.join("settings.toml"),
            "[[source]]\nname = \"local\"\nkind = \"directory\"\nlocation = \"manifests\"\n",
        )
        .expect("failed to write settings");
        std::fs::write(temp_dir.path().join("tool"), b"test").expect("failed to write payload");
        Self { temp_dir, pim_home }
    }

    fn payload_url(&self) -> String {
        format!("file://{}", self.temp_dir.path().join("tool").display())
    }

    fn add_manifest(&self, id: &str, installer_type: &str, sha256: &str) -> PathBuf {
        let path = self.pim_home.join("manifests").join(format!("{id}.toml"));
        std::fs::write(
            &path,
            format!(
                "id = \"{id}\"\nname = \"{id}\"\nversion = \"1.0\"\npublisher = \"Contoso\"\n\n[[installer]]\narchitecture = \"neutral\"\ntype = \"{installer_type}\"\nurl = \"{}\"\nsha256 = \"{sha256}\"\n",
                self.payload_url()
            ),
        )
        .expect("failed to write manifest");
        path
    }

    fn pim(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_pim"))
            .args(args)
            .env("HOME", self.temp_dir.path())
            .env("PIM_HOME", &self.pim_home)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to run pim")
    }

    fn location(&self) -> PathBuf {
        self.temp_dir.path().join("installed")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn path_str(p: &Path) -> &str {
    p.to_str().expect("utf-8 temp path")
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.pim(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn test_manifest_and_query_conflict_exits_2() {
    let ctx = TestContext::new();
    let manifest = ctx.add_manifest("Contoso.Tool", "portable", TEST_DIGEST);
    let output = ctx.pim(&["install", "--id", "Contoso.Tool", "--manifest", path_str(&manifest)]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("--manifest"));
}

#[test]
fn test_invalid_architecture_exits_3_and_lists_values() {
    let ctx = TestContext::new();
    ctx.add_manifest("Contoso.Tool", "portable", TEST_DIGEST);
    let output = ctx.pim(&["show", "--id", "Contoso.Tool", "--architecture", "sparc"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("neutral"));
}

#[test]
fn test_unknown_package_exits_4() {
    let ctx = TestContext::new();
    let output = ctx.pim(&["show", "--id", "Nope.Nothing"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_show_prints_manifest_and_installer() {
    let ctx = TestContext::new();
    ctx.add_manifest("Contoso.Tool", "portable", TEST_DIGEST);
    let output = ctx.pim(&["show", "contoso.tool"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Publisher: Contoso"));
    assert!(out.contains("neutral/unknown/portable"));
}

#[test]
fn test_install_portable_places_file() {
    let ctx = TestContext::new();
    ctx.add_manifest("Contoso.Tool", "portable", TEST_DIGEST);
    let location = ctx.location();
    let output = ctx.pim(&["install", "--id", "Contoso.Tool", "--location", path_str(&location)]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(std::fs::read(location.join("tool")).unwrap(), b"test");
}

#[test]
fn test_hash_mismatch_exits_7_without_installing() {
    let ctx = TestContext::new();
    ctx.add_manifest("Contoso.Tool", "portable", &"0".repeat(64));
    let location = ctx.location();
    let output = ctx.pim(&["install", "--id", "Contoso.Tool", "--location", path_str(&location)]);
    assert_eq!(output.status.code(), Some(7));
    assert!(!location.join("tool").exists());

    let output = ctx.pim(&[
        "install",
        "--id",
        "Contoso.Tool",
        "--location",
        path_str(&location),
        "--ignore-security-hash",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(location.join("tool").exists());
}

#[test]
fn test_ambiguous_query_lists_candidates() {
    let ctx = TestContext::new();
    ctx.add_manifest("Contoso.ToolA", "portable", TEST_DIGEST);
    ctx.add_manifest("Contoso.ToolB", "portable", TEST_DIGEST);
    let output = ctx.pim(&["install", "tool"]);
    assert_eq!(output.status.code(), Some(5));
    let out = stdout(&output);
    assert!(out.contains("Contoso.ToolA"));
    assert!(out.contains("Contoso.ToolB"));
}

#[test]
fn test_search_lists_matches() {
    let ctx = TestContext::new();
    ctx.add_manifest("Contoso.Tool", "portable", TEST_DIGEST);
    ctx.add_manifest("Fabrikam.App", "portable", TEST_DIGEST);
    let output = ctx.pim(&["search", "contoso"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Contoso.Tool"));
    assert!(!out.contains("Fabrikam.App"));

    let output = ctx.pim(&["search", "zzz"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_unknown_source_exits_3() {
    let ctx = TestContext::new();
    let output = ctx.pim(&["search", "--source", "elsewhere"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("local"));
}

#[test]
fn test_hash_command() {
    let ctx = TestContext::new();
    let file = ctx.temp_dir.path().join("tool");
    let output = ctx.pim(&["hash", path_str(&file)]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with(TEST_DIGEST));
}

#[test]
fn test_complete_values_and_variants() {
    let ctx = TestContext::new();
    ctx.add_manifest("Contoso.Tool", "portable", TEST_DIGEST);

    let output = ctx.pim(&["complete", "--arg", "id", "--word", "cont"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "Contoso.Tool\n");

    let output = ctx.pim(&["complete", "--arg", "locale", "--word", "en"]);
    assert_eq!(stdout(&output), "\n");

    let output = ctx.pim(&["complete", "--arg=--log"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "");

    let output = ctx.pim(&["complete", "--arg", "bogus"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_complete_narrows_by_other_arguments() {
    let ctx = TestContext::new();
    ctx.add_manifest("Contoso.Tool", "portable", TEST_DIGEST);
    ctx.add_manifest("Fabrikam.App", "portable", TEST_DIGEST);

    let output = ctx.pim(&["complete", "--arg", "id"]);
    assert_eq!(stdout(&output), "Contoso.Tool\nFabrikam.App\n");

    let output = ctx.pim(&["complete", "--arg", "id", "--name", "fabrikam"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "Fabrikam.App\n");

    let output = ctx.pim(&["complete", "--arg", "version", "--id", "Contoso.Tool"]);
    assert_eq!(stdout(&output), "1.0\n");

    let output = ctx.pim(&["complete", "--arg", "version", "--id", "Nope.Nothing"]);
    assert_eq!(stdout(&output), "\n");
}

#[test]
fn test_log_file_receives_diagnostics() {
    let ctx = TestContext::new();
    ctx.add_manifest("Contoso.Tool", "portable", TEST_DIGEST);
    let log = ctx.temp_dir.path().join("pim.log");
    let output = Command::new(env!("CARGO_BIN_EXE_pim"))
        .args(["--log-file", path_str(&log), "show", "--id", "Contoso.Tool"])
        .env("HOME", ctx.temp_dir.path())
        .env("PIM_HOME", &ctx.pim_home)
        .env("RUST_LOG", "debug")
        .output()
        .expect("failed to run pim");
    assert!(output.status.success());
    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("Running step"));
}
