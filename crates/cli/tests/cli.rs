use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("circlefeed");
        cmd.current_dir(self.dir.path())
            .env(
                "CIRCLEFEED__GENERAL__DATABASE_PATH",
                self.dir.path().join("feed.sqlite"),
            )
            .env("CIRCLEFEED__MEDIA__DIR", self.dir.path().join("media"))
            .env_remove("RUST_LOG");
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).output().expect("run command");
        assert!(
            output.status.success(),
            "{:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("valid JSON")
    }

    fn add_user(&self, name: &str) -> i64 {
        let user = self.json(&["user", "add", "--username", name, "--json"]);
        user["id"].as_i64().expect("user id")
    }

    fn image(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("fake image {}", name)).expect("write image");
        path
    }
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("circlefeed.toml");

    let mut cmd = cargo_bin_cmd!("circlefeed");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("database_path"));
    assert!(content.contains("[media]"));
    assert!(content.contains("max_upload_bytes"));

    let mut again = cargo_bin_cmd!("circlefeed");
    again
        .args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn explicit_missing_config_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["--config", "nope.toml", "user", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn feed_shows_posts_only_to_their_viewers() {
    let sandbox = Sandbox::new();
    let ana = sandbox.add_user("ana");
    let ben = sandbox.add_user("ben");
    let cai = sandbox.add_user("cai");
    let image = sandbox.image("beach.png");

    let post = sandbox.json(&[
        "post",
        "create",
        "--author",
        &ana.to_string(),
        "--caption",
        "beach day",
        "--to",
        &ben.to_string(),
        "--image",
        image.to_str().expect("utf-8 path"),
        "--frame",
        "polaroid",
        "--json",
    ]);
    assert_eq!(post["viewers"], serde_json::json!([ana, ben]));
    assert_eq!(post["frame"], "polaroid");
    let post_id = post["id"].as_i64().expect("post id");

    let ben_feed = sandbox.json(&["feed", "--viewer", &ben.to_string(), "--json"]);
    let entries = ben_feed.as_array().expect("array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], post_id);
    assert_eq!(entries[0]["caption"], "beach day");
    assert_eq!(entries[0]["author"]["username"], "ana");

    let cai_feed = sandbox.json(&["feed", "--viewer", &cai.to_string(), "--json"]);
    assert_eq!(cai_feed.as_array().expect("array").len(), 0);

    let ana_feed = sandbox.json(&["feed", "--viewer", &ana.to_string(), "--json"]);
    assert_eq!(ana_feed.as_array().expect("array").len(), 1);
}

#[test]
fn engagement_is_reported_to_the_engaging_viewer_only() {
    let sandbox = Sandbox::new();
    let ana = sandbox.add_user("ana");
    let ben = sandbox.add_user("ben");
    let image = sandbox.image("cat.jpg");

    let post = sandbox.json(&[
        "post",
        "create",
        "--author",
        &ana.to_string(),
        "--to",
        &ben.to_string(),
        "--image",
        image.to_str().expect("utf-8 path"),
        "--json",
    ]);
    let post_id = post["id"].as_i64().expect("post id").to_string();

    sandbox
        .cmd()
        .args(["comment", "--user", &ben.to_string(), "--post", &post_id])
        .args(["--text", "so cute"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Comment"));
    sandbox
        .cmd()
        .args(["react", "--user", &ben.to_string(), "--post", &post_id])
        .args(["--kind", "Heart"])
        .assert()
        .success()
        .stdout(predicate::str::contains("heart"));

    let ben_feed = sandbox.json(&["feed", "--viewer", &ben.to_string(), "--json"]);
    assert_eq!(ben_feed[0]["comment_count"], 1);
    assert_eq!(ben_feed[0]["reactions"][0]["kind"], "heart");
    assert_eq!(ben_feed[0]["reactions"][0]["reactor"]["username"], "ben");

    let ana_feed = sandbox.json(&["feed", "--viewer", &ana.to_string(), "--json"]);
    assert_eq!(ana_feed[0]["comment_count"], 0);
    assert_eq!(ana_feed[0]["reactions"], serde_json::json!([]));
}

#[test]
fn unknown_recipient_is_rejected() {
    let sandbox = Sandbox::new();
    let ana = sandbox.add_user("ana");
    let image = sandbox.image("tree.png");

    sandbox
        .cmd()
        .args(["post", "create", "--author", &ana.to_string()])
        .args(["--to", "4242", "--image"])
        .arg(&image)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation failed"))
        .stderr(predicate::str::contains("4242"));

    let feed = sandbox.json(&["feed", "--viewer", &ana.to_string(), "--json"]);
    assert_eq!(feed.as_array().expect("array").len(), 0);
}

#[test]
fn outsiders_cannot_comment() {
    let sandbox = Sandbox::new();
    let ana = sandbox.add_user("ana");
    let dee = sandbox.add_user("dee");
    let image = sandbox.image("private.png");

    let post = sandbox.json(&[
        "post",
        "create",
        "--author",
        &ana.to_string(),
        "--image",
        image.to_str().expect("utf-8 path"),
        "--json",
    ]);
    let post_id = post["id"].as_i64().expect("post id").to_string();

    sandbox
        .cmd()
        .args(["comment", "--user", &dee.to_string(), "--post", &post_id])
        .args(["--text", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn friends_audience_reaches_accepted_friends() {
    let sandbox = Sandbox::new();
    let ana = sandbox.add_user("ana");
    let ben = sandbox.add_user("ben");
    let cai = sandbox.add_user("cai");

    sandbox
        .cmd()
        .args(["friends", "request", "--from", &ana.to_string()])
        .args(["--to", &ben.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Friend request 1 sent"));
    sandbox
        .cmd()
        .args(["friends", "accept", "--request", "1", "--as", &ben.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("accepted"));

    let listing = sandbox.json(&["friends", "list", "--user", &ana.to_string(), "--json"]);
    assert_eq!(listing["friends"], serde_json::json!([ben]));

    let image = sandbox.image("party.gif");
    let post = sandbox.json(&[
        "post",
        "create",
        "--author",
        &ana.to_string(),
        "--to-friends",
        "--image",
        image.to_str().expect("utf-8 path"),
        "--json",
    ]);
    assert_eq!(post["viewers"], serde_json::json!([ana, ben]));

    let cai_feed = sandbox.json(&["feed", "--viewer", &cai.to_string(), "--json"]);
    assert_eq!(cai_feed.as_array().expect("array").len(), 0);
}

#[test]
fn post_show_missing_id_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["post", "show", "77"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Post with id 77 not found"));
}
