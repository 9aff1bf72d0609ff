use predicates::prelude::*;

mod common;

fn config_json(ctx: &common::TestContext, name: &str) -> String {
    std::fs::read_to_string(ctx.home.path().join("vms").join(name).join("config.json")).unwrap()
}

#[test]
fn test_edit_resources() {
    let mut ctx = common::vmlite();
    ctx.create_vm("editable", &["sleep", "300"]);

    ctx.cmd
        .args([
            "edit",
            "editable",
            "--cpus",
            "3",
            "--memory",
            "768",
            "--grace-period",
            "40",
        ])
        .assert()
        .success()
        .stdout("editable\n");

    let json = config_json(&ctx, "editable");
    assert!(json.contains("\"cpus\": 3"));
    assert!(json.contains("\"memory_mib\": 768"));
    assert!(json.contains("\"grace_period_secs\": 40"));
    // The hypervisor command line is untouched.
    assert!(json.contains("\"executable\": \"sleep\""));
}

#[test]
fn test_edit_keeps_unspecified_fields() {
    let mut ctx = common::vmlite();
    ctx.new_cmd()
        .args(["create", "partial", "--cpus", "2", "--memory", "256", "--", "true"])
        .assert()
        .success();

    ctx.cmd
        .args(["edit", "partial", "--memory", "1024"])
        .assert()
        .success();

    let json = config_json(&ctx, "partial");
    assert!(json.contains("\"cpus\": 2"));
    assert!(json.contains("\"memory_mib\": 1024"));
}

#[test]
fn test_edit_requires_a_change() {
    let mut ctx = common::vmlite();
    ctx.create_vm("unchanged", &["true"]);

    ctx.cmd
        .args(["edit", "unchanged"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one of"));
}

#[test]
fn test_edit_missing_vm() {
    let mut ctx = common::vmlite();
    ctx.cmd
        .args(["edit", "ghost", "--cpus", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn test_edit_rejects_invalid_values() {
    let mut ctx = common::vmlite();
    ctx.create_vm("strict", &["true"]);

    ctx.cmd
        .args(["edit", "strict", "--grace-period", "86401"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("grace_period_secs"));
    ctx.new_cmd()
        .args(["edit", "strict", "--cpus", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cpus"));

    assert!(config_json(&ctx, "strict").contains("\"grace_period_secs\": 2"));
}

#[test]
fn test_edit_rejects_running_vm() {
    let ctx = common::vmlite();
    let name = "busy";
    ctx.create_vm(name, &["sleep", "300"]);
    ctx.new_cmd().args(["run", "-d", name]).assert().success();

    ctx.new_cmd()
        .args(["edit", name, "--cpus", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("vm is running"));

    // The controller still holds its lock, so stop can find it.
    ctx.new_cmd().args(["stop", name]).assert().success();
    assert!(config_json(&ctx, name).contains("\"cpus\": 1"));

    ctx.new_cmd()
        .args(["edit", name, "--cpus", "4"])
        .assert()
        .success();
    assert!(config_json(&ctx, name).contains("\"cpus\": 4"));
}
