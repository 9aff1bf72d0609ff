use predicates::prelude::*;

mod common;

#[test]
fn test_list_empty_header() {
    let mut ctx = common::vmlite();
    ctx.cmd
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("PID"))
        .stdout(predicate::str::contains("STATUS"));
}

#[test]
fn test_list_lifecycle() {
    let mut ctx = common::vmlite();
    let name = "list-lifecycle";
    ctx.new_cmd()
        .args(["create", name, "--cpus", "2", "--memory", "256", "--", "sleep", "300"])
        .assert()
        .success();

    ctx.cmd
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains(name))
        .stdout(predicate::str::contains("256MiB"))
        .stdout(predicate::str::contains("stopped"));

    ctx.new_cmd().args(["run", "-d", name]).assert().success();

    ctx.new_cmd()
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("running"));

    ctx.cleanup_vm(name);
}

#[test]
fn test_list_alias() {
    let mut ctx = common::vmlite();
    ctx.cmd.arg("list").assert().success();
}
