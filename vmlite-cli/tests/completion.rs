use predicates::prelude::*;

mod common;

#[test]
fn test_completion_bash() {
    let mut ctx = common::vmlite();
    ctx.cmd
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_vmlite"))
        .stdout(predicate::str::contains("edit"))
        .stdout(predicate::str::contains("vm_name").not());
}

#[test]
fn test_completion_fish_completes_vm_names() {
    let mut ctx = common::vmlite();
    ctx.cmd
        .args(["completion", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete -c vmlite"))
        .stdout(predicate::str::contains(
            r#"-n "__fish_seen_subcommand_from stop" -a "(vmlite _complete vm_name)""#,
        ));
}

#[test]
fn test_completion_rejects_unknown_shell() {
    let mut ctx = common::vmlite();
    ctx.cmd.args(["completion", "tcsh"]).assert().failure();
}

#[test]
fn test_complete_vm_names() {
    let mut ctx = common::vmlite();
    ctx.create_vm("beta", &["true"]);
    ctx.create_vm("alpha", &["true"]);

    ctx.cmd
        .args(["_complete", "vm_name"])
        .assert()
        .success()
        .stdout("alpha\tvm\nbeta\tvm\n");
}

#[test]
fn test_complete_unknown_kind_is_empty() {
    let mut ctx = common::vmlite();
    ctx.create_vm("alpha", &["true"]);

    ctx.cmd
        .args(["_complete", "disk"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn test_complete_is_hidden_from_help() {
    let mut ctx = common::vmlite();
    ctx.cmd
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("completion"))
        .stdout(predicate::str::contains("_complete").not());
}
