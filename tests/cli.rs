use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn forge() -> Command {
    Command::cargo_bin("forge").expect("binary exists")
}

#[test]
fn usage_without_a_forge_script() {
    forge()
        .assert()
        .failure()
        .stdout(predicate::str::contains("Usage: forge <program.forge>"));

    forge()
        .arg("notes.txt")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Usage: forge <program.forge>"));
}

#[test]
fn missing_script_is_reported() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("absent.forge");
    forge()
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.forge\" not found"));
}

#[test]
fn runs_a_script_and_loads_modules_from_the_working_directory() {
    let dir = tempdir().expect("create temp dir");
    fs::create_dir_all(dir.path().join("lib")).expect("create lib dir");
    fs::write(
        dir.path().join("lib/util.forge"),
        "function greet(name):\n    return \"Hello, \" + name + \"!\"\n",
    )
    .expect("write module");
    fs::write(
        dir.path().join("main.forge"),
        "load from lib util.forge\nfor i = 1, 2 do\n    print(greet(\"Forge \" + i))\n",
    )
    .expect("write script");

    forge()
        .current_dir(dir.path())
        .arg("main.forge")
        .assert()
        .success()
        .stdout("Hello, Forge 1!\nHello, Forge 2!\n");
}

#[test]
fn runtime_errors_print_the_line_and_exit_nonzero() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("broken.forge");
    fs::write(&script, "print(\"start\")\nprint(undefined_name)\nprint(\"never\")\n")
        .expect("write script");

    forge()
        .arg(&script)
        .assert()
        .failure()
        .stdout("start\n")
        .stderr(predicate::str::contains(
            "[Error at line 2]: NameError: Variable \"undefined_name\" is not defined",
        ));
}

#[test]
fn input_reads_a_line_from_stdin() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("ask.forge");
    fs::write(&script, "name = input(\"name? \")\nprint(\"hi \", name)\n").expect("write script");

    forge()
        .arg(&script)
        .write_stdin("Ada\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("hi Ada"));
}
