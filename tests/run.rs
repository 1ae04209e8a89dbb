#![cfg(unix)]

use ordo::check::run_check;
use ordo::config::{bundled_rules_dir, ExecutionOptions};
use ordo::interpreter::Interpreter;
use ordo::models::ExitStatus;
use ordo::store::DATABASE_FILE;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn options() -> ExecutionOptions {
    ExecutionOptions {
        bundled_rules: Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("rules")),
        ..Default::default()
    }
}

#[test]
fn bundled_rules_are_all_valid() {
    let dir = bundled_rules_dir();
    let mut count = 0;
    for entry in fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        let id = path.file_stem().unwrap().to_string_lossy().to_string();
        ordo::rules::load(&id, &path).unwrap();
        count += 1;
    }
    assert!(count >= 5);
}

#[test]
fn shell_directives_run_in_order() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("build.sh");
    fs::write(
        &doc,
        "#!/bin/sh\n# ordo: shell: { command: 'echo one > log' }\n# ordo: shell: { command: 'echo two >> log' }\n",
    )
    .unwrap();
    let report = Interpreter::new(options()).run(&[doc]);
    assert_eq!(report.status, ExitStatus::SUCCESS, "{:?}", report.error);
    assert_eq!(report.steps.len(), 2);
    assert_eq!(
        fs::read_to_string(dir.path().join("log")).unwrap(),
        "one\ntwo\n"
    );
}

#[test]
fn failing_step_under_halt_on_errors_exits_one() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("build.sh");
    fs::write(
        &doc,
        "# ordo: shell: { command: 'exit 1' }\n# ordo: shell: { command: 'touch never' }\n",
    )
    .unwrap();
    let opts = ExecutionOptions {
        halt_on_errors: true,
        ..options()
    };
    let report = Interpreter::new(opts).run(&[doc.clone()]);
    assert_eq!(report.status, ExitStatus::FAILURE);
    assert_eq!(report.steps.len(), 1);
    assert!(!report.steps[0].success);
    assert_eq!(report.steps[0].exit_code, Some(1));
    assert!(!dir.path().join("never").exists());

    // Without halt-on-errors the second directive still runs.
    let report = Interpreter::new(options()).run(&[doc]);
    assert_eq!(report.status, ExitStatus::SUCCESS);
    assert!(dir.path().join("never").exists());
}

#[test]
fn halt_rule_ends_the_run_across_files() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.sh");
    let second = dir.path().join("second.sh");
    fs::write(&first, "# ordo: halt: { status: 3 }\n# ordo: shell: { command: 'touch a' }\n").unwrap();
    fs::write(&second, "# ordo: shell: { command: 'touch b' }\n").unwrap();
    let report = Interpreter::new(options()).run(&[first, second]);
    assert_eq!(report.status, ExitStatus(3));
    assert!(report.halted);
    assert!(!dir.path().join("a").exists());
    assert!(!dir.path().join("b").exists());
}

#[test]
fn continuation_and_extensionless_lookup() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("paper.sh"),
        "# ordo: shell: {\n# ordo: -->   command: 'touch made'\n# ordo: --> }\n",
    )
    .unwrap();
    let report = Interpreter::new(options()).run(&[dir.path().join("paper")]);
    assert_eq!(report.status, ExitStatus::SUCCESS, "{:?}", report.error);
    assert_eq!(report.steps[0].lines, vec![1, 2, 3]);
    assert!(dir.path().join("made").exists());
}

#[test]
fn changed_drives_a_while_loop() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("doc.sh");
    // Appends a line each pass until the file reaches three lines; `changed`
    // stays true while the content keeps moving.
    fs::write(
        &doc,
        "# ordo: shell: { command: 'test $(wc -l < doc.out 2>/dev/null || echo 0) -ge 3 || echo x >> doc.out' } while changed('out')\n",
    )
    .unwrap();
    fs::write(dir.path().join("doc.out"), "").unwrap();
    let report = Interpreter::new(options()).run(&[doc]);
    assert_eq!(report.status, ExitStatus::SUCCESS, "{:?}", report.error);
    assert_eq!(
        fs::read_to_string(dir.path().join("doc.out")).unwrap(),
        "x\nx\nx\n"
    );
    assert!(report.steps.len() >= 3);
    assert!(dir.path().join(DATABASE_FILE).exists());
}

#[test]
fn loop_bound_stops_runaway_directives() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("doc.sh");
    fs::write(&doc, "# ordo: shell: { command: 'echo x >> n' } while true\n").unwrap();
    let opts = ExecutionOptions {
        max_loops: 4,
        ..options()
    };
    let report = Interpreter::new(opts).run(&[doc]);
    assert_eq!(report.status, ExitStatus::SUCCESS);
    assert_eq!(report.steps.len(), 4);
    assert_eq!(fs::read_to_string(dir.path().join("n")).unwrap().lines().count(), 4);
}

#[test]
fn unknown_parameter_is_rejected_before_running() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("doc.sh");
    fs::write(&doc, "# ordo: shell: { command: 'touch ran', shell: yes }\n").unwrap();
    let report = Interpreter::new(options()).run(&[doc.clone()]);
    assert_eq!(report.status, ExitStatus::EXCEPTION);
    let err = report.error.unwrap();
    assert!(err.starts_with("[rule shell ("), "{}", err);
    assert!(err.contains("unknown keys: shell"));
    assert!(!dir.path().join("ran").exists());

    let check = run_check(&[doc], &options());
    assert_eq!(check.issues.len(), 1);
    assert!(check.issues[0].message.contains("unknown keys: shell"));
}

#[test]
fn local_rules_shadow_bundled_ones() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("shell.yaml"),
        "identifier: shell\nname: Local shell\narguments:\n  - identifier: command\n    required: true\n    flag: \"parameters.command\"\ncommands:\n  - command: \"false\"\n",
    )
    .unwrap();
    let doc = dir.path().join("doc.sh");
    fs::write(&doc, "# ordo: shell: { command: 'touch ran' }\n").unwrap();
    let report = Interpreter::new(options()).run(&[doc]);
    assert_eq!(report.failures(), 1);
    assert!(!dir.path().join("ran").exists());
}

#[test]
fn clean_removes_listed_files_but_never_the_document() {
    let dir = tempdir().unwrap();
    let doc = dir.path().join("doc.tex");
    fs::write(dir.path().join("doc.aux"), "").unwrap();
    fs::write(dir.path().join("doc.log"), "").unwrap();
    fs::write(&doc, "% ordo: clean: { files: [doc.aux, doc.log] }\n").unwrap();
    let report = Interpreter::new(options()).run(&[doc.clone()]);
    assert_eq!(report.status, ExitStatus::SUCCESS, "{:?}", report.error);
    assert_eq!(report.steps.len(), 2);
    assert!(!dir.path().join("doc.aux").exists());
    assert!(!dir.path().join("doc.log").exists());

    fs::write(&doc, "% ordo: clean\n").unwrap();
    let report = Interpreter::new(options()).run(&[doc.clone()]);
    assert_eq!(report.status, ExitStatus::EXCEPTION);
    assert!(report.steps.is_empty());
    let err = report.error.unwrap();
    assert!(err.contains("refusing to remove document"), "{}", err);
    assert!(doc.exists());
}

#[test]
fn session_values_carry_across_files() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("remember.yaml"),
        "identifier: remember\nname: Remember\narguments: []\ncommands:\n  - command: \"[sessionPut('seen', getBasename()), true]\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("recall.yaml"),
        "identifier: recall\nname: Recall\narguments: []\ncommands:\n  - command: \"sessionContains('seen') && sessionGet('seen') == 'first'\"\n",
    )
    .unwrap();
    let first = dir.path().join("first.sh");
    let second = dir.path().join("second.sh");
    fs::write(&first, "# ordo: remember\n").unwrap();
    fs::write(&second, "# ordo: recall\n").unwrap();
    let report = Interpreter::new(options()).run(&[first, second]);
    assert_eq!(report.status, ExitStatus::SUCCESS, "{:?}", report.error);
    assert_eq!(report.steps.len(), 2);
    assert!(report.steps.iter().all(|s| s.success));
}
